#![forbid(unsafe_code)]

pub mod error;
pub mod flow;
pub mod guard;
pub mod session;

pub use error::EngineError;
pub use flow::{FlowEngine, HistoryEntry, NavigationSummary};
pub use guard::{GuardDecision, NavigationGuard};
pub use session::{
    AnswerView, AudioError, ColumnarGrid, ColumnarSlot, FeedbackState, HelpError, HelpErrorKind,
    HelpState, PracticeEngine, ProgressView, QuestionView, SessionPhase, SessionView,
    VoiceHelpState, VoicePlayback,
};
