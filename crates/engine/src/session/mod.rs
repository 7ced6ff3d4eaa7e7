//! Practice session engine: lifecycle, answer entry, help and voice help.

mod columnar;
mod engine;
mod help;
mod state;
mod view;
mod voice;

pub use columnar::{ColumnarGrid, ColumnarSlot};
pub use engine::PracticeEngine;
pub use state::{
    FeedbackState, HelpError, HelpErrorKind, HelpState, SessionPhase, VoiceHelpState,
};
pub use view::{AnswerView, ProgressView, QuestionView, SessionView};
pub use voice::{AudioError, VoicePlayback};
