mod difficulty;
mod flow;
mod help;
mod ids;
mod question;
mod session;

pub use difficulty::DifficultyLevel;
pub use flow::{
    MAX_TOTAL_QUESTIONS, MIN_TOTAL_QUESTIONS, NavigationStep, ParseStepError, SelectionFlow,
};
pub use help::HelpResponse;
pub use ids::{DifficultyId, ParseIdError, QuestionId, SessionId};
pub use question::{AnswerPayload, Question, QuestionError, QuestionKind};
pub use session::SessionRecord;
