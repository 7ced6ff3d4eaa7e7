//! Engine-level error taxonomy.

use thiserror::Error;

use api::ApiError;
use practice_core::model::QuestionError;

/// Failures surfaced by the practice session engine.
///
/// Question-load and answer-submit failures keep the session alive; the
/// caller may retry the same action. `StartFailed` means no session was left
/// behind and starting can be attempted again from scratch.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("no active practice session")]
    NoActiveSession,

    #[error("no question is currently loaded")]
    NoCurrentQuestion,

    #[error("columnar answer still has unfilled blanks")]
    IncompleteAnswer,

    #[error("current answer is not a number: {0:?}")]
    InvalidAnswer(String),

    #[error("failed to start practice session")]
    StartFailed(#[source] Box<EngineError>),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl EngineError {
    /// Whether retrying the failed action can plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Api(err) => err.retryable(),
            Self::StartFailed(inner) => inner.retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_api_classification() {
        assert!(EngineError::Api(ApiError::Network("down".into())).retryable());
        assert!(
            EngineError::StartFailed(Box::new(EngineError::Api(ApiError::Server {
                status: 502
            })))
            .retryable()
        );
        assert!(!EngineError::Api(ApiError::NotFound).retryable());
        assert!(!EngineError::IncompleteAnswer.retryable());
    }
}
