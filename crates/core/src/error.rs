use thiserror::Error;

use crate::model::QuestionError;

/// Top-level domain validation error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    #[error(transparent)]
    Question(#[from] QuestionError),
}
