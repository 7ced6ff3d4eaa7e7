//! Shared error taxonomy for collaborator requests.

use thiserror::Error;

/// Classified failure of a collaborator request.
///
/// Classification contract: a request that never produced a response is
/// `Network`; a response with status >= 500 is `Server`; a 404 is `NotFound`
/// (the "exhausted" condition for question fetching); any other 4xx is
/// `Validation`; everything else is `Unknown`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error (status {status})")]
    Server { status: u16 },

    #[error("request rejected (status {status}): {message}")]
    Validation { status: u16, message: String },

    #[error("not found")]
    NotFound,

    #[error("model produced a fallback response")]
    Llm,

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Classifies a response status code per the contract above.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            404 => Self::NotFound,
            400..=499 => Self::Validation {
                status,
                message: message.into(),
            },
            500..=599 => Self::Server { status },
            _ => Self::Unknown(message.into()),
        }
    }

    /// Whether retrying the same request can plausibly succeed.
    ///
    /// Transient infrastructure failures are retryable; rejections, missing
    /// resources, fallback responses and cancellations are not.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::Unknown(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::Unknown(err.to_string());
        }
        // No response was received (connect, timeout, redirect loop, ...).
        Self::Network(err.to_string())
    }
}
