//! Collaborator contract for the practice backend.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use practice_core::model::{
    AnswerPayload, DifficultyLevel, HelpResponse, Question, SessionId, SessionRecord,
};
use practice_core::model::{DifficultyId, QuestionId};

use crate::cancel::CancelToken;
use crate::error::ApiError;

/// A progressive audio byte stream for voice help.
pub type VoiceStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Logical operations the engine depends on.
///
/// Implementations must be safe to call concurrently; the engine may overlap
/// independent operations (help vs. voice vs. question load).
#[async_trait]
pub trait PracticeApi: Send + Sync {
    /// Fetch the available difficulty levels.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn difficulty_levels(&self) -> Result<Vec<DifficultyLevel>, ApiError>;

    /// Start a practice session for a difficulty level.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the session cannot be created.
    async fn start_session(
        &self,
        difficulty_id: DifficultyId,
        total_questions: u32,
    ) -> Result<SessionRecord, ApiError>;

    /// Fetch the next question of a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` once the session is exhausted, or another
    /// `ApiError` for transport failures.
    async fn next_question(&self, session_id: SessionId) -> Result<Question, ApiError>;

    /// Submit an answer; the response echoes `is_correct` and
    /// `correct_answer` on the question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the submission fails.
    async fn submit_answer(&self, payload: &AnswerPayload) -> Result<Question, ApiError>;

    /// Fetch the summary for a (possibly still running) session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the summary cannot be fetched.
    async fn summary(&self, session_id: SessionId) -> Result<SessionRecord, ApiError>;

    /// Fetch text help for a question. Honors `cancel`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Cancelled` when `cancel` fires first, otherwise the
    /// classified transport failure.
    async fn question_help(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        cancel: &CancelToken,
    ) -> Result<HelpResponse, ApiError>;

    /// Open a progressive audio stream of spoken help for a question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the stream cannot be opened; individual chunks
    /// may still fail while reading.
    async fn voice_help_stream(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<VoiceStream, ApiError>;

    /// One-shot fetch of the full spoken-help audio.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn voice_help_audio(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Vec<u8>, ApiError>;
}
