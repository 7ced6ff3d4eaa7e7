//! Practice session lifecycle.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use api::{ApiError, PracticeApi};
use practice_core::Clock;
use practice_core::model::{AnswerPayload, DifficultyId, QuestionError};

use crate::error::EngineError;

use super::columnar::ColumnarSlot;
use super::state::{FeedbackState, PracticeState, SessionPhase};

const CORRECT_MESSAGE: &str = "Correct! Well done.";
const INCORRECT_MESSAGE: &str = "Not quite. Check the correct answer below.";

/// The practice session state machine.
///
/// All state lives behind one lock; actions take `&self`, mutate under the
/// lock and release it before every await. Cloning shares the same session.
#[derive(Clone)]
pub struct PracticeEngine {
    api: Arc<dyn PracticeApi>,
    state: Arc<Mutex<PracticeState>>,
    clock: Clock,
    help_retry_delays: [Duration; 2],
}

impl PracticeEngine {
    #[must_use]
    pub fn new(api: Arc<dyn PracticeApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(PracticeState::default())),
            clock: Clock::default(),
            help_retry_delays: [Duration::from_secs(2), Duration::from_secs(3)],
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the help auto-retry delays (tests shorten them).
    #[must_use]
    pub fn with_help_retry_delays(mut self, delays: [Duration; 2]) -> Self {
        self.help_retry_delays = delays;
        self
    }

    // A poisoned lock is recovered rather than propagated; every critical
    // section leaves the state consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PracticeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn api(&self) -> &Arc<dyn PracticeApi> {
        &self.api
    }

    pub(crate) fn clock(&self) -> Clock {
        self.clock
    }

    pub(crate) fn help_retry_delays(&self) -> [Duration; 2] {
        self.help_retry_delays
    }

    /// Cancels any in-flight help and voice-help work.
    pub(crate) fn cancel_help_work(state: &mut PracticeState) {
        if let Some(token) = state.help_cancel.take() {
            token.cancel();
        }
        if let Some(token) = state.voice_cancel.take() {
            token.cancel();
        }
    }

    /// Starts a fresh session and loads its first question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StartFailed` on any failure; no partial session
    /// is left behind and starting can be retried from scratch.
    pub async fn start_session(
        &self,
        difficulty_id: DifficultyId,
        total_questions: u32,
    ) -> Result<(), EngineError> {
        {
            let mut state = self.lock();
            Self::cancel_help_work(&mut state);
            *state = PracticeState::default();
            state.phase = SessionPhase::Starting;
        }

        if let Err(err) = self.start_inner(difficulty_id, total_questions).await {
            warn!(%err, "session start failed, resetting");
            let mut state = self.lock();
            Self::cancel_help_work(&mut state);
            *state = PracticeState::default();
            return Err(EngineError::StartFailed(Box::new(err)));
        }
        Ok(())
    }

    async fn start_inner(
        &self,
        difficulty_id: DifficultyId,
        total_questions: u32,
    ) -> Result<(), EngineError> {
        let record = self.api.start_session(difficulty_id, total_questions).await?;
        debug!(session_id = %record.id, total = record.total_questions_planned, "session started");
        {
            let mut state = self.lock();
            state.session_id = Some(record.id);
            state.total_questions = record.total_questions_planned;
            state.score = 0;
            state.question_number = 0;
        }
        self.load_next_question().await
    }

    /// Loads the next question, or ends the session when the planned count
    /// is reached or the collaborator reports exhaustion.
    ///
    /// # Errors
    ///
    /// Transport failures other than not-found are returned and leave the
    /// session stalled at the current question; the call may be retried.
    pub async fn load_next_question(&self) -> Result<(), EngineError> {
        let session_id = {
            let state = self.lock();
            let session_id = state.session_id.ok_or(EngineError::NoActiveSession)?;
            if state.question_number >= state.total_questions {
                None
            } else {
                Some(session_id)
            }
        };
        let Some(session_id) = session_id else {
            // Planned count reached; never over-fetch.
            return self.end_session().await;
        };

        match self.api.next_question(session_id).await {
            Ok(question) => {
                question.validate()?;
                let now = self.clock.now();
                let mut state = self.lock();
                Self::cancel_help_work(&mut state);
                state.question_number += 1;
                state.reset_for_question(question, now);
                state.phase = SessionPhase::InQuestion;
                debug!(number = state.question_number, "question loaded");
                Ok(())
            }
            Err(ApiError::NotFound) => {
                debug!("no more questions, ending session");
                self.end_session().await
            }
            Err(err) => {
                warn!(%err, "question load failed");
                Err(err.into())
            }
        }
    }

    /// Submits the current answer and applies the graded result.
    ///
    /// A second call for the same question is a no-op. Submitting the final
    /// planned question ends the session after grading.
    ///
    /// # Errors
    ///
    /// `IncompleteAnswer` when a columnar grid still has blanks,
    /// `InvalidAnswer` when the plain answer is not a number, or the
    /// transport failure — which re-enables submission for a retry.
    pub async fn submit_current_answer(&self) -> Result<(), EngineError> {
        let (payload, is_columnar) = {
            let mut state = self.lock();
            let session_id = state.session_id.ok_or(EngineError::NoActiveSession)?;
            let question = state
                .question
                .as_ref()
                .ok_or(EngineError::NoCurrentQuestion)?;
            if state.is_answer_submitted {
                return Ok(());
            }
            let question_id = question.id;
            let is_columnar = question.is_columnar();
            let time_spent = state.question_started_at.map(|started| {
                (self.clock.now() - started).num_milliseconds() as f64 / 1000.0
            });

            let payload = if is_columnar {
                let grid = state
                    .columnar
                    .as_ref()
                    .ok_or(EngineError::Question(QuestionError::MissingColumnarData))?;
                if !grid.is_complete() {
                    return Err(EngineError::IncompleteAnswer);
                }
                AnswerPayload {
                    session_id,
                    question_id,
                    user_answer: None,
                    user_filled_operands: Some(grid.filled_operands()),
                    user_filled_result: Some(grid.filled_result()),
                    time_spent,
                }
            } else {
                let text = state.current_answer.trim();
                let value: i64 = text
                    .parse()
                    .map_err(|_| EngineError::InvalidAnswer(text.to_owned()))?;
                AnswerPayload {
                    session_id,
                    question_id,
                    user_answer: Some(value),
                    user_filled_operands: None,
                    user_filled_result: None,
                    time_spent,
                }
            };

            state.is_answer_submitted = true;
            state.phase = SessionPhase::Submitting;
            (payload, is_columnar)
        };

        match self.api.submit_answer(&payload).await {
            Ok(graded) => {
                let is_final = {
                    let mut state = self.lock();
                    let is_correct = graded.is_correct.unwrap_or(false);
                    if is_correct {
                        state.score += 1;
                    }
                    let correct_display = if is_columnar {
                        graded
                            .columnar_equation()
                            .unwrap_or_else(|| graded.correct_answer.to_string())
                    } else {
                        graded.correct_answer.to_string()
                    };
                    state.feedback = FeedbackState {
                        visible: true,
                        is_correct,
                        message: if is_correct {
                            CORRECT_MESSAGE.into()
                        } else {
                            INCORRECT_MESSAGE.into()
                        },
                        correct_answer: Some(correct_display),
                    };
                    state.question = Some(graded);
                    state.phase = SessionPhase::InQuestion;
                    state.question_number >= state.total_questions
                };
                if is_final {
                    self.end_session().await
                } else {
                    Ok(())
                }
            }
            Err(err) => {
                warn!(%err, "answer submission failed");
                let mut state = self.lock();
                state.is_answer_submitted = false;
                state.phase = SessionPhase::InQuestion;
                Err(err.into())
            }
        }
    }

    /// Ends the session and fetches the summary.
    ///
    /// A summary-fetch failure does not block completion: the session is
    /// marked over either way and the miss is surfaced through
    /// [`super::SessionView::summary_error`].
    ///
    /// # Errors
    ///
    /// `NoActiveSession` when no session was ever started.
    pub async fn end_session(&self) -> Result<(), EngineError> {
        let session_id = {
            let mut state = self.lock();
            Self::cancel_help_work(&mut state);
            let session_id = state.session_id.ok_or(EngineError::NoActiveSession)?;
            state.phase = SessionPhase::Ending;
            session_id
        };

        match self.api.summary(session_id).await {
            Ok(summary) => {
                let mut state = self.lock();
                state.summary = Some(summary);
                state.summary_error = None;
                state.phase = SessionPhase::Over;
            }
            Err(err) => {
                warn!(%err, "summary fetch failed, session is over regardless");
                let mut state = self.lock();
                state.summary_error = Some(format!("could not load the session summary: {err}"));
                state.phase = SessionPhase::Over;
            }
        }
        Ok(())
    }

    /// Discards the session entirely, returning to the idle state.
    pub fn reset(&self) {
        let mut state = self.lock();
        Self::cancel_help_work(&mut state);
        *state = PracticeState::default();
    }

    /// Replaces the plain-arithmetic answer buffer. Ignored after the
    /// answer has been submitted.
    pub fn set_current_answer(&self, answer: impl Into<String>) {
        let mut state = self.lock();
        if !state.is_answer_submitted {
            state.current_answer = answer.into();
        }
    }

    /// Writes a digit into a columnar blank; see
    /// [`super::ColumnarGrid::write_digit`]. Returns whether a digit was
    /// written.
    pub fn update_columnar_digit(&self, slot: ColumnarSlot, digit: u8) -> bool {
        let mut state = self.lock();
        if state.is_answer_submitted {
            return false;
        }
        state
            .columnar
            .as_mut()
            .is_some_and(|grid| grid.write_digit(slot, digit))
    }

    pub fn set_active_columnar_input(&self, slot: Option<ColumnarSlot>) {
        let mut state = self.lock();
        if state.is_answer_submitted {
            return;
        }
        if let Some(grid) = state.columnar.as_mut() {
            grid.set_active(slot);
        }
    }

    /// Clears every user-filled columnar digit and refocuses the first
    /// blank. Ignored after submission.
    pub fn clear_columnar_inputs(&self) {
        let mut state = self.lock();
        if state.is_answer_submitted {
            return;
        }
        if let Some(grid) = state.columnar.as_mut() {
            grid.clear();
        }
    }

    pub fn dismiss_feedback(&self) {
        self.lock().feedback.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use api::{CancelToken, VoiceStream};
    use practice_core::model::{
        DifficultyLevel, HelpResponse, Question, QuestionId, SessionId, SessionRecord,
    };

    struct NeverCalledApi;

    #[async_trait]
    impl PracticeApi for NeverCalledApi {
        async fn difficulty_levels(&self) -> Result<Vec<DifficultyLevel>, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn start_session(
            &self,
            _difficulty_id: DifficultyId,
            _total_questions: u32,
        ) -> Result<SessionRecord, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn next_question(&self, _session_id: SessionId) -> Result<Question, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn submit_answer(&self, _payload: &AnswerPayload) -> Result<Question, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn summary(&self, _session_id: SessionId) -> Result<SessionRecord, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn question_help(
            &self,
            _session_id: SessionId,
            _question_id: QuestionId,
            _cancel: &CancelToken,
        ) -> Result<HelpResponse, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn voice_help_stream(
            &self,
            _session_id: SessionId,
            _question_id: QuestionId,
        ) -> Result<VoiceStream, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }

        async fn voice_help_audio(
            &self,
            _session_id: SessionId,
            _question_id: QuestionId,
        ) -> Result<Vec<u8>, ApiError> {
            Err(ApiError::Unknown("unused".into()))
        }
    }

    #[test]
    fn a_poisoned_state_lock_is_recovered_not_propagated() {
        let engine = PracticeEngine::new(Arc::new(NeverCalledApi));
        let poisoner = engine.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison the session lock");
        })
        .join();

        engine.set_current_answer("42");
        assert_eq!(engine.answer_view().current_answer, "42");
        assert_eq!(engine.session_view().phase, SessionPhase::Idle);
    }
}
