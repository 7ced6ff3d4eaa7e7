//! Read-only projections of the session state for a consumer layer.

use practice_core::model::{Question, SessionId, SessionRecord};

use super::columnar::ColumnarSlot;
use super::engine::PracticeEngine;
use super::state::{FeedbackState, HelpState, SessionPhase, VoiceHelpState};

/// Session lifecycle snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session_id: Option<SessionId>,
    pub phase: SessionPhase,
    pub is_session_over: bool,
    pub question_number: u32,
    pub total_questions: u32,
    pub score: u32,
    pub summary: Option<SessionRecord>,
    /// Non-fatal notice when the session ended but its summary could not be
    /// fetched.
    pub summary_error: Option<String>,
}

/// Current question snapshot; `animation_key` changes on every load so a
/// renderer can re-key transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub question: Option<Question>,
    pub animation_key: u64,
}

/// Answer-entry snapshot, covering both plain and columnar questions.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerView {
    pub current_answer: String,
    pub is_answer_submitted: bool,
    pub active_input: Option<ColumnarSlot>,
    pub columnar_operands: Option<Vec<Vec<Option<u8>>>>,
    pub columnar_result: Option<Vec<Option<u8>>>,
    /// For columnar questions, whether every blank holds a digit; plain
    /// questions are complete once the answer buffer is non-empty.
    pub is_complete: bool,
}

/// Progress through the session, 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressView {
    pub question_number: u32,
    pub total_questions: u32,
    pub score: u32,
    pub percent: u8,
}

impl PracticeEngine {
    #[must_use]
    pub fn session_view(&self) -> SessionView {
        let state = self.lock();
        SessionView {
            session_id: state.session_id,
            phase: state.phase,
            is_session_over: state.is_session_over(),
            question_number: state.question_number,
            total_questions: state.total_questions,
            score: state.score,
            summary: state.summary.clone(),
            summary_error: state.summary_error.clone(),
        }
    }

    #[must_use]
    pub fn question_view(&self) -> QuestionView {
        let state = self.lock();
        QuestionView {
            question: state.question.clone(),
            animation_key: state.animation_key,
        }
    }

    #[must_use]
    pub fn answer_view(&self) -> AnswerView {
        let state = self.lock();
        let is_complete = match &state.columnar {
            Some(grid) => grid.is_complete(),
            None => !state.current_answer.trim().is_empty(),
        };
        AnswerView {
            current_answer: state.current_answer.clone(),
            is_answer_submitted: state.is_answer_submitted,
            active_input: state.columnar.as_ref().and_then(|grid| grid.active()),
            columnar_operands: state.columnar.as_ref().map(|grid| grid.operands().to_vec()),
            columnar_result: state.columnar.as_ref().map(|grid| grid.result().to_vec()),
            is_complete,
        }
    }

    #[must_use]
    pub fn progress_view(&self) -> ProgressView {
        let state = self.lock();
        let percent = if state.total_questions == 0 {
            0
        } else {
            let answered = state
                .question_number
                .saturating_sub(u32::from(!state.is_answer_submitted));
            (answered * 100 / state.total_questions).min(100)
        };
        ProgressView {
            question_number: state.question_number,
            total_questions: state.total_questions,
            score: state.score,
            percent: u8::try_from(percent).unwrap_or(100),
        }
    }

    #[must_use]
    pub fn feedback_view(&self) -> FeedbackState {
        self.lock().feedback.clone()
    }

    #[must_use]
    pub fn help_view(&self) -> HelpState {
        self.lock().help.clone()
    }

    #[must_use]
    pub fn voice_help_view(&self) -> VoiceHelpState {
        self.lock().voice.clone()
    }
}
