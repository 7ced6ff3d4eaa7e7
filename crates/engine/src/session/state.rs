//! Session state owned by the practice engine.

use chrono::{DateTime, Utc};

use api::CancelToken;
use practice_core::model::{HelpResponse, Question, SessionId, SessionRecord};

use super::columnar::ColumnarGrid;

/// Lifecycle phase of the practice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    InQuestion,
    Submitting,
    Ending,
    Over,
}

/// Submission feedback shown after an answer is graded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedbackState {
    pub visible: bool,
    pub is_correct: bool,
    pub message: String,
    /// Display string for the correct answer; for columnar questions this is
    /// the synthesized full equation.
    pub correct_answer: Option<String>,
}

/// Help-panel error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpErrorKind {
    /// No response was received.
    Network,
    /// The request was rejected by the collaborator (4xx).
    Server,
    /// The model failed or produced a fallback/incomplete response.
    Llm,
    Unknown,
}

impl HelpErrorKind {
    /// Whether retrying (manually or automatically) can plausibly succeed.
    #[must_use]
    pub fn can_retry(self) -> bool {
        matches!(self, Self::Network | Self::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelpError {
    pub kind: HelpErrorKind,
    pub message: String,
}

impl HelpError {
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.kind.can_retry()
    }
}

/// Per-question help panel state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HelpState {
    pub data: Option<HelpResponse>,
    pub is_visible: bool,
    pub is_loading: bool,
    pub error: Option<HelpError>,
    pub retry_count: u32,
}

/// Per-question voice help state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceHelpState {
    pub is_loading: bool,
    pub is_playing: bool,
    /// Playback progress 0..=100; estimated while streaming, 100 on
    /// completion.
    pub progress: u8,
    pub error: Option<String>,
}

/// The single mutable session structure. All mutation goes through engine
/// actions holding the lock; no await happens while it is held.
#[derive(Debug, Default)]
pub(crate) struct PracticeState {
    pub phase: SessionPhase,
    pub session_id: Option<SessionId>,
    pub question: Option<Question>,
    /// 1-based, monotonically increasing within a session.
    pub question_number: u32,
    pub total_questions: u32,
    pub score: u32,
    pub is_answer_submitted: bool,
    pub current_answer: String,
    pub columnar: Option<ColumnarGrid>,
    pub feedback: FeedbackState,
    pub help: HelpState,
    pub voice: VoiceHelpState,
    pub summary: Option<SessionRecord>,
    /// Notice recorded when the final summary fetch failed; the session
    /// still counts as over.
    pub summary_error: Option<String>,
    /// Bumped on every successful question load so a renderer can re-key
    /// transition animations.
    pub animation_key: u64,
    pub question_started_at: Option<DateTime<Utc>>,
    /// Invalidates in-flight help work (responses and delayed auto-retries)
    /// from an earlier question or an earlier request.
    pub help_epoch: u64,
    pub help_cancel: Option<CancelToken>,
    pub voice_cancel: Option<CancelToken>,
}

impl PracticeState {
    /// Resets the per-question transient state for a freshly loaded
    /// question. Cancellation of the previous question's help work is the
    /// caller's responsibility.
    pub fn reset_for_question(&mut self, question: Question, started_at: DateTime<Utc>) {
        self.columnar = ColumnarGrid::from_question(&question);
        self.question = Some(question);
        self.current_answer.clear();
        self.is_answer_submitted = false;
        self.feedback = FeedbackState::default();
        self.help = HelpState::default();
        self.voice = VoiceHelpState::default();
        self.animation_key = self.animation_key.wrapping_add(1);
        self.question_started_at = Some(started_at);
        self.help_epoch = self.help_epoch.wrapping_add(1);
    }

    #[must_use]
    pub fn is_session_over(&self) -> bool {
        self.phase == SessionPhase::Over
    }
}
