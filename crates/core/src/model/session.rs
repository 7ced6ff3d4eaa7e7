use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DifficultyId, DifficultyLevel, Question, SessionId};

/// A practice session as recorded by the collaborator API.
///
/// Returned both on session start (with an empty question list) and from the
/// summary endpoint (with every answered question populated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub difficulty_level_id: DifficultyId,
    pub total_questions_planned: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub current_question_index: u32,
    pub score: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level_details: Option<DifficultyLevel>,
}

impl SessionRecord {
    /// Number of questions the collaborator has recorded an answer for.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.answered_at.is_some())
            .count()
    }
}
