use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DifficultyLevel;

/// Lower bound for questions per session.
pub const MIN_TOTAL_QUESTIONS: u32 = 5;
/// Upper bound for questions per session.
pub const MAX_TOTAL_QUESTIONS: u32 = 20;

const SUBJECT_MATHEMATICS: &str = "mathematics";
const SUBJECT_ENGLISH: &str = "english";
const SUBJECT_GENERAL_KNOWLEDGE: &str = "general-knowledge";

/// The fixed set of steps in the selection-and-practice flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationStep {
    Welcome,
    GradeSelection,
    SubjectSelection,
    MathematicsOptions,
    EnglishDevelopment,
    GeneralKnowledgeDevelopment,
    DifficultySelection,
    Practice,
    Summary,
}

impl NavigationStep {
    /// The step that follows `self`, given the accumulated selections.
    ///
    /// `Summary` is terminal and has no next step.
    #[must_use]
    pub fn next(self, flow: &SelectionFlow) -> Option<NavigationStep> {
        use NavigationStep::*;
        match self {
            Welcome => Some(GradeSelection),
            GradeSelection => Some(SubjectSelection),
            SubjectSelection => Some(match flow.subject.as_deref() {
                Some(SUBJECT_MATHEMATICS) => MathematicsOptions,
                Some(SUBJECT_ENGLISH) => EnglishDevelopment,
                Some(SUBJECT_GENERAL_KNOWLEDGE) => GeneralKnowledgeDevelopment,
                _ => DifficultySelection,
            }),
            MathematicsOptions | EnglishDevelopment | GeneralKnowledgeDevelopment => {
                Some(DifficultySelection)
            }
            DifficultySelection => Some(Practice),
            Practice => Some(Summary),
            Summary => None,
        }
    }

    /// The step that precedes `self`, given the accumulated selections.
    ///
    /// `Welcome` has no predecessor. `Summary` deliberately has none either:
    /// a completed session is exited through an explicit reset, not by
    /// backing out.
    #[must_use]
    pub fn previous(self, flow: &SelectionFlow) -> Option<NavigationStep> {
        use NavigationStep::*;
        match self {
            Welcome | Summary => None,
            GradeSelection => Some(Welcome),
            SubjectSelection => Some(GradeSelection),
            MathematicsOptions | EnglishDevelopment | GeneralKnowledgeDevelopment => {
                Some(SubjectSelection)
            }
            DifficultySelection => Some(match flow.subject.as_deref() {
                Some(SUBJECT_MATHEMATICS) => MathematicsOptions,
                Some(SUBJECT_ENGLISH) => EnglishDevelopment,
                Some(SUBJECT_GENERAL_KNOWLEDGE) => GeneralKnowledgeDevelopment,
                _ => SubjectSelection,
            }),
            Practice => Some(DifficultySelection),
        }
    }

    /// Whether this step is reachable with the given selections.
    ///
    /// `session_active` is the live-session marker owned by the flow engine;
    /// only `Summary` depends on it.
    #[must_use]
    pub fn reachable(self, flow: &SelectionFlow, session_active: bool) -> bool {
        use NavigationStep::*;
        match self {
            Welcome | GradeSelection => true,
            SubjectSelection => flow.grade.is_some(),
            MathematicsOptions => {
                flow.grade.is_some() && flow.subject.as_deref() == Some(SUBJECT_MATHEMATICS)
            }
            EnglishDevelopment => {
                flow.grade.is_some() && flow.subject.as_deref() == Some(SUBJECT_ENGLISH)
            }
            GeneralKnowledgeDevelopment => {
                flow.grade.is_some() && flow.subject.as_deref() == Some(SUBJECT_GENERAL_KNOWLEDGE)
            }
            DifficultySelection => flow.grade.is_some() && flow.math_track_complete(),
            Practice => {
                flow.grade.is_some() && flow.math_track_complete() && flow.difficulty.is_some()
            }
            Summary => session_active,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        use NavigationStep::*;
        match self {
            Welcome => "welcome",
            GradeSelection => "grade-selection",
            SubjectSelection => "subject-selection",
            MathematicsOptions => "mathematics-options",
            EnglishDevelopment => "english-development",
            GeneralKnowledgeDevelopment => "general-knowledge-development",
            DifficultySelection => "difficulty-selection",
            Practice => "practice",
            Summary => "summary",
        }
    }
}

impl fmt::Display for NavigationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a step name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStepError(String);

impl fmt::Display for ParseStepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown navigation step: {}", self.0)
    }
}

impl std::error::Error for ParseStepError {}

impl FromStr for NavigationStep {
    type Err = ParseStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use NavigationStep::*;
        Ok(match s {
            "welcome" => Welcome,
            "grade-selection" => GradeSelection,
            "subject-selection" => SubjectSelection,
            "mathematics-options" => MathematicsOptions,
            "english-development" => EnglishDevelopment,
            "general-knowledge-development" => GeneralKnowledgeDevelopment,
            "difficulty-selection" => DifficultySelection,
            "practice" => Practice,
            "summary" => Summary,
            other => return Err(ParseStepError(other.to_owned())),
        })
    }
}

/// Accumulated upstream selections gating which steps are reachable.
///
/// Invariant: changing an upstream field clears every downstream field
/// (grade → subject → math option → difficulty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionFlow {
    grade: Option<String>,
    subject: Option<String>,
    math_option: Option<String>,
    difficulty: Option<DifficultyLevel>,
    total_questions: u32,
}

impl Default for SelectionFlow {
    fn default() -> Self {
        Self {
            grade: None,
            subject: None,
            math_option: None,
            difficulty: None,
            total_questions: 10,
        }
    }
}

impl SelectionFlow {
    #[must_use]
    pub fn grade(&self) -> Option<&str> {
        self.grade.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn math_option(&self) -> Option<&str> {
        self.math_option.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&DifficultyLevel> {
        self.difficulty.as_ref()
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    /// Sets the grade, clearing subject, math option and difficulty.
    pub fn set_grade(&mut self, grade: impl Into<String>) {
        self.grade = Some(grade.into());
        self.subject = None;
        self.math_option = None;
        self.difficulty = None;
    }

    /// Sets the subject, clearing math option and difficulty.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = Some(subject.into());
        self.math_option = None;
        self.difficulty = None;
    }

    /// Sets the mathematics option, clearing difficulty.
    pub fn set_math_option(&mut self, option: impl Into<String>) {
        self.math_option = Some(option.into());
        self.difficulty = None;
    }

    pub fn set_difficulty(&mut self, difficulty: DifficultyLevel) {
        self.difficulty = Some(difficulty);
    }

    /// Sets the planned question count, clamped to the allowed bounds.
    pub fn set_total_questions(&mut self, count: u32) {
        self.total_questions = count.clamp(MIN_TOTAL_QUESTIONS, MAX_TOTAL_QUESTIONS);
    }

    /// True when a mathematics subject has its option chosen, or the subject
    /// is not mathematics at all.
    #[must_use]
    pub fn math_track_complete(&self) -> bool {
        match self.subject.as_deref() {
            None => false,
            Some(SUBJECT_MATHEMATICS) => self.math_option.is_some(),
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DifficultyId;

    fn difficulty() -> DifficultyLevel {
        DifficultyLevel {
            id: DifficultyId::new(1),
            name: "Starter".into(),
            code: "starter".into(),
            max_number: 10,
            allow_carry: false,
            allow_borrow: false,
            operation_types: vec!["addition".into()],
            order: 1,
        }
    }

    #[test]
    fn grade_change_clears_all_downstream() {
        let mut flow = SelectionFlow::default();
        flow.set_grade("grade-1");
        flow.set_subject("mathematics");
        flow.set_math_option("columnar");
        flow.set_difficulty(difficulty());

        flow.set_grade("grade-2");
        assert_eq!(flow.grade(), Some("grade-2"));
        assert!(flow.subject().is_none());
        assert!(flow.math_option().is_none());
        assert!(flow.difficulty().is_none());
    }

    #[test]
    fn subject_change_clears_option_and_difficulty() {
        let mut flow = SelectionFlow::default();
        flow.set_grade("grade-1");
        flow.set_subject("mathematics");
        flow.set_math_option("columnar");
        flow.set_difficulty(difficulty());

        flow.set_subject("english");
        assert_eq!(flow.grade(), Some("grade-1"));
        assert!(flow.math_option().is_none());
        assert!(flow.difficulty().is_none());
    }

    #[test]
    fn math_option_change_clears_difficulty() {
        let mut flow = SelectionFlow::default();
        flow.set_grade("grade-1");
        flow.set_subject("mathematics");
        flow.set_math_option("oral");
        flow.set_difficulty(difficulty());

        flow.set_math_option("columnar");
        assert!(flow.difficulty().is_none());
    }

    #[test]
    fn total_questions_is_clamped() {
        let mut flow = SelectionFlow::default();
        flow.set_total_questions(3);
        assert_eq!(flow.total_questions(), MIN_TOTAL_QUESTIONS);
        flow.set_total_questions(100);
        assert_eq!(flow.total_questions(), MAX_TOTAL_QUESTIONS);
        flow.set_total_questions(12);
        assert_eq!(flow.total_questions(), 12);
    }

    #[test]
    fn next_branches_on_subject() {
        let mut flow = SelectionFlow::default();
        flow.set_grade("grade-1");

        flow.set_subject("mathematics");
        assert_eq!(
            NavigationStep::SubjectSelection.next(&flow),
            Some(NavigationStep::MathematicsOptions)
        );

        flow.set_subject("english");
        assert_eq!(
            NavigationStep::SubjectSelection.next(&flow),
            Some(NavigationStep::EnglishDevelopment)
        );

        flow.set_subject("general-knowledge");
        assert_eq!(
            NavigationStep::SubjectSelection.next(&flow),
            Some(NavigationStep::GeneralKnowledgeDevelopment)
        );

        flow.set_subject("science");
        assert_eq!(
            NavigationStep::SubjectSelection.next(&flow),
            Some(NavigationStep::DifficultySelection)
        );
    }

    #[test]
    fn summary_is_terminal_in_both_directions() {
        let flow = SelectionFlow::default();
        assert_eq!(NavigationStep::Summary.next(&flow), None);
        assert_eq!(NavigationStep::Summary.previous(&flow), None);
        assert_eq!(NavigationStep::Welcome.previous(&flow), None);
    }

    #[test]
    fn previous_from_difficulty_mirrors_subject_branch() {
        let mut flow = SelectionFlow::default();
        flow.set_grade("grade-1");
        flow.set_subject("mathematics");
        assert_eq!(
            NavigationStep::DifficultySelection.previous(&flow),
            Some(NavigationStep::MathematicsOptions)
        );

        flow.set_subject("science");
        assert_eq!(
            NavigationStep::DifficultySelection.previous(&flow),
            Some(NavigationStep::SubjectSelection)
        );
    }

    #[test]
    fn practice_requires_full_selection() {
        let mut flow = SelectionFlow::default();
        assert!(!NavigationStep::Practice.reachable(&flow, false));

        flow.set_grade("grade-1");
        flow.set_subject("mathematics");
        assert!(!NavigationStep::DifficultySelection.reachable(&flow, false));

        flow.set_math_option("columnar");
        assert!(NavigationStep::DifficultySelection.reachable(&flow, false));
        assert!(!NavigationStep::Practice.reachable(&flow, false));

        flow.set_difficulty(difficulty());
        assert!(NavigationStep::Practice.reachable(&flow, false));
    }

    #[test]
    fn summary_requires_active_session() {
        let flow = SelectionFlow::default();
        assert!(!NavigationStep::Summary.reachable(&flow, false));
        assert!(NavigationStep::Summary.reachable(&flow, true));
    }

    #[test]
    fn step_name_roundtrip() {
        let step: NavigationStep = "general-knowledge-development".parse().unwrap();
        assert_eq!(step, NavigationStep::GeneralKnowledgeDevelopment);
        assert_eq!(step.to_string(), "general-knowledge-development");
        assert!("nowhere".parse::<NavigationStep>().is_err());
    }
}
