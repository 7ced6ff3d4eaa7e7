//! Navigation flow engine.
//!
//! Owns the current [`NavigationStep`], the accumulated [`SelectionFlow`],
//! an append-only history of visited steps and the one-slot pending
//! navigation queue used by the guard. Invalid navigation never errors; it
//! degrades to "stay put" (`go_forward` returns `None`).

use chrono::{DateTime, Utc};
use tracing::debug;

use practice_core::Clock;
use practice_core::model::{DifficultyLevel, NavigationStep, SelectionFlow};

/// One visited step, recorded when navigation moves away from it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub step: NavigationStep,
    pub at: DateTime<Utc>,
    pub data: Option<serde_json::Value>,
}

/// Read-only digest of the navigation state for a consumer layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSummary {
    pub current: NavigationStep,
    pub next: Option<NavigationStep>,
    pub previous: Option<NavigationStep>,
    pub can_go_forward: bool,
    pub can_go_back: bool,
    /// Completed selection milestones, out of [`Self::total_steps`].
    pub completed_steps: u8,
    pub total_steps: u8,
    /// Selection progress through the flow, 0..=100.
    pub progress_percent: u8,
}

/// The selection-and-practice navigation state machine.
#[derive(Debug, Clone)]
pub struct FlowEngine {
    current: NavigationStep,
    flow: SelectionFlow,
    history: Vec<HistoryEntry>,
    pending: Option<NavigationStep>,
    session_active: bool,
    clock: Clock,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

impl FlowEngine {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            current: NavigationStep::Welcome,
            flow: SelectionFlow::default(),
            history: Vec::new(),
            pending: None,
            session_active: false,
            clock,
        }
    }

    #[must_use]
    pub fn current(&self) -> NavigationStep {
        self.current
    }

    #[must_use]
    pub fn flow(&self) -> &SelectionFlow {
        &self.flow
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    #[must_use]
    pub fn session_active(&self) -> bool {
        self.session_active
    }

    /// Whether `step` is reachable with the current selections.
    #[must_use]
    pub fn can_proceed_to(&self, step: NavigationStep) -> bool {
        step.reachable(&self.flow, self.session_active)
    }

    /// True when every selection needed to start practicing is present.
    #[must_use]
    pub fn has_valid_flow(&self) -> bool {
        self.can_proceed_to(NavigationStep::Practice)
    }

    /// Moves to `step`, pushing the step being left onto the history.
    pub fn navigate_to_step(&mut self, step: NavigationStep, data: Option<serde_json::Value>) {
        debug!(from = %self.current, to = %step, "navigate");
        self.history.push(HistoryEntry {
            step: self.current,
            at: self.clock.now(),
            data,
        });
        self.current = step;
    }

    /// Transitions backward along the transition table.
    ///
    /// Returns the new current step, or `None` from `Welcome` and `Summary`
    /// (a completed session is exited through an explicit reset).
    pub fn go_back(&mut self) -> Option<NavigationStep> {
        let previous = self.current.previous(&self.flow)?;
        self.navigate_to_step(previous, None);
        Some(previous)
    }

    /// Transitions forward along the transition table, gated by
    /// reachability. Returns `None`, leaving the current step unchanged,
    /// when there is no next step or the next step is not yet reachable.
    pub fn go_forward(&mut self) -> Option<NavigationStep> {
        let next = self.current.next(&self.flow)?;
        if !self.can_proceed_to(next) {
            debug!(from = %self.current, to = %next, "forward navigation blocked");
            return None;
        }
        self.navigate_to_step(next, None);
        Some(next)
    }

    /// Queues a step to redirect to once the flow becomes valid for it.
    /// One slot only; a newer pending step replaces an older one.
    pub fn set_pending_navigation(&mut self, step: NavigationStep) {
        self.pending = Some(step);
    }

    #[must_use]
    pub fn pending_navigation(&self) -> Option<NavigationStep> {
        self.pending
    }

    /// Drains the pending slot. The queued step is delivered exactly once.
    pub fn resolve_pending_navigation(&mut self) -> Option<NavigationStep> {
        self.pending.take()
    }

    pub fn mark_session_started(&mut self) {
        self.session_active = true;
    }

    pub fn mark_session_ended(&mut self) {
        self.session_active = false;
    }

    pub fn set_grade(&mut self, grade: impl Into<String>) {
        self.flow.set_grade(grade);
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.flow.set_subject(subject);
    }

    pub fn set_math_option(&mut self, option: impl Into<String>) {
        self.flow.set_math_option(option);
    }

    pub fn set_difficulty(&mut self, difficulty: DifficultyLevel) {
        self.flow.set_difficulty(difficulty);
    }

    pub fn set_total_questions(&mut self, count: u32) {
        self.flow.set_total_questions(count);
    }

    /// Resets everything back to the welcome step with empty selections.
    pub fn reset(&mut self) {
        self.flow = SelectionFlow::default();
        self.current = NavigationStep::Welcome;
        self.history.clear();
        self.pending = None;
        self.session_active = false;
    }

    #[must_use]
    pub fn navigation_summary(&self) -> NavigationSummary {
        let next = self.current.next(&self.flow);
        let (completed, total) = self.milestones();
        NavigationSummary {
            current: self.current,
            next,
            previous: self.current.previous(&self.flow),
            can_go_forward: next.is_some_and(|step| self.can_proceed_to(step)),
            can_go_back: self.current.previous(&self.flow).is_some(),
            completed_steps: completed,
            total_steps: total,
            progress_percent: u8::try_from(
                (usize::from(completed) * 100 / usize::from(total)).min(100),
            )
            .unwrap_or(100),
        }
    }

    /// Completed selection milestones out of six: entering the flow, grade,
    /// subject, subject track, difficulty, live session.
    fn milestones(&self) -> (u8, u8) {
        let milestones = [
            true,
            self.flow.grade().is_some(),
            self.flow.subject().is_some(),
            self.flow.math_track_complete(),
            self.flow.difficulty().is_some(),
            self.session_active,
        ];
        let completed = milestones.iter().filter(|done| **done).count();
        (
            u8::try_from(completed).unwrap_or(u8::MAX),
            milestones.len() as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::DifficultyId;
    use practice_core::time::fixed_now;

    fn difficulty() -> DifficultyLevel {
        DifficultyLevel {
            id: DifficultyId::new(1),
            name: "Starter".into(),
            code: "starter".into(),
            max_number: 20,
            allow_carry: false,
            allow_borrow: false,
            operation_types: vec!["addition".into()],
            order: 1,
        }
    }

    fn engine() -> FlowEngine {
        FlowEngine::new(Clock::fixed(fixed_now()))
    }

    #[test]
    fn navigation_records_history() {
        let mut engine = engine();
        engine.navigate_to_step(
            NavigationStep::GradeSelection,
            Some(serde_json::json!({"from": "intro"})),
        );
        engine.navigate_to_step(NavigationStep::SubjectSelection, None);

        assert_eq!(engine.current(), NavigationStep::SubjectSelection);
        let steps: Vec<_> = engine.history().iter().map(|entry| entry.step).collect();
        assert_eq!(
            steps,
            vec![NavigationStep::Welcome, NavigationStep::GradeSelection]
        );
        assert!(engine.history()[0].data.is_some());
        assert_eq!(engine.history()[0].at, fixed_now());
    }

    #[test]
    fn go_forward_is_gated_by_reachability() {
        let mut engine = engine();
        assert_eq!(engine.go_forward(), Some(NavigationStep::GradeSelection));

        // Subject selection needs a grade.
        assert_eq!(engine.go_forward(), None);
        assert_eq!(engine.current(), NavigationStep::GradeSelection);

        engine.set_grade("grade-1");
        assert_eq!(engine.go_forward(), Some(NavigationStep::SubjectSelection));

        engine.set_subject("mathematics");
        assert_eq!(engine.go_forward(), Some(NavigationStep::MathematicsOptions));
    }

    #[test]
    fn go_back_stops_at_welcome_and_summary() {
        let mut engine = engine();
        assert_eq!(engine.go_back(), None);

        engine.navigate_to_step(NavigationStep::Summary, None);
        assert_eq!(engine.go_back(), None);
        assert_eq!(engine.current(), NavigationStep::Summary);
    }

    #[test]
    fn pending_navigation_is_drained_once() {
        let mut engine = engine();
        engine.set_pending_navigation(NavigationStep::Practice);
        assert_eq!(
            engine.resolve_pending_navigation(),
            Some(NavigationStep::Practice)
        );
        assert_eq!(engine.resolve_pending_navigation(), None);
    }

    #[test]
    fn progress_tracks_selection_milestones() {
        let mut engine = engine();
        assert_eq!(engine.navigation_summary().progress_percent, 16);

        engine.set_grade("grade-1");
        engine.set_subject("english");
        // Non-mathematics subjects complete their track immediately.
        assert_eq!(engine.navigation_summary().progress_percent, 66);

        engine.set_difficulty(difficulty());
        engine.mark_session_started();
        let summary = engine.navigation_summary();
        assert_eq!(summary.completed_steps, 6);
        assert_eq!(summary.progress_percent, 100);
    }

    #[test]
    fn reset_restores_the_initial_state() {
        let mut engine = engine();
        engine.set_grade("grade-1");
        engine.navigate_to_step(NavigationStep::GradeSelection, None);
        engine.set_pending_navigation(NavigationStep::Practice);
        engine.mark_session_started();

        engine.reset();
        assert_eq!(engine.current(), NavigationStep::Welcome);
        assert!(engine.flow().grade().is_none());
        assert!(engine.history().is_empty());
        assert_eq!(engine.pending_navigation(), None);
        assert!(!engine.session_active());
    }
}
