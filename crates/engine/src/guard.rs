//! Navigation guard glue.
//!
//! On each route visit the guard asks the flow engine whether the requested
//! step is reachable. Invalid visits queue the requested step and redirect
//! to the fallback; a later valid visit drains the queued step exactly once.

use tracing::debug;

use practice_core::model::NavigationStep;

use crate::flow::FlowEngine;

/// Outcome of a guarded visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// The visit stands; the engine now has the requested step as current.
    Allow,
    /// The consumer must navigate to this step instead.
    Redirect(NavigationStep),
}

/// Validates route visits against the flow engine.
#[derive(Debug, Clone, Copy)]
pub struct NavigationGuard {
    fallback: NavigationStep,
}

impl Default for NavigationGuard {
    fn default() -> Self {
        Self {
            fallback: NavigationStep::Welcome,
        }
    }
}

impl NavigationGuard {
    #[must_use]
    pub fn new(fallback: NavigationStep) -> Self {
        Self { fallback }
    }

    /// Handles a visit to `requested`.
    ///
    /// An unreachable step is queued as pending navigation and the visit is
    /// redirected to the fallback. A reachable step becomes current; if a
    /// pending step was queued earlier it is drained, and followed only when
    /// it differs from the step just visited and is itself reachable now.
    pub fn visit(&self, engine: &mut FlowEngine, requested: NavigationStep) -> GuardDecision {
        if !engine.can_proceed_to(requested) {
            debug!(step = %requested, fallback = %self.fallback, "visit rejected");
            engine.set_pending_navigation(requested);
            return GuardDecision::Redirect(self.fallback);
        }

        engine.navigate_to_step(requested, None);
        if let Some(pending) = engine.resolve_pending_navigation()
            && pending != requested
            && engine.can_proceed_to(pending)
        {
            debug!(step = %pending, "following pending navigation");
            return GuardDecision::Redirect(pending);
        }
        GuardDecision::Allow
    }
}
