//! Text-help subsystem.
//!
//! At most one help request per question is in flight. Issuing a new
//! request cancels the previous help and voice-help work. Responses and
//! delayed auto-retries carry the epoch captured at request time; anything
//! arriving for a closed panel, a different question or a superseded
//! request is dropped silently.

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use api::{ApiError, CancelToken};
use practice_core::model::{QuestionId, SessionId};

use super::engine::PracticeEngine;
use super::state::{HelpError, HelpErrorKind};

const MAX_AUTO_RETRIES: u32 = 2;

impl PracticeEngine {
    /// Opens the help panel and requests help for the current question.
    ///
    /// Without an active session and question this is a no-op. The outcome
    /// lands in the help state, not in a return value: help failures are
    /// scoped to the panel and never affect the session.
    pub async fn request_help(&self) {
        let Some((session_id, question_id, token, epoch)) = self.begin_help(true) else {
            return;
        };
        self.help_attempt(session_id, question_id, token, epoch, 0)
            .await;
    }

    /// Manual retry: clears the error and re-issues the same request with a
    /// fresh auto-retry allowance. Previously shown help content is kept until
    /// the new response replaces it.
    pub async fn retry_help(&self) {
        let Some((session_id, question_id, token, epoch)) = self.begin_help(false) else {
            return;
        };
        self.help_attempt(session_id, question_id, token, epoch, 0)
            .await;
    }

    /// Closes the help panel, cancelling the in-flight request, any pending
    /// auto-retry and any voice playback started from the panel. None of
    /// them may fire after this, and none may reopen the panel.
    pub fn hide_help(&self) {
        let mut state = self.lock();
        Self::cancel_help_work(&mut state);
        state.help_epoch = state.help_epoch.wrapping_add(1);
        state.help.is_visible = false;
        state.help.is_loading = false;
        state.voice.is_loading = false;
        state.voice.is_playing = false;
    }

    pub fn clear_help_error(&self) {
        self.lock().help.error = None;
    }

    /// Common setup: cancel prior help/voice work, open the panel in the
    /// loading state and hand out a fresh token plus the current epoch.
    fn begin_help(&self, fresh: bool) -> Option<(SessionId, QuestionId, CancelToken, u64)> {
        let mut state = self.lock();
        let session_id = state.session_id?;
        let question_id = state.question.as_ref()?.id;

        Self::cancel_help_work(&mut state);
        state.help_epoch = state.help_epoch.wrapping_add(1);
        let epoch = state.help_epoch;

        let token = CancelToken::new();
        state.help_cancel = Some(token.clone());
        state.help.is_visible = true;
        state.help.is_loading = true;
        state.help.error = None;
        state.help.retry_count = 0;
        if fresh {
            state.help.data = None;
        }
        Some((session_id, question_id, token, epoch))
    }

    fn help_attempt(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        token: CancelToken,
        epoch: u64,
        attempt: u32,
    ) -> BoxFuture<'static, ()> {
        let engine = self.clone();
        async move {
            let result = engine
                .api()
                .question_help(session_id, question_id, &token)
                .await;

            let retry = {
                let mut state = engine.lock();
                // Drop stale outcomes: cancelled, superseded, or panel closed.
                if token.is_cancelled() || state.help_epoch != epoch || !state.help.is_visible {
                    debug!("dropping stale help outcome");
                    return;
                }

                let error = match result {
                    Ok(response) if response.is_fallback => HelpError {
                        kind: HelpErrorKind::Llm,
                        message: "the helper fell back to a canned answer".into(),
                    },
                    Ok(response) if !response.is_structurally_complete() => HelpError {
                        kind: HelpErrorKind::Llm,
                        message: "the helper returned an incomplete explanation".into(),
                    },
                    Ok(response) => {
                        state.help.data = Some(response);
                        state.help.is_loading = false;
                        state.help.error = None;
                        state.help_cancel = None;
                        return;
                    }
                    Err(ApiError::Cancelled) => return,
                    Err(err) => classify_help_error(&err),
                };

                warn!(kind = ?error.kind, message = %error.message, attempt, "help request failed");
                state.help.is_loading = false;
                let auto_retry =
                    error.can_retry() && state.help.retry_count < MAX_AUTO_RETRIES;
                state.help.error = Some(error);
                state.help_cancel = None;

                if auto_retry {
                    let delay_index = state.help.retry_count as usize;
                    state.help.retry_count += 1;
                    // The wait itself is cancellable through the stored token.
                    let wait_token = CancelToken::new();
                    state.help_cancel = Some(wait_token.clone());
                    Some((wait_token, engine.help_retry_delays()[delay_index.min(1)]))
                } else {
                    None
                }
            };

            let Some((wait_token, delay)) = retry else {
                return;
            };

            let engine = engine.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = wait_token.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }

                // Re-validate after the wait: the panel must still be open
                // and showing the same request generation.
                let next_token = {
                    let mut state = engine.lock();
                    if wait_token.is_cancelled()
                        || state.help_epoch != epoch
                        || !state.help.is_visible
                    {
                        return;
                    }
                    let token = CancelToken::new();
                    state.help_cancel = Some(token.clone());
                    state.help.is_loading = true;
                    state.help.error = None;
                    token
                };
                engine
                    .help_attempt(session_id, question_id, next_token, epoch, attempt + 1)
                    .await;
            });
        }
        .boxed()
    }
}

fn classify_help_error(err: &ApiError) -> HelpError {
    let kind = match err {
        ApiError::Network(_) => HelpErrorKind::Network,
        ApiError::Server { .. } | ApiError::Llm => HelpErrorKind::Llm,
        ApiError::Validation { .. } | ApiError::NotFound => HelpErrorKind::Server,
        _ => HelpErrorKind::Unknown,
    };
    HelpError {
        kind,
        message: err.to_string(),
    }
}
