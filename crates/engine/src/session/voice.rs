//! Voice-help playback with ordered fallback tiers.
//!
//! Playback itself is an external collaborator behind [`VoicePlayback`];
//! this module owns the tier ordering (progressive streaming, buffered
//! streaming, one-shot fetch), the uniform cancellation contract and the
//! progress bookkeeping. Each tier is tried at most once per request.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use api::CancelToken;
use practice_core::model::{QuestionId, SessionId};

use super::engine::PracticeEngine;
use super::state::VoiceHelpState;

/// Rough audio size used to estimate progress while streaming; the value is
/// clamped below 100 until playback actually completes.
const ESTIMATED_VOICE_BYTES: usize = 64 * 1024;

/// Failure reported by the audio collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AudioError {
    #[error("audio playback failed: {0}")]
    Playback(String),

    #[error("streaming playback is not supported")]
    StreamingUnsupported,
}

/// Audio output collaborator. Internals (decoding, buffering, devices) are
/// out of scope; only the completion/error/stop contract matters here.
#[async_trait]
pub trait VoicePlayback: Send + Sync {
    /// Whether chunks may be played as they arrive.
    fn supports_streaming(&self) -> bool;

    /// Plays a chunk progressively.
    ///
    /// # Errors
    ///
    /// Returns `AudioError` when the chunk cannot be played.
    async fn push_chunk(&self, chunk: Bytes) -> Result<(), AudioError>;

    /// Signals the end of a progressive stream and waits for playback.
    ///
    /// # Errors
    ///
    /// Returns `AudioError` when the tail of the stream cannot be played.
    async fn finish(&self) -> Result<(), AudioError>;

    /// Plays a complete audio buffer to the end.
    ///
    /// # Errors
    ///
    /// Returns `AudioError` when playback fails.
    async fn play_all(&self, audio: Vec<u8>) -> Result<(), AudioError>;

    /// Stops playback and releases the audio resource. Idempotent.
    async fn stop(&self);
}

#[derive(Debug, Clone, Copy)]
enum VoiceTier {
    Progressive,
    BufferedStream,
    OneShot,
}

enum TierFailure {
    Cancelled,
    Failed(String),
}

impl PracticeEngine {
    /// Fetches and plays spoken help for the current question.
    ///
    /// Tiers are tried in strict order, each once: progressive streaming,
    /// buffered streaming, one-shot fetch-then-play. A user cancellation at
    /// any point stops playback and is never recorded as an error. Without
    /// an active session and question this is a no-op.
    pub async fn request_voice_help(&self, sink: Arc<dyn VoicePlayback>) {
        let begun = {
            let mut state = self.lock();
            match (state.session_id, state.question.as_ref().map(|q| q.id)) {
                (Some(session_id), Some(question_id)) => {
                    if let Some(previous) = state.voice_cancel.take() {
                        previous.cancel();
                    }
                    let token = CancelToken::new();
                    state.voice_cancel = Some(token.clone());
                    state.voice = VoiceHelpState {
                        is_loading: true,
                        ..VoiceHelpState::default()
                    };
                    Some((session_id, question_id, token))
                }
                _ => None,
            }
        };
        let Some((session_id, question_id, token)) = begun else {
            return;
        };

        let mut last_failure = None;
        for tier in [
            VoiceTier::Progressive,
            VoiceTier::BufferedStream,
            VoiceTier::OneShot,
        ] {
            if token.is_cancelled() {
                sink.stop().await;
                return;
            }
            match self
                .run_voice_tier(tier, session_id, question_id, &sink, &token)
                .await
            {
                Ok(()) => {
                    let mut state = self.lock();
                    if Self::voice_token_is_current(&state, &token) {
                        state.voice.is_loading = false;
                        state.voice.is_playing = false;
                        state.voice.progress = 100;
                        state.voice_cancel = None;
                    }
                    return;
                }
                Err(TierFailure::Cancelled) => {
                    debug!(?tier, "voice help cancelled");
                    sink.stop().await;
                    return;
                }
                Err(TierFailure::Failed(message)) => {
                    warn!(?tier, %message, "voice tier failed, falling back");
                    sink.stop().await;
                    last_failure = Some(message);
                }
            }
        }

        let mut state = self.lock();
        if Self::voice_token_is_current(&state, &token) {
            state.voice.is_loading = false;
            state.voice.is_playing = false;
            state.voice.error =
                Some(last_failure.unwrap_or_else(|| "voice help unavailable".into()));
            state.voice_cancel = None;
        }
    }

    /// Stops voice playback. The in-flight request observes the cancelled
    /// token and releases the audio resource without recording an error.
    pub fn stop_voice_help(&self) {
        let mut state = self.lock();
        if let Some(token) = state.voice_cancel.take() {
            token.cancel();
        }
        state.voice.is_loading = false;
        state.voice.is_playing = false;
    }

    async fn run_voice_tier(
        &self,
        tier: VoiceTier,
        session_id: SessionId,
        question_id: QuestionId,
        sink: &Arc<dyn VoicePlayback>,
        token: &CancelToken,
    ) -> Result<(), TierFailure> {
        match tier {
            VoiceTier::Progressive => {
                if !sink.supports_streaming() {
                    return Err(TierFailure::Failed(
                        AudioError::StreamingUnsupported.to_string(),
                    ));
                }
                let mut stream = self
                    .api()
                    .voice_help_stream(session_id, question_id)
                    .await
                    .map_err(fail)?;
                self.mark_voice_playing(token);

                let mut received = 0usize;
                loop {
                    let chunk = tokio::select! {
                        () = token.cancelled() => return Err(TierFailure::Cancelled),
                        chunk = stream.next() => chunk,
                    };
                    match chunk {
                        None => break,
                        Some(Ok(bytes)) => {
                            received += bytes.len();
                            sink.push_chunk(bytes).await.map_err(fail)?;
                            self.set_voice_progress(token, estimate_progress(received));
                        }
                        Some(Err(err)) => return Err(fail(err)),
                    }
                }
                tokio::select! {
                    () = token.cancelled() => Err(TierFailure::Cancelled),
                    result = sink.finish() => result.map_err(fail),
                }
            }
            VoiceTier::BufferedStream => {
                let mut stream = self
                    .api()
                    .voice_help_stream(session_id, question_id)
                    .await
                    .map_err(fail)?;

                let mut buffer = Vec::new();
                loop {
                    let chunk = tokio::select! {
                        () = token.cancelled() => return Err(TierFailure::Cancelled),
                        chunk = stream.next() => chunk,
                    };
                    match chunk {
                        None => break,
                        Some(Ok(bytes)) => {
                            buffer.extend_from_slice(&bytes);
                            self.set_voice_progress(token, estimate_progress(buffer.len()));
                        }
                        Some(Err(err)) => return Err(fail(err)),
                    }
                }

                self.mark_voice_playing(token);
                tokio::select! {
                    () = token.cancelled() => Err(TierFailure::Cancelled),
                    result = sink.play_all(buffer) => result.map_err(fail),
                }
            }
            VoiceTier::OneShot => {
                let audio = tokio::select! {
                    () = token.cancelled() => return Err(TierFailure::Cancelled),
                    result = self.api().voice_help_audio(session_id, question_id) => {
                        result.map_err(fail)?
                    }
                };
                self.mark_voice_playing(token);
                tokio::select! {
                    () = token.cancelled() => Err(TierFailure::Cancelled),
                    result = sink.play_all(audio) => result.map_err(fail),
                }
            }
        }
    }

    fn voice_token_is_current(state: &super::state::PracticeState, token: &CancelToken) -> bool {
        state
            .voice_cancel
            .as_ref()
            .is_some_and(|current| current.same_token(token))
    }

    fn mark_voice_playing(&self, token: &CancelToken) {
        let mut state = self.lock();
        if Self::voice_token_is_current(&state, token) {
            state.voice.is_loading = false;
            state.voice.is_playing = true;
        }
    }

    fn set_voice_progress(&self, token: &CancelToken, progress: u8) {
        let mut state = self.lock();
        if Self::voice_token_is_current(&state, token) {
            state.voice.progress = progress;
        }
    }
}

fn estimate_progress(received: usize) -> u8 {
    let percent = received * 100 / ESTIMATED_VOICE_BYTES;
    u8::try_from(percent.min(99)).unwrap_or(99)
}

fn fail(err: impl std::fmt::Display) -> TierFailure {
    TierFailure::Failed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_estimate_is_clamped_below_completion() {
        assert_eq!(estimate_progress(0), 0);
        assert_eq!(estimate_progress(ESTIMATED_VOICE_BYTES / 2), 50);
        assert_eq!(estimate_progress(ESTIMATED_VOICE_BYTES * 4), 99);
    }
}
