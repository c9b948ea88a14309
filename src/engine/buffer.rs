//! Lookahead buffering.
//!
//! Every position change sweeps a window of sentences starting at the play
//! position. Each sentence in the window is either already cached, has a
//! request in flight, or gets a fresh `speak` request. A request that stays
//! unanswered past the retry delay is sent again blind; the channel never
//! reports failed synthesis, so a missing chunk is the only failure signal.
//!
//! A sweep never waits for the channel. While it is not open the sweep asks
//! it to connect and stops; the next sweep picks up where this one left off.

use tokio::time::Instant;

use super::cache::{has_chunk, ChunkCache};
use super::state::{PendingRequest, PlayerState, RetryPolicy, BUFFER_SENTENCES};
use crate::progress::{ProgressBar, SegmentState};
use crate::speech::SpeakRequester;

/// Outcome of one sweep, per sentence index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub cached: Vec<usize>,
    pub requested: Vec<usize>,
    pub in_flight: Vec<usize>,
    /// Gave up on these after the retry budget ran out.
    pub unavailable: Vec<usize>,
    /// The send itself failed; retried on the next sweep.
    pub failed: Vec<usize>,
    /// Not sent because the channel was not open.
    pub deferred: Vec<usize>,
}

impl SweepReport {
    /// Whether some sentence still needs a request the sweep could not send.
    pub fn is_incomplete(&self) -> bool {
        !self.failed.is_empty() || !self.deferred.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BufferManager {
    window: usize,
    policy: RetryPolicy,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new(BUFFER_SENTENCES, RetryPolicy::default())
    }
}

impl BufferManager {
    pub fn new(window: usize, policy: RetryPolicy) -> Self {
        Self {
            window: window.max(1),
            policy,
        }
    }

    pub async fn sweep(
        &self,
        state: &mut PlayerState,
        cache: &dyn ChunkCache,
        requester: &dyn SpeakRequester,
        bar: &mut ProgressBar,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(metadata) = state.metadata.as_ref() else {
            return report;
        };
        let window = state.window(self.window);
        tracing::debug!(?window, total = metadata.num_sentences, "Buffer sweep");

        for idx in window {
            let cached = has_chunk(cache, &metadata.text_id, idx).unwrap_or_else(|e| {
                tracing::error!(idx, error = %e, "Chunk cache lookup failed");
                false
            });
            if cached {
                if idx != state.play_idx {
                    if let Some(mark) = state.progress_marks.get(idx) {
                        bar.paint(mark, SegmentState::Loaded);
                    }
                }
                state.pending_requests.remove(&idx);
                report.cached.push(idx);
                continue;
            }
            if state.unavailable.contains(&idx) {
                report.unavailable.push(idx);
                continue;
            }

            let attempts = match state.pending_requests.get(&idx) {
                None => 0,
                Some(pending) => {
                    let age = Instant::now().duration_since(pending.last_sent);
                    if age <= self.policy.delay_after(pending.attempts) {
                        report.in_flight.push(idx);
                        continue;
                    }
                    if self.policy.exhausted(pending.attempts) {
                        tracing::warn!(
                            idx,
                            attempts = pending.attempts,
                            "Giving up on sentence audio"
                        );
                        state.unavailable.insert(idx);
                        report.unavailable.push(idx);
                        continue;
                    }
                    tracing::warn!(idx, ?age, "Audio request stalled, sending again");
                    pending.attempts
                }
            };

            if !requester.is_ready() {
                tracing::debug!(idx, "Synthesis channel not open, deferring requests");
                requester.request_connection();
                report.deferred.push(idx);
                break;
            }

            match requester.speak(metadata, state.speed, idx).await {
                Ok(()) => {
                    state.pending_requests.insert(
                        idx,
                        PendingRequest {
                            last_sent: Instant::now(),
                            attempts: attempts + 1,
                        },
                    );
                    report.requested.push(idx);
                }
                Err(e) => {
                    tracing::warn!(idx, error = %e, "Could not request sentence audio");
                    report.failed.push(idx);
                    break;
                }
            }
        }

        state.channel_ready = requester.is_ready();
        report
    }
}
