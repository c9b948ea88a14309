use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::progress::{build_progress_marks, ProgressMark};
use crate::speech::TextMetadata;

/// Sentences kept requested or cached ahead of the play position.
pub const BUFFER_SENTENCES: usize = 2;

/// Age after which an unanswered request is sent again.
pub const TRANSMISSION_RETRY_TIME: Duration = Duration::from_millis(3000);

/// Interval between cache checks while waiting for a chunk.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// When a stalled request is re-sent, and when to give up on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first re-send.
    pub retry_after: Duration,
    /// Multiplier applied to the delay for each further re-send.
    pub backoff: f64,
    /// Total sends before the sentence is declared unavailable.
    /// `None` keeps retrying forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_after: TRANSMISSION_RETRY_TIME,
            backoff: 1.0,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// How long to wait after the `attempts`-th send before sending again.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16) as i32;
        self.retry_after.mul_f64(self.backoff.max(1.0).powi(exponent))
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Last send of a synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub last_sent: Instant,
    pub attempts: u32,
}

/// Mutable playback state of one reading session.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub playing: bool,
    pub play_idx: usize,
    pub speed: f32,
    pub metadata: Option<TextMetadata>,
    pub progress_marks: Vec<ProgressMark>,
    pub pending_requests: HashMap<usize, PendingRequest>,
    pub unavailable: HashSet<usize>,
    pub channel_ready: bool,
    /// Bumped on every navigation; loads started under an older value are
    /// stale.
    pub generation: u64,
}

impl PlayerState {
    pub fn new(speed: f32) -> Self {
        Self {
            playing: false,
            play_idx: 0,
            speed,
            metadata: None,
            progress_marks: Vec::new(),
            pending_requests: HashMap::new(),
            unavailable: HashSet::new(),
            channel_ready: false,
            generation: 0,
        }
    }

    pub fn set_metadata(&mut self, metadata: TextMetadata) {
        self.progress_marks = build_progress_marks(&metadata);
        self.metadata = Some(metadata);
        self.play_idx = 0;
        self.pending_requests.clear();
        self.unavailable.clear();
        self.generation += 1;
    }

    pub fn num_sentences(&self) -> usize {
        self.metadata.as_ref().map_or(0, |m| m.num_sentences)
    }

    pub fn text_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.text_id.as_str())
    }

    pub fn is_last(&self) -> bool {
        self.play_idx + 1 >= self.num_sentences()
    }

    /// Indices of the lookahead window starting at the play position.
    pub fn window(&self, size: usize) -> std::ops::Range<usize> {
        let end = self.num_sentences().min(self.play_idx + size);
        self.play_idx.min(end)..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(n: usize) -> TextMetadata {
        TextMetadata::from_sentences("t", (0..n).map(|i| format!("Sentence {i}.")).collect())
    }

    #[test]
    fn default_policy_retries_forever_at_fixed_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), TRANSMISSION_RETRY_TIME);
        assert_eq!(policy.delay_after(7), TRANSMISSION_RETRY_TIME);
        assert!(!policy.exhausted(1000));
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy {
            retry_after: Duration::from_secs(1),
            backoff: 2.0,
            max_attempts: Some(4),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert!(!policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[test]
    fn window_is_clamped_to_text() {
        let mut state = PlayerState::new(1.0);
        state.set_metadata(metadata(3));
        assert_eq!(state.window(2), 0..2);
        state.play_idx = 2;
        assert_eq!(state.window(2), 2..3);
        assert!(state.is_last());
    }

    #[test]
    fn new_metadata_resets_session() {
        let mut state = PlayerState::new(1.0);
        state.set_metadata(metadata(3));
        state.play_idx = 2;
        state.pending_requests.insert(
            2,
            PendingRequest {
                last_sent: Instant::now(),
                attempts: 1,
            },
        );
        let generation = state.generation;
        state.set_metadata(metadata(5));
        assert_eq!(state.play_idx, 0);
        assert!(state.pending_requests.is_empty());
        assert_eq!(state.progress_marks.len(), 5);
        assert!(state.generation > generation);
    }
}
