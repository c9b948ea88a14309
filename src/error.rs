//! Reader error types.

/// Errors that can occur while streaming and playing a text.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The sentence service could not be reached.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The sentence service answered with a non-success status.
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Sentence metadata violates its own invariants.
    #[error("Invalid sentence metadata: {0}")]
    InvalidMetadata(String),

    /// The session token was rejected.
    #[error("Authentication required")]
    Authentication,

    /// Connection-level failure on the synthesis channel.
    #[error("Synthesis channel error: {0}")]
    Channel(String),

    /// The synthesis channel did not become ready in time.
    #[error("Synthesis channel not ready after {0:?}")]
    ChannelNotReady(std::time::Duration),

    /// A sentence's audio never arrived within the retry budget.
    #[error("Audio for sentence {play_idx} is unavailable")]
    ChunkUnavailable { play_idx: usize },

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Playback speed must be a positive, finite number.
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),

    /// The audio output device failed.
    #[error("Audio output error: {0}")]
    Audio(String),

    /// Audio payload could not be decoded.
    #[error("Failed to decode audio payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Malformed JSON on the wire or in the cache.
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (cache files, log files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Whether this error ends the reading session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Service { .. }
                | Self::InvalidMetadata(_)
                | Self::Authentication
        )
    }
}

pub type Result<T, E = ReaderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_failures_are_fatal() {
        let err = ReaderError::Service {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(err.is_fatal());
        assert!(ReaderError::Authentication.is_fatal());
    }

    #[test]
    fn channel_failures_are_not_fatal() {
        assert!(!ReaderError::Channel("closed".into()).is_fatal());
        assert!(!ReaderError::ChunkUnavailable { play_idx: 3 }.is_fatal());
        assert!(!ReaderError::ChannelNotReady(std::time::Duration::from_secs(1)).is_fatal());
    }
}
