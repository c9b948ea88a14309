use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// Sentence breakdown of one text, as returned by the sentence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMetadata {
    pub text_id: String,
    pub num_sentences: usize,
    pub sentences: Vec<String>,
    pub sentence_lengths: Vec<usize>,
}

impl TextMetadata {
    /// Build metadata from already-split sentences, measuring each by chars.
    pub fn from_sentences(text_id: impl Into<String>, sentences: Vec<String>) -> Self {
        let sentence_lengths = sentences.iter().map(|s| s.chars().count()).collect();
        Self {
            text_id: text_id.into(),
            num_sentences: sentences.len(),
            sentences,
            sentence_lengths,
        }
    }

    pub fn total_length(&self) -> usize {
        self.sentence_lengths.iter().sum()
    }

    /// Check the parallel-array and length invariants.
    pub fn validate(&self) -> Result<()> {
        if self.sentences.len() != self.num_sentences
            || self.sentence_lengths.len() != self.num_sentences
        {
            return Err(ReaderError::InvalidMetadata(format!(
                "num_sentences={} but {} sentences and {} lengths",
                self.num_sentences,
                self.sentences.len(),
                self.sentence_lengths.len()
            )));
        }
        if self.num_sentences > 0 && self.total_length() == 0 {
            return Err(ReaderError::InvalidMetadata(
                "sentences have zero total length".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.num_sentences == 0
    }
}

/// Cache key of the audio chunk for one sentence of a text.
pub fn audio_id(text_id: &str, play_idx: usize) -> String {
    format!("{text_id}-{play_idx:03}")
}

/// The authenticated reader, as handed out by the profile provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub token: String,
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Frames sent to the synthesis service.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OutboundMessage<'a> {
    Speak {
        text_data: &'a TextMetadata,
        speed: f32,
        play_idx: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum KnownInbound {
    AudioChunk {
        audio_id: String,
        play_idx: usize,
        data: String,
    },
    AuthenticationError,
}

/// Frames received from the synthesis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A finished chunk; `data` is still base64.
    AudioChunk {
        audio_id: String,
        play_idx: usize,
        data: String,
    },
    AuthenticationError,
    /// Anything else: unknown `event_type`, or a frame that failed to parse.
    Unrecognized { event_type: Option<String> },
}

impl InboundMessage {
    pub fn parse(frame: &str) -> Self {
        match serde_json::from_str::<KnownInbound>(frame) {
            Ok(KnownInbound::AudioChunk {
                audio_id,
                play_idx,
                data,
            }) => Self::AudioChunk {
                audio_id,
                play_idx,
                data,
            },
            Ok(KnownInbound::AuthenticationError) => Self::AuthenticationError,
            Err(_) => {
                let event_type = serde_json::from_str::<serde_json::Value>(frame)
                    .ok()
                    .and_then(|v| v.get("event_type")?.as_str().map(String::from));
                Self::Unrecognized { event_type }
            }
        }
    }
}
