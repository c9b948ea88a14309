//! Streaming, sentence-paced text reader.
//!
//! A text is split into sentences by the sentence service, each sentence is
//! synthesized over a websocket a few sentences ahead of playback and the
//! audio chunks are played back one sentence at a time.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod panes;
pub mod progress;
pub mod speech;
pub mod ui;

pub use config::Config;
pub use engine::{
    BufferManager, ChunkCache, DiskCache, LoadStatus, MemoryCache, PlaybackController, PlayerState,
    RetryPolicy,
};
pub use error::{ReaderError, Result};
pub use speech::{MetadataFetcher, SynthesisChannel, TextMetadata};
