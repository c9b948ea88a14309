pub mod buffer;
pub mod cache;
pub mod controller;
pub mod state;

pub use buffer::{BufferManager, SweepReport};
pub use cache::{
    discard_source, has_chunk, load_chunk, load_source, store_chunk, store_source, ChunkCache,
    DiskCache, MemoryCache, SourceBundle,
};
pub use controller::{LoadStatus, PlaybackController};
pub use state::{
    PendingRequest, PlayerState, RetryPolicy, BUFFER_SENTENCES, POLL_INTERVAL,
    TRANSMISSION_RETRY_TIME,
};
