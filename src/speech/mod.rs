pub mod auth;
pub mod channel;
pub mod metadata;
pub mod types;

pub use auth::{AuthProvider, HttpProfile, LoginRedirect, StaticProfile};
pub use channel::{
    speak_url, ChannelEvent, ChannelState, ConnectionFeed, Connector, EventStream, SpeakRequester,
    SynthesisChannel, WireConnection, WsConnector,
};
pub use metadata::MetadataFetcher;
pub use types::{audio_id, InboundMessage, OutboundMessage, TextMetadata, UserProfile};
