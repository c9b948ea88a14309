//! Persistent synthesis channel.
//!
//! One websocket per session carries `speak` requests out and finished audio
//! chunks back. Chunks arrive in any order; each is decoded, written to the
//! chunk cache under its own id, then announced on the connection's event
//! stream.
//!
//! ```text
//!   Idle ──► Connecting ──► Open ──► Error | Closed
//!               ▲                        │
//!               └──── next send ─────────┘
//! ```
//!
//! Reconnection is lazy: nothing runs in the background once a connection is
//! lost; the next `speak` rebuilds it. A dial that does not finish within the
//! ready timeout ends in `Error`, so a hung handshake is rebuilt the same way.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::{InboundMessage, OutboundMessage, TextMetadata, UserProfile};
use crate::engine::cache::ChunkCache;
use crate::error::{ReaderError, Result};

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ReaderError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Both halves of an established connection, as text frames.
pub struct WireConnection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Dials the synthesis service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<WireConnection>;
}

/// Websocket dialer backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<WireConnection> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ReaderError::Channel(e.to_string()))?;
        let (writer, reader) = ws_stream.split();

        let sink = writer
            .with(|frame: String| async move {
                Ok::<_, tokio_tungstenite::tungstenite::Error>(Message::text(frame))
            })
            .sink_map_err(|e| ReaderError::Channel(e.to_string()));

        let stream = reader.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(ReaderError::Channel(e.to_string()))),
            }
        });

        Ok(WireConnection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Build `<ws_url>/speak?token=..&sub=..`.
pub fn speak_url(ws_url: &str, profile: &UserProfile) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/speak", ws_url.trim_end_matches('/')))
        .map_err(|e| ReaderError::Channel(format!("invalid channel url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("token", &profile.token)
        .append_pair("sub", &profile.sub);
    Ok(url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection has been requested yet.
    Idle,
    Connecting,
    Open,
    Error,
    Closed,
}

impl ChannelState {
    fn needs_rebuild(self) -> bool {
        matches!(self, Self::Idle | Self::Error | Self::Closed)
    }
}

/// What the channel reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A chunk was decoded and is now in the cache.
    ChunkReady { audio_id: String, play_idx: usize },
    AuthenticationError,
    Unrecognized { event_type: Option<String> },
}

/// Events of one connection. Ends when that connection ends.
pub type EventStream = mpsc::UnboundedReceiver<ChannelEvent>;

/// Yields a new [`EventStream`] for every connection the channel opens.
pub type ConnectionFeed = mpsc::UnboundedReceiver<EventStream>;

/// Anything that can ask for a sentence to be synthesized.
#[async_trait]
pub trait SpeakRequester: Send + Sync {
    async fn speak(&self, text_data: &TextMetadata, speed: f32, play_idx: usize) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Start connecting without waiting for the outcome.
    fn request_connection(&self);
}

type WriterSlot = Arc<Mutex<Option<(u64, FrameSink)>>>;

pub struct SynthesisChannel {
    url: Url,
    connector: Arc<dyn Connector>,
    cache: Arc<dyn ChunkCache>,
    state: Arc<watch::Sender<ChannelState>>,
    writer: WriterSlot,
    current: Arc<AtomicU64>,
    feed: mpsc::UnboundedSender<EventStream>,
    ready_timeout: Duration,
    cancel: CancellationToken,
}

impl SynthesisChannel {
    pub fn new(
        url: Url,
        connector: Arc<dyn Connector>,
        cache: Arc<dyn ChunkCache>,
        ready_timeout: Duration,
    ) -> (Self, ConnectionFeed) {
        let (feed, feed_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ChannelState::Idle);
        let channel = Self {
            url,
            connector,
            cache,
            state: Arc::new(state),
            writer: Arc::new(Mutex::new(None)),
            current: Arc::new(AtomicU64::new(0)),
            feed,
            ready_timeout,
            cancel: CancellationToken::new(),
        };
        (channel, feed_rx)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Cancel pending readiness waits and drop the connection.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some((_, mut sink)) = self.writer.lock().await.take() {
            let _ = sink.close().await;
        }
        self.state.send_replace(ChannelState::Closed);
    }

    /// Start a connection unless one is open or being opened.
    pub fn ensure_connection(&self) {
        if !self.state().needs_rebuild() {
            return;
        }
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        if id > 1 {
            tracing::info!(connection = id, "Rebuilding synthesis connection");
        }
        self.state.send_replace(ChannelState::Connecting);
        tracing::info!(url = %self.redacted_url(), "Connecting to synthesis service");

        let task = ConnectionTask {
            id,
            url: self.url.clone(),
            connector: Arc::clone(&self.connector),
            cache: Arc::clone(&self.cache),
            state: Arc::clone(&self.state),
            writer: Arc::clone(&self.writer),
            current: Arc::clone(&self.current),
            feed: self.feed.clone(),
            dial_timeout: self.ready_timeout,
            cancel: self.cancel.clone(),
        };
        tokio::spawn(task.run());
    }

    /// Suspend until the channel is open, it fails, the timeout elapses or
    /// the channel is shut down.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        let settled = async {
            rx.wait_for(|s| !matches!(s, ChannelState::Connecting | ChannelState::Idle))
                .await
                .map(|s| *s)
        };

        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ReaderError::Cancelled),
            outcome = tokio::time::timeout(self.ready_timeout, settled) => outcome,
        };
        match outcome {
            Ok(Ok(ChannelState::Open)) => Ok(()),
            Ok(Ok(other)) => Err(ReaderError::Channel(format!("connection {other:?}"))),
            Ok(Err(_)) => Err(ReaderError::Channel("state watch dropped".to_string())),
            Err(_) => {
                tracing::warn!(timeout = ?self.ready_timeout, "Synthesis channel not ready");
                Err(ReaderError::ChannelNotReady(self.ready_timeout))
            }
        }
    }

    async fn send_frame(&self, frame: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let Some((id, sink)) = guard.as_mut() else {
            return Err(ReaderError::Channel("connection closed".to_string()));
        };
        let id = *id;
        if let Err(e) = sink.send(frame).await {
            tracing::error!(connection = id, error = %e, "Send failed, dropping connection");
            guard.take();
            if self.current.load(Ordering::SeqCst) == id {
                self.state.send_replace(ChannelState::Error);
            }
            return Err(e);
        }
        Ok(())
    }

    fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }
}

#[async_trait]
impl SpeakRequester for SynthesisChannel {
    async fn speak(&self, text_data: &TextMetadata, speed: f32, play_idx: usize) -> Result<()> {
        self.ensure_connection();
        self.wait_ready().await?;

        let frame = serde_json::to_string(&OutboundMessage::Speak {
            text_data,
            speed,
            play_idx,
        })?;
        self.send_frame(frame).await?;
        tracing::info!(play_idx, speed, "speak");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state() == ChannelState::Open
    }

    fn request_connection(&self) {
        self.ensure_connection();
    }
}

/// Owns one connection from dial to close.
struct ConnectionTask {
    id: u64,
    url: Url,
    connector: Arc<dyn Connector>,
    cache: Arc<dyn ChunkCache>,
    state: Arc<watch::Sender<ChannelState>>,
    writer: WriterSlot,
    current: Arc<AtomicU64>,
    feed: mpsc::UnboundedSender<EventStream>,
    dial_timeout: Duration,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(self) {
        let dial = tokio::time::timeout(self.dial_timeout, self.connector.connect(&self.url));
        let dialled = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return,
            dialled = dial => dialled,
        };
        let conn = match dialled {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::error!(connection = self.id, error = %e, "Synthesis connection failed");
                self.settle(ChannelState::Error);
                return;
            }
            Err(_) => {
                tracing::error!(
                    connection = self.id,
                    timeout = ?self.dial_timeout,
                    "Synthesis connection timed out"
                );
                self.settle(ChannelState::Error);
                return;
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = self.feed.send(events_rx);
        *self.writer.lock().await = Some((self.id, conn.sink));
        self.settle(ChannelState::Open);
        tracing::info!(connection = self.id, "Synthesis connection open");

        let mut stream = conn.stream;
        let mut end_state = ChannelState::Closed;
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                frame = stream.next() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            match frame {
                Ok(text) => handle_frame(self.cache.as_ref(), &events_tx, &text),
                Err(e) => {
                    tracing::error!(connection = self.id, error = %e, "Synthesis connection error");
                    end_state = ChannelState::Error;
                    break;
                }
            }
        }

        {
            let mut guard = self.writer.lock().await;
            if guard.as_ref().is_some_and(|(id, _)| *id == self.id) {
                guard.take();
            }
        }
        self.settle(end_state);
        tracing::info!(connection = self.id, state = ?end_state, "Synthesis connection ended");
    }

    /// Publish a state only while this connection is still the current one.
    fn settle(&self, state: ChannelState) {
        if self.current.load(Ordering::SeqCst) == self.id {
            self.state.send_replace(state);
        }
    }
}

fn handle_frame(cache: &dyn ChunkCache, events: &mpsc::UnboundedSender<ChannelEvent>, frame: &str) {
    let event = match InboundMessage::parse(frame) {
        InboundMessage::AudioChunk {
            audio_id,
            play_idx,
            data,
        } => {
            let bytes = match general_purpose::STANDARD.decode(data.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(%audio_id, error = %e, "Undecodable audio chunk");
                    return;
                }
            };
            tracing::debug!(%audio_id, bytes = bytes.len(), "Audio chunk received");
            if let Err(e) = cache.set(&audio_id, bytes) {
                tracing::error!(%audio_id, error = %e, "Failed to cache audio chunk");
                return;
            }
            ChannelEvent::ChunkReady { audio_id, play_idx }
        }
        InboundMessage::AuthenticationError => {
            tracing::warn!("Synthesis service rejected the session token");
            ChannelEvent::AuthenticationError
        }
        InboundMessage::Unrecognized { event_type } => {
            tracing::error!(?event_type, "Unknown event type on synthesis channel");
            ChannelEvent::Unrecognized { event_type }
        }
    };
    let _ = events.send(event);
}
