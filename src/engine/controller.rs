//! Playback state machine.
//!
//! The controller owns the session state and is driven from one task. Every
//! navigation bumps the session generation and arms a load ticket for the
//! new position. The ticket is completed by [`PlaybackController::poll_load`]
//! once the sentence's chunk is cached; a ticket whose generation or
//! position no longer matches is dropped instead of loaded.

use std::sync::Arc;
use std::time::Duration;

use super::buffer::{BufferManager, SweepReport};
use super::cache::{load_chunk, ChunkCache};
use super::state::{PlayerState, POLL_INTERVAL};
use crate::audio::{AudioOutput, PlaybackFinished};
use crate::error::{ReaderError, Result};
use crate::progress::{find_mark, ProgressBar, SegmentState};
use crate::speech::{audio_id, AuthProvider, ChannelEvent, SpeakRequester, TextMetadata};

/// Where a pending load stands after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No load is pending.
    Idle,
    /// The chunk is not cached yet.
    Waiting { play_idx: usize },
    /// The chunk was handed to the output.
    Started { play_idx: usize },
    /// Navigation moved on before the chunk arrived.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoadTicket {
    generation: u64,
    play_idx: usize,
}

pub struct PlaybackController {
    state: PlayerState,
    cache: Arc<dyn ChunkCache>,
    buffer: BufferManager,
    requester: Arc<dyn SpeakRequester>,
    output: Box<dyn AudioOutput>,
    auth: Arc<dyn AuthProvider>,
    bar: ProgressBar,
    poll_interval: Duration,
    pending_load: Option<LoadTicket>,
    last_sweep: SweepReport,
}

impl PlaybackController {
    pub fn new(
        cache: Arc<dyn ChunkCache>,
        requester: Arc<dyn SpeakRequester>,
        output: Box<dyn AudioOutput>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            state: PlayerState::new(1.0),
            cache,
            buffer: BufferManager::default(),
            requester,
            output,
            auth,
            bar: ProgressBar::new(),
            poll_interval: POLL_INTERVAL,
            pending_load: None,
            last_sweep: SweepReport::default(),
        }
    }

    pub fn with_buffer(mut self, buffer: BufferManager) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Result<Self> {
        validate_speed(speed)?;
        self.state.speed = speed;
        Ok(self)
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn progress_bar(&self) -> &ProgressBar {
        &self.bar
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn play_idx(&self) -> usize {
        self.state.play_idx
    }

    pub fn speed(&self) -> f32 {
        self.state.speed
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Whether a load is armed and waiting for its chunk.
    pub fn is_waiting(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn last_sweep(&self) -> &SweepReport {
        &self.last_sweep
    }

    /// Start a session on `metadata` and begin buffering its first
    /// sentences.
    pub async fn load_metadata(&mut self, metadata: TextMetadata) {
        tracing::info!(
            text_id = %metadata.text_id,
            sentences = metadata.num_sentences,
            "Loaded text"
        );
        self.output.stop();
        self.pending_load = None;
        self.state.playing = false;
        self.state.set_metadata(metadata);
        self.bar.reset();
        self.sweep().await;
    }

    pub async fn toggle_play_pause(&mut self) -> Result<()> {
        if self.state.metadata.is_none() {
            return Ok(());
        }
        self.state.playing = !self.state.playing;

        if self.state.playing {
            self.sweep().await;
            if self.output.has_audio() {
                tracing::info!(play_idx = self.state.play_idx, "Resume");
                self.output.play();
                self.paint_current(SegmentState::Playing);
            } else {
                tracing::info!(play_idx = self.state.play_idx, "Play");
                self.arm_load();
                self.poll_load().await?;
            }
        } else {
            tracing::info!(play_idx = self.state.play_idx, "Pause");
            self.output.pause();
            if self.pending_load.take().is_some() {
                self.state.generation += 1;
            }
            self.paint_current(SegmentState::Paused);
        }
        Ok(())
    }

    pub async fn next(&mut self) -> Result<()> {
        if self.state.metadata.is_none() || self.state.is_last() {
            return Ok(());
        }
        self.move_to(self.state.play_idx + 1).await
    }

    pub async fn previous(&mut self) -> Result<()> {
        if self.state.metadata.is_none() || self.state.play_idx == 0 {
            return Ok(());
        }
        self.move_to(self.state.play_idx - 1).await
    }

    /// Jump to the sentence owning `fraction` of the text. Positions outside
    /// the bar are ignored.
    pub async fn seek(&mut self, fraction: f64) -> Result<()> {
        let Some(target) = find_mark(&self.state.progress_marks, fraction).map(|m| m.player_idx)
        else {
            tracing::debug!(fraction, "Seek outside of the text");
            return Ok(());
        };
        self.move_to(target).await
    }

    /// React to the output reaching the natural end of a chunk.
    pub async fn on_playback_finished(&mut self, finished: PlaybackFinished) -> Result<()> {
        if finished.generation != self.state.generation {
            tracing::debug!(
                stale = finished.generation,
                current = self.state.generation,
                "Ignoring end of superseded chunk"
            );
            return Ok(());
        }
        if !self.state.playing {
            return Ok(());
        }
        if self.state.is_last() {
            tracing::info!("Reached the end of the text");
            return Ok(());
        }
        self.move_to(self.state.play_idx + 1).await
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        validate_speed(speed)?;
        tracing::info!(speed, "Playback speed");
        self.state.speed = speed;
        self.output.set_speed(speed);
        Ok(())
    }

    /// Load the current sentence, waiting for its chunk as long as needed.
    pub async fn play_audio(&mut self) -> Result<()> {
        self.arm_load();
        loop {
            match self.poll_load().await? {
                LoadStatus::Waiting { .. } => tokio::time::sleep(self.poll_interval).await,
                _ => return Ok(()),
            }
        }
    }

    /// Try to complete the pending load. Called on every UI tick; with no
    /// load pending it only finishes a sweep that could not send everything.
    pub async fn poll_load(&mut self) -> Result<LoadStatus> {
        let Some(ticket) = self.pending_load else {
            if self.last_sweep.is_incomplete() {
                self.sweep().await;
            }
            return Ok(LoadStatus::Idle);
        };
        if ticket.generation != self.state.generation || ticket.play_idx != self.state.play_idx {
            self.pending_load = None;
            return Ok(LoadStatus::Superseded);
        }
        let Some(text_id) = self.state.text_id().map(str::to_owned) else {
            self.pending_load = None;
            return Ok(LoadStatus::Superseded);
        };

        let idx = ticket.play_idx;
        match load_chunk(self.cache.as_ref(), &text_id, idx)? {
            Some(audio) => {
                self.pending_load = None;
                tracing::info!(audio_id = %audio_id(&text_id, idx), "Play chunk");
                self.output.load(audio, self.state.speed, ticket.generation)?;
                self.paint_current(SegmentState::Playing);
                Ok(LoadStatus::Started { play_idx: idx })
            }
            None => {
                // keep retries going while the reader waits
                self.sweep().await;
                if self.state.unavailable.contains(&idx) {
                    self.pending_load = None;
                    return Err(ReaderError::ChunkUnavailable { play_idx: idx });
                }
                tracing::debug!(audio_id = %audio_id(&text_id, idx), "Waiting for chunk");
                Ok(LoadStatus::Waiting { play_idx: idx })
            }
        }
    }

    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> Result<()> {
        match event {
            ChannelEvent::ChunkReady { audio_id: id, play_idx } => {
                let Some(text_id) = self.state.text_id() else {
                    return Ok(());
                };
                if id != audio_id(text_id, play_idx) {
                    tracing::debug!(audio_id = %id, "Chunk from another text");
                    return Ok(());
                }
                self.state.pending_requests.remove(&play_idx);
                if play_idx != self.state.play_idx {
                    self.paint(play_idx, SegmentState::Loaded);
                } else if self.pending_load.is_some() {
                    self.poll_load().await?;
                }
            }
            ChannelEvent::AuthenticationError => {
                tracing::warn!("Synthesis service rejected the session");
                self.state.playing = false;
                self.pending_load = None;
                self.output.stop();
                self.auth.redirect_to_login();
            }
            ChannelEvent::Unrecognized { event_type } => {
                tracing::warn!(?event_type, "Unrecognized synthesis event");
            }
        }
        Ok(())
    }

    async fn move_to(&mut self, idx: usize) -> Result<()> {
        tracing::info!(from = self.state.play_idx, to = idx, "Navigate");
        self.paint(self.state.play_idx, SegmentState::Loaded);
        self.output.stop();
        self.state.play_idx = idx;
        self.state.generation += 1;
        self.sweep().await;
        self.arm_load();
        self.poll_load().await?;
        Ok(())
    }

    fn arm_load(&mut self) {
        self.pending_load = Some(LoadTicket {
            generation: self.state.generation,
            play_idx: self.state.play_idx,
        });
    }

    async fn sweep(&mut self) {
        self.last_sweep = self
            .buffer
            .sweep(
                &mut self.state,
                self.cache.as_ref(),
                self.requester.as_ref(),
                &mut self.bar,
            )
            .await;
    }

    fn paint(&mut self, idx: usize, segment: SegmentState) {
        if let Some(mark) = self.state.progress_marks.get(idx) {
            self.bar.paint(mark, segment);
        }
    }

    fn paint_current(&mut self, segment: SegmentState) {
        self.paint(self.state.play_idx, segment);
    }
}

fn validate_speed(speed: f32) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(ReaderError::InvalidSpeed(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_must_be_positive_and_finite() {
        assert!(validate_speed(1.5).is_ok());
        assert!(matches!(validate_speed(0.0), Err(ReaderError::InvalidSpeed(_))));
        assert!(validate_speed(-1.0).is_err());
        assert!(validate_speed(f32::NAN).is_err());
        assert!(validate_speed(f32::INFINITY).is_err());
    }
}
