use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::mpsc;

use super::types::PlaybackFinished;
use super::AudioOutput;
use crate::error::{ReaderError, Result};

/// Speaker output via rodio. One sink per loaded chunk.
pub struct RodioOutput {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Arc<Sink>>,
    finished_tx: mpsc::UnboundedSender<PlaybackFinished>,
    /// Load sequence of the chunk whose natural end should be reported;
    /// zero once it was stopped.
    active: Arc<AtomicU64>,
    next_load: u64,
}

impl RodioOutput {
    pub fn new(finished_tx: mpsc::UnboundedSender<PlaybackFinished>) -> Result<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| ReaderError::Audio(e.to_string()))?;
        tracing::info!("Audio output initialized on default device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            finished_tx,
            active: Arc::new(AtomicU64::new(0)),
            next_load: 0,
        })
    }

    /// Block a helper thread until the sink drains; report only natural
    /// ends of the chunk that is still active.
    fn watch_completion(&self, sink: Arc<Sink>, load: u64, generation: u64) {
        let active = Arc::clone(&self.active);
        let tx = self.finished_tx.clone();
        thread::spawn(move || {
            sink.sleep_until_end();
            if active
                .compare_exchange(load, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                tracing::debug!(generation, "Chunk finished naturally");
                let _ = tx.send(PlaybackFinished { generation });
            }
        });
    }
}

impl AudioOutput for RodioOutput {
    fn load(&mut self, audio: Vec<u8>, speed: f32, generation: u64) -> Result<()> {
        self.stop();

        let source = Decoder::new(std::io::Cursor::new(audio))
            .map_err(|e| ReaderError::Audio(format!("undecodable chunk: {e}")))?;
        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| ReaderError::Audio(e.to_string()))?;
        sink.set_speed(speed);
        sink.append(source);
        sink.play();

        self.next_load += 1;
        let load = self.next_load;
        self.active.store(load, Ordering::SeqCst);

        let sink = Arc::new(sink);
        self.watch_completion(Arc::clone(&sink), load, generation);
        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn set_speed(&mut self, speed: f32) {
        if let Some(sink) = &self.sink {
            sink.set_speed(speed);
        }
    }

    fn has_audio(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.empty())
    }

    fn stop(&mut self) {
        self.active.store(0, Ordering::SeqCst);
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
