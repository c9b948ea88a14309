use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::{encoded_duration, PlaybackFinished};
use super::AudioOutput;
use crate::error::Result;

/// Output that makes no sound. A loaded chunk "plays" for its encoded
/// duration divided by the speed, then reports its natural end.
pub struct SilentOutput {
    finished_tx: mpsc::UnboundedSender<PlaybackFinished>,
    loaded: Option<Loaded>,
    speed: f32,
}

struct Loaded {
    generation: u64,
    /// Media time still to play, at speed 1.0.
    remaining: Duration,
    started: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

impl SilentOutput {
    pub fn new(finished_tx: mpsc::UnboundedSender<PlaybackFinished>) -> Self {
        Self {
            finished_tx,
            loaded: None,
            speed: 1.0,
        }
    }

    fn settle_elapsed(&mut self) {
        let speed = self.speed;
        if let Some(loaded) = self.loaded.as_mut() {
            if let Some(timer) = loaded.timer.take() {
                timer.abort();
            }
            if let Some(started) = loaded.started.take() {
                let played = started.elapsed().mul_f32(speed);
                loaded.remaining = loaded.remaining.saturating_sub(played);
            }
        }
    }

    fn arm(&mut self) {
        let speed = self.speed;
        let tx = self.finished_tx.clone();
        if let Some(loaded) = self.loaded.as_mut() {
            let wait = loaded.remaining.div_f32(speed);
            let generation = loaded.generation;
            loaded.started = Some(Instant::now());
            loaded.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                let _ = tx.send(PlaybackFinished { generation });
            }));
        }
    }
}

impl AudioOutput for SilentOutput {
    fn load(&mut self, audio: Vec<u8>, speed: f32, generation: u64) -> Result<()> {
        self.stop();
        self.speed = speed;
        self.loaded = Some(Loaded {
            generation,
            remaining: encoded_duration(&audio),
            started: None,
            timer: None,
        });
        self.arm();
        Ok(())
    }

    fn play(&mut self) {
        if self.loaded.as_ref().is_some_and(|l| l.started.is_none()) {
            self.arm();
        }
    }

    fn pause(&mut self) {
        self.settle_elapsed();
    }

    fn set_speed(&mut self, speed: f32) {
        let running = self.loaded.as_ref().is_some_and(|l| l.started.is_some());
        self.settle_elapsed();
        self.speed = speed;
        if running {
            self.arm();
        }
    }

    fn has_audio(&self) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|l| l.timer.as_ref().map_or(true, |t| !t.is_finished()))
    }

    fn stop(&mut self) {
        if let Some(mut loaded) = self.loaded.take() {
            if let Some(timer) = loaded.timer.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::test_wav;

    #[tokio::test(start_paused = true)]
    async fn finishes_after_encoded_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = SilentOutput::new(tx);
        output.load(test_wav(16_000, 16_000), 1.0, 7).unwrap();
        assert!(output.has_audio());

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.recv().await, Some(PlaybackFinished { generation: 7 }));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_position() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = SilentOutput::new(tx);
        output.load(test_wav(16_000, 16_000), 1.0, 1).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        output.pause();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(output.has_audio());

        output.play();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(rx.recv().await, Some(PlaybackFinished { generation: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn faster_speed_finishes_sooner() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = SilentOutput::new(tx);
        output.load(test_wav(16_000, 16_000), 2.0, 3).unwrap();
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(rx.try_recv().ok(), Some(PlaybackFinished { generation: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_suppresses_finish() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = SilentOutput::new(tx);
        output.load(test_wav(1_600, 16_000), 1.0, 1).unwrap();
        output.stop();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert!(!output.has_audio());
    }
}
