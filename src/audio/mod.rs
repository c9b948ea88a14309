#[cfg(feature = "audio")]
mod output;
mod silent;
pub mod types;

#[cfg(feature = "audio")]
pub use output::RodioOutput;
pub use silent::SilentOutput;
pub use types::{encoded_duration, OutputKind, PlaybackFinished};

use tokio::sync::mpsc;

use crate::error::Result;

/// The playback element the controller drives.
///
/// Implementations report natural ends through the sender they were built
/// with; explicit `stop` or a new `load` never produces a finish report.
pub trait AudioOutput {
    /// Replace whatever is loaded with `audio` and start playing it.
    fn load(&mut self, audio: Vec<u8>, speed: f32, generation: u64) -> Result<()>;

    /// Resume the loaded chunk in place.
    fn play(&mut self);

    fn pause(&mut self);

    /// Change the playback rate without restarting.
    fn set_speed(&mut self, speed: f32);

    /// Whether a chunk is loaded and not yet played out.
    fn has_audio(&self) -> bool;

    fn stop(&mut self);
}

/// Open the requested output, falling back to silence when no device is
/// available.
pub fn open_output(
    kind: OutputKind,
    finished_tx: mpsc::UnboundedSender<PlaybackFinished>,
) -> Box<dyn AudioOutput> {
    match kind {
        OutputKind::Device => open_device(finished_tx),
        OutputKind::Silent => Box::new(SilentOutput::new(finished_tx)),
    }
}

#[cfg(feature = "audio")]
fn open_device(finished_tx: mpsc::UnboundedSender<PlaybackFinished>) -> Box<dyn AudioOutput> {
    match RodioOutput::new(finished_tx.clone()) {
        Ok(output) => Box::new(output),
        Err(e) => {
            tracing::warn!(error = %e, "No audio device, playing silently");
            Box::new(SilentOutput::new(finished_tx))
        }
    }
}

#[cfg(not(feature = "audio"))]
fn open_device(finished_tx: mpsc::UnboundedSender<PlaybackFinished>) -> Box<dyn AudioOutput> {
    tracing::warn!("Built without the `audio` feature, playing silently");
    Box::new(SilentOutput::new(finished_tx))
}
