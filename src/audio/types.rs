use std::time::Duration;

/// Sent by an output when a loaded chunk plays to its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackFinished {
    /// Navigation generation the chunk was loaded under.
    pub generation: u64,
}

/// Which output backs the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// Real speakers (needs the `audio` feature).
    #[default]
    Device,
    /// No sound; chunks "play" for their encoded duration.
    Silent,
}

/// Bitrate assumed for payloads that are not RIFF/WAVE (32 kbit/s).
const FALLBACK_BYTES_PER_SEC: f64 = 4000.0;

/// Play length of an encoded chunk. Exact for WAV, estimated otherwise.
pub fn encoded_duration(audio: &[u8]) -> Duration {
    wav_duration(audio)
        .unwrap_or_else(|| Duration::from_secs_f64(audio.len() as f64 / FALLBACK_BYTES_PER_SEC))
}

fn wav_duration(audio: &[u8]) -> Option<Duration> {
    if audio.len() < 12 || &audio[0..4] != b"RIFF" || &audio[8..12] != b"WAVE" {
        return None;
    }
    let read_u32 = |at: usize| -> Option<u32> {
        audio
            .get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    };

    let mut offset = 12;
    let mut byte_rate = None;
    while offset + 8 <= audio.len() {
        let id = &audio[offset..offset + 4];
        let size = read_u32(offset + 4)? as usize;
        match id {
            b"fmt " => byte_rate = read_u32(offset + 16),
            b"data" => {
                let rate = byte_rate.filter(|r| *r > 0)?;
                // streamed WAVs often carry a placeholder size
                let available = audio.len().saturating_sub(offset + 8);
                let data_len = if size == 0 || size > available { available } else { size };
                return Some(Duration::from_secs_f64(data_len as f64 / f64::from(rate)));
            }
            _ => {}
        }
        offset += 8 + size + (size & 1);
    }
    None
}

#[cfg(test)]
pub(crate) fn test_wav(samples: usize, sample_rate: u32) -> Vec<u8> {
    let data_len = (samples * 2) as u32;
    let byte_rate = sample_rate * 2;
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(wav.len() + data_len as usize, 0);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_duration_from_header() {
        let wav = test_wav(16_000, 16_000);
        assert_eq!(encoded_duration(&wav), Duration::from_secs(1));
    }

    #[test]
    fn non_wav_is_estimated() {
        let blob = vec![0u8; 8000];
        assert_eq!(encoded_duration(&blob), Duration::from_secs(2));
    }

    #[test]
    fn placeholder_data_size_uses_remaining_bytes() {
        let mut wav = test_wav(8_000, 16_000);
        let data_size_at = wav.len() - 16_000 - 4;
        wav[data_size_at..data_size_at + 4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(encoded_duration(&wav), Duration::from_millis(500));
    }
}
