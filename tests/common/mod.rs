//! Mocks shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use readly::audio::AudioOutput;
use readly::engine::{store_chunk, ChunkCache, MemoryCache, PlaybackController};
use readly::speech::{AuthProvider, SpeakRequester, TextMetadata, UserProfile};
use readly::ReaderError;

pub fn metadata(lengths: &[usize]) -> TextMetadata {
    let sentences: Vec<String> = lengths.iter().map(|n| "x".repeat(*n)).collect();
    TextMetadata {
        text_id: "text".into(),
        num_sentences: sentences.len(),
        sentence_lengths: lengths.to_vec(),
        sentences,
    }
}

/// Put a one-byte chunk for sentence `idx` of [`metadata`]'s text.
pub fn cache_chunk(cache: &dyn ChunkCache, idx: usize) {
    store_chunk(cache, "text", idx, vec![idx as u8]).unwrap();
}

// ── Speak requests ────────────────────────────────────────────────

/// Records every `speak` and can be told to fail or to be offline.
#[derive(Default)]
pub struct MockRequester {
    calls: Mutex<Vec<usize>>,
    failing: AtomicBool,
    offline: AtomicBool,
    connects: AtomicUsize,
}

impl MockRequester {
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeakRequester for MockRequester {
    async fn speak(
        &self,
        _text_data: &TextMetadata,
        _speed: f32,
        play_idx: usize,
    ) -> readly::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReaderError::ChannelNotReady(std::time::Duration::from_secs(1)));
        }
        self.calls.lock().unwrap().push(play_idx);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    fn request_connection(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Audio output ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct OutputLog {
    /// Audio bytes and generation of every load, in order.
    pub loads: Vec<(Vec<u8>, u64)>,
    pub plays: usize,
    pub pauses: usize,
    pub speed: Option<f32>,
    pub has_audio: bool,
}

/// Output that only records what it was asked to do.
#[derive(Clone, Default)]
pub struct MockOutput {
    pub log: Arc<Mutex<OutputLog>>,
}

impl MockOutput {
    /// Sentence indices loaded so far, from the one-byte chunks.
    pub fn loaded(&self) -> Vec<u8> {
        self.log.lock().unwrap().loads.iter().map(|(audio, _)| audio[0]).collect()
    }

    pub fn last_generation(&self) -> Option<u64> {
        self.log.lock().unwrap().loads.last().map(|(_, g)| *g)
    }
}

impl AudioOutput for MockOutput {
    fn load(&mut self, audio: Vec<u8>, speed: f32, generation: u64) -> readly::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.loads.push((audio, generation));
        log.speed = Some(speed);
        log.has_audio = true;
        Ok(())
    }

    fn play(&mut self) {
        self.log.lock().unwrap().plays += 1;
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().pauses += 1;
    }

    fn set_speed(&mut self, speed: f32) {
        self.log.lock().unwrap().speed = Some(speed);
    }

    fn has_audio(&self) -> bool {
        self.log.lock().unwrap().has_audio
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().has_audio = false;
    }
}

// ── Auth ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAuth {
    pub redirects: AtomicUsize,
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn get_current_user(&self) -> readly::Result<UserProfile> {
        Ok(UserProfile {
            token: "tok".into(),
            sub: "sub".into(),
            email: None,
            name: None,
        })
    }

    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Controller harness ────────────────────────────────────────────

pub struct Harness {
    pub controller: PlaybackController,
    pub cache: Arc<MemoryCache>,
    pub requester: Arc<MockRequester>,
    pub output: MockOutput,
    pub auth: Arc<MockAuth>,
}

pub fn harness() -> Harness {
    let cache = Arc::new(MemoryCache::new());
    let requester = Arc::new(MockRequester::default());
    let output = MockOutput::default();
    let auth = Arc::new(MockAuth::default());
    let controller = PlaybackController::new(
        cache.clone(),
        requester.clone(),
        Box::new(output.clone()),
        auth.clone(),
    );
    Harness {
        controller,
        cache,
        requester,
        output,
        auth,
    }
}
