//! Key/value storage for synthesized audio and captured source text.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};
use crate::speech::audio_id;

/// Byte store keyed by string.
pub trait ChunkCache: Send + Sync {
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn remove(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-process cache; lives as long as the reading session.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> ReaderError {
        ReaderError::Io(std::io::Error::other("cache lock poisoned"))
    }
}

impl ChunkCache for MemoryCache {
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut guard = self.entries.lock().map_err(|_| Self::poisoned())?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(guard.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut guard = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(guard.remove(key))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let guard = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(guard.contains_key(key))
    }
}

/// One file per key inside a directory. Used to hand captured text from
/// `readly capture` to a later reading session.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ReaderError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid cache key '{key}'"),
            )));
        }
        Ok(self.dir.join(key))
    }
}

impl ChunkCache for DiskCache {
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        std::fs::write(self.path_for(key)?, value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let existing = self.get(key)?;
        if existing.is_some() {
            std::fs::remove_file(self.path_for(key)?)?;
        }
        Ok(existing)
    }
}

pub fn store_chunk(
    cache: &dyn ChunkCache,
    text_id: &str,
    play_idx: usize,
    audio: Vec<u8>,
) -> Result<()> {
    cache.set(&audio_id(text_id, play_idx), audio)
}

pub fn load_chunk(
    cache: &dyn ChunkCache,
    text_id: &str,
    play_idx: usize,
) -> Result<Option<Vec<u8>>> {
    cache.get(&audio_id(text_id, play_idx))
}

pub fn has_chunk(cache: &dyn ChunkCache, text_id: &str, play_idx: usize) -> Result<bool> {
    cache.contains(&audio_id(text_id, play_idx))
}

/// Text captured for a later reading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBundle {
    pub text: String,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
}

impl SourceBundle {
    pub fn new(text: impl Into<String>, url: Option<String>) -> Self {
        Self {
            text: text.into(),
            ts: Utc::now(),
            url,
        }
    }
}

/// Store a bundle under a fresh session key and return the key.
pub fn store_source(cache: &dyn ChunkCache, bundle: &SourceBundle) -> Result<String> {
    let key = uuid::Uuid::new_v4().simple().to_string();
    cache.set(&key, serde_json::to_vec(bundle)?)?;
    Ok(key)
}

/// Read the bundle stored under `key`. It stays stored until
/// [`discard_source`], so a session that fails can be started again.
pub fn load_source(cache: &dyn ChunkCache, key: &str) -> Result<Option<SourceBundle>> {
    match cache.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub fn discard_source(cache: &dyn ChunkCache, key: &str) -> Result<bool> {
    Ok(cache.remove(key)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_round_trip_is_byte_identical() {
        let cache = MemoryCache::new();
        let audio = vec![0u8, 1, 2, 255, 254, 0, 7];
        store_chunk(&cache, "text", 4, audio.clone()).unwrap();
        assert_eq!(load_chunk(&cache, "text", 4).unwrap(), Some(audio));
        assert!(has_chunk(&cache, "text", 4).unwrap());
        assert!(!has_chunk(&cache, "text", 5).unwrap());
        assert!(cache.contains("text-004").unwrap());
    }

    #[test]
    fn overwrite_is_tolerated() {
        let cache = MemoryCache::new();
        store_chunk(&cache, "t", 0, vec![1]).unwrap();
        store_chunk(&cache, "t", 0, vec![1]).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn source_bundle_survives_reads_until_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();
        let bundle = SourceBundle::new("Some captured text.", Some("https://example.com".into()));
        let key = store_source(&cache, &bundle).unwrap();

        // a failed session (login, network) reads it and leaves it in place
        assert_eq!(load_source(&cache, &key).unwrap(), Some(bundle.clone()));
        assert_eq!(load_source(&cache, &key).unwrap(), Some(bundle));

        assert!(discard_source(&cache, &key).unwrap());
        assert_eq!(load_source(&cache, &key).unwrap(), None);
        assert!(!discard_source(&cache, &key).unwrap());
    }

    #[test]
    fn disk_cache_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();
        assert!(cache.set("../escape", vec![1]).is_err());
        assert!(cache.get("").is_err());
    }
}
