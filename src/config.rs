use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{RetryPolicy, BUFFER_SENTENCES, POLL_INTERVAL, TRANSMISSION_RETRY_TIME};

const APP_DIR: &str = "readly";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the sentence service.
    pub server_url: String,
    /// Base URL of the synthesis websocket.
    pub ws_url: String,
    pub speed: f32,
    pub buffer_sentences: usize,
    pub transmission_retry_ms: u64,
    pub retry_backoff: f64,
    /// Sends per sentence before giving up. Unset retries forever.
    pub max_attempts: Option<u32>,
    pub poll_interval_ms: u64,
    pub ready_timeout_ms: u64,
    pub token: Option<String>,
    pub sub: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "https://localhost:8000".to_string(),
            ws_url: "wss://localhost:8000".to_string(),
            speed: 1.0,
            buffer_sentences: BUFFER_SENTENCES,
            transmission_retry_ms: TRANSMISSION_RETRY_TIME.as_millis() as u64,
            retry_backoff: 1.0,
            max_attempts: None,
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            ready_timeout_ms: 10_000,
            token: None,
            sub: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join(APP_DIR).join("config.toml"))
    }

    /// Where logs and the disk cache live.
    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .or_else(dirs::cache_dir)
            .context("Could not determine data directory")?;
        Ok(dir.join(APP_DIR))
    }

    /// Load the user's config, or defaults when there is none.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// `READLY_TOKEN` and `READLY_SUB` win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("READLY_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(sub) = std::env::var("READLY_SUB") {
            self.sub = Some(sub);
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_after: Duration::from_millis(self.transmission_retry_ms),
            backoff: self.retry_backoff,
            max_attempts: self.max_attempts,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "server_url = \"https://reader.example\"\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server_url, "https://reader.example");
        assert_eq!(config.retry_policy().max_attempts, Some(5));
        assert_eq!(config.buffer_sentences, BUFFER_SENTENCES);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            speed: 1.5,
            token: Some("tok".into()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn garbage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "speed = \"fast\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
