use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use readly::audio::{open_output, AudioOutput, OutputKind, PlaybackFinished};
use readly::engine::{discard_source, load_source, store_source, DiskCache, SourceBundle};
use readly::speech::{AuthProvider, HttpProfile, LoginRedirect, StaticProfile, UserProfile};
use readly::Config;

use crate::cli::Args;

const LOG_FILE: &str = "readly.log";

/// Send logs to a file in the data directory; the terminal belongs to the UI.
pub fn init_logging() -> Result<()> {
    let dir = Config::data_dir()?;
    std::fs::create_dir_all(&dir).context("Failed to create data directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .context("Failed to open log file")?;

    let env_filter =
        EnvFilter::try_from_env("READLY_LOG").unwrap_or_else(|_| EnvFilter::new("readly=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .compact(),
        )
        .try_init()
        .ok();
    Ok(())
}

/// Apply command line overrides on top of the file and environment.
pub fn effective_config(args: &Args) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    if let Some(ws) = &args.ws {
        config.ws_url = ws.clone();
    }
    if let Some(speed) = args.speed {
        config.speed = speed;
    }
    Ok(config)
}

/// Cache for captured sources, shared by `capture` and `--key`.
pub fn source_cache() -> Result<DiskCache> {
    let dir = Config::data_dir()?.join("sources");
    DiskCache::new(dir).context("Failed to open source cache")
}

pub fn capture(text: String, url: Option<String>) -> Result<String> {
    let cache = source_cache()?;
    let bundle = SourceBundle::new(text, url);
    let key = store_source(&cache, &bundle).context("Failed to store source")?;
    tracing::info!(%key, "Captured source");
    Ok(key)
}

/// The text of this session, from a captured bundle or a file/stdin.
pub fn session_text(args: &Args) -> Result<String> {
    match &args.key {
        Some(key) => {
            let cache = source_cache()?;
            let bundle = load_source(&cache, key)
                .context("Failed to read captured source")?
                .with_context(|| format!("No captured source under key '{key}'"))?;
            tracing::info!(
                %key,
                captured = %bundle.ts,
                url = ?bundle.url,
                "Reading captured source"
            );
            Ok(bundle.text)
        }
        None => args.read_text(),
    }
}

/// Drop the captured source once the session has its sentences.
pub fn release_source(args: &Args) -> Result<()> {
    if let Some(key) = &args.key {
        let cache = source_cache()?;
        if discard_source(&cache, key).context("Failed to discard captured source")? {
            tracing::debug!(%key, "Released captured source");
        }
    }
    Ok(())
}

/// Identity for this session. A token without a subject is a session cookie
/// and the profile is asked from the service; nothing at all ends in a login
/// redirect.
pub fn auth_provider(config: &Config, session_key: Option<String>) -> Arc<dyn AuthProvider> {
    let login = LoginRedirect::new(config.server_url.clone(), session_key);
    match (&config.token, &config.sub) {
        (Some(token), Some(sub)) => {
            let profile = UserProfile {
                token: token.clone(),
                sub: sub.clone(),
                email: None,
                name: None,
            };
            Arc::new(StaticProfile::new(Some(profile), login))
        }
        (Some(session), None) => Arc::new(HttpProfile::new(
            config.server_url.clone(),
            session.clone(),
            login,
        )),
        _ => Arc::new(StaticProfile::new(None, login)),
    }
}

pub fn create_output(
    args: &Args,
) -> (Box<dyn AudioOutput>, mpsc::UnboundedReceiver<PlaybackFinished>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let kind = if args.silent { OutputKind::Silent } else { OutputKind::Device };
    (open_output(kind, tx), rx)
}
