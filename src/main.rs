mod cli;
mod setup;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Commands, ConfigCommands};
use readly::engine::{BufferManager, ChunkCache, MemoryCache, PlaybackController};
use readly::speech::{speak_url, AuthProvider, MetadataFetcher, SynthesisChannel, WsConnector};
use readly::ui::UI;
use readly::{Config, ReaderError};

fn main() -> Result<()> {
    let args = Args::parse();
    setup::init_logging()?;

    if let Some(ref command) = args.command {
        return handle_subcommand(command, &args);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run_session(args))
}

fn handle_subcommand(command: &Commands, args: &Args) -> Result<()> {
    match command {
        Commands::Capture { file, url } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let key = setup::capture(text, url.clone())?;
            println!("{key}");
            println!("Read it with: readly --key {key}");
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let mut config = setup::effective_config(args)?;
                if config.token.is_some() {
                    config.token = Some("<hidden>".to_string());
                }
                println!("# {}", Config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
            }
            ConfigCommands::SetServer { url } => {
                let mut config = Config::load().unwrap_or_default();
                config.server_url = url.clone();
                config.save()?;
                let path = Config::config_path()?;
                println!("Server set to '{}' in {}", url, path.display());
            }
        },
    }
    Ok(())
}

async fn run_session(args: Args) -> Result<()> {
    let config = setup::effective_config(&args)?;
    let text = setup::session_text(&args)?;
    let auth = setup::auth_provider(&config, args.key.clone());

    let profile = match auth.get_current_user().await {
        Ok(profile) => profile,
        Err(ReaderError::Authentication) => return report_login(auth.as_ref()),
        Err(e) => return Err(e).context("Failed to identify the reader"),
    };

    let mut fetcher = MetadataFetcher::new(config.server_url.clone());
    if let Some(token) = &config.token {
        fetcher = fetcher.with_token(token.clone());
    }
    let metadata = match fetcher.fetch_metadata(&text).await {
        Ok(metadata) => metadata,
        Err(ReaderError::Authentication) => {
            auth.redirect_to_login();
            return report_login(auth.as_ref());
        }
        Err(e) => return Err(e).context("Failed to split the text into sentences"),
    };
    setup::release_source(&args)?;
    if metadata.is_empty() {
        println!("Nothing to read: no sentences found");
        return Ok(());
    }

    let cache: Arc<dyn ChunkCache> = Arc::new(MemoryCache::new());
    let url = speak_url(&config.ws_url, &profile).context("Invalid synthesis URL")?;
    let (channel, feed) = SynthesisChannel::new(
        url,
        Arc::new(WsConnector),
        Arc::clone(&cache),
        config.ready_timeout(),
    );
    let channel = Arc::new(channel);

    let (output, finished_rx) = setup::create_output(&args);
    let mut controller = PlaybackController::new(cache, channel.clone(), output, Arc::clone(&auth))
        .with_buffer(BufferManager::new(config.buffer_sentences, config.retry_policy()))
        .with_poll_interval(config.poll_interval())
        .with_speed(config.speed)?;
    controller.load_metadata(metadata).await;

    let mut ui = UI::new(controller, Arc::clone(&auth), feed, finished_rx, config.poll_interval());
    let result = ui.run().await;
    channel.shutdown().await;

    if ui.login_url().is_some() {
        return report_login(auth.as_ref());
    }
    result
}

fn report_login(auth: &dyn AuthProvider) -> Result<()> {
    match auth.pending_login() {
        Some(url) => println!("Login required. Open {url} and try again."),
        None => println!("Login required."),
    }
    Ok(())
}
