use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "readly",
    version,
    about = "Listen to any text, one sentence at a time",
    long_about = "readly splits a text into sentences, streams synthesized speech for each one ahead of playback and lets you skip, rewind and seek while it reads."
)]
pub struct Args {
    #[arg(value_name = "FILE",
          help = "Text file to read (reads stdin when omitted)")]
    pub file: Option<PathBuf>,

    #[arg(long, value_name = "URL",
          help = "Sentence service base URL (overrides config file)")]
    pub server: Option<String>,

    #[arg(long, value_name = "URL",
          help = "Synthesis websocket base URL (overrides config file)")]
    pub ws: Option<String>,

    #[arg(short, long, value_name = "RATE",
          help = "Playback speed, e.g. 1.25 (overrides config file)")]
    pub speed: Option<f32>,

    #[arg(short, long, value_name = "KEY",
          help = "Read a source captured earlier with `readly capture`")]
    pub key: Option<String>,

    #[arg(long, help = "Do not open an audio device; sentences play silently")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a text for a later session and print its session key
    Capture {
        #[arg(value_name = "FILE", help = "Text file to capture")]
        file: PathBuf,

        #[arg(long, value_name = "URL", help = "Where the text came from")]
        url: Option<String>,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Set the sentence service URL in the config file
    SetServer {
        #[arg(value_name = "URL", help = "Sentence service base URL")]
        url: String,
    },
}

impl Args {
    /// The text to read when no session key was given.
    pub fn read_text(&self) -> Result<String> {
        let text = match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read text from stdin")?;
                buf
            }
        };
        if text.trim().is_empty() {
            anyhow::bail!("Nothing to read: the text is empty");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args =
            Args::parse_from(["readly", "essay.txt", "--speed", "1.5", "--server", "http://s"]);
        assert_eq!(args.file, Some(PathBuf::from("essay.txt")));
        assert_eq!(args.speed, Some(1.5));
        assert_eq!(args.server.as_deref(), Some("http://s"));
        assert!(args.command.is_none());
    }

    #[test]
    fn parses_config_subcommand() {
        let args = Args::parse_from(["readly", "config", "set-server", "http://s"]);
        match args.command {
            Some(Commands::Config {
                command: ConfigCommands::SetServer { url },
            }) => assert_eq!(url, "http://s"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n").unwrap();
        let args = Args::parse_from(["readly", path.to_str().unwrap()]);
        assert!(args.read_text().is_err());
    }
}
