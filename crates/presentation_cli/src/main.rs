//! Call voice CLI
//!
//! Operator tool for checking provider wiring and trying synthesis and
//! transcription outside a call.

#![allow(clippy::print_stdout)]

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use infrastructure::{AppConfig, EnvSecretStore, LoggingConfig, build_voice_service, init_logging};
use speech_dispatch::{CancellationToken, TranscriptionMode};
use tracing::warn;

/// Call voice CLI
#[derive(Debug, Parser)]
#[command(name = "callvoice-cli")]
#[command(author, version, about = "Voice synthesis and transcription dispatch CLI", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long, env = "CALLVOICE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List registered providers with their circuit state
    Providers {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List voice presets and the voice each provider uses
    Presets,

    /// Synthesize a phrase to an audio file
    ///
    /// Example: callvoice-cli speak "Thanks for calling!" --profile warm
    Speak {
        /// Text to speak
        text: String,

        /// Voice preset
        #[arg(short, long, default_value = "warm")]
        profile: String,

        /// Output file (extension follows the audio format if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Try this provider first
        #[arg(long)]
        provider: Option<String>,

        /// Synthesize this many times, to observe the phrase cache
        #[arg(long, default_value = "1")]
        repeat: u32,

        /// Prime the apology and common phrases before speaking
        #[arg(long)]
        prime: bool,
    },

    /// Transcribe an audio file
    Transcribe {
        /// Audio file; the format is taken from the extension
        file: PathBuf,

        /// Transcription mode
        #[arg(short, long, value_enum, default_value = "batch")]
        mode: ModeArg,

        /// Language tag, e.g. "en" or "de-DE"
        #[arg(short, long)]
        language: Option<String>,

        /// Try this provider first
        #[arg(long)]
        provider: Option<String>,

        /// Sample rate for raw PCM input
        #[arg(long, default_value = "16000")]
        sample_rate: u32,

        /// Chunk size when replaying the file as a live stream
        #[arg(long, default_value = "3200")]
        chunk_bytes: usize,
    },
}

/// Transcription mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// In-call streaming providers
    Live,
    /// Post-call providers
    Batch,
}

impl From<ModeArg> for TranscriptionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => Self::Live,
            ModeArg::Batch => Self::Batch,
        }
    }
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => AppConfig::load().context("failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;

    let logging = match log_filter_from_verbosity(cli.verbose) {
        Some(filter) => LoggingConfig {
            filter: filter.to_string(),
            ..config.logging.clone()
        },
        None => config.logging.clone(),
    };
    init_logging(&logging)?;

    if matches!(cli.command, Commands::Presets) {
        return commands::presets(&config);
    }

    config
        .resolve_credentials(&EnvSecretStore::new())
        .await
        .context("failed to resolve vendor credentials")?;
    let service = build_voice_service(&config).context("failed to start voice service")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Providers { json } => commands::providers(&service, json),
        Commands::Presets => commands::presets(&config),
        Commands::Speak {
            text,
            profile,
            out,
            provider,
            repeat,
            prime,
        } => {
            let args = commands::SpeakArgs {
                text,
                profile,
                out,
                provider,
                repeat,
                prime,
            };
            commands::speak(&service, args, &cancel).await
        },
        Commands::Transcribe {
            file,
            mode,
            language,
            provider,
            sample_rate,
            chunk_bytes,
        } => {
            let args = commands::TranscribeArgs {
                file,
                mode: mode.into(),
                language,
                provider,
                sample_rate,
                chunk_bytes,
            };
            commands::transcribe(&service, args, cancel).await
        },
    }
}
