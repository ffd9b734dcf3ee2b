//! Kino Player CLI - Headless Player Harness
//!
//! Features:
//! - Registered tech and component listing
//! - Source support probing (optionally for a given user agent)
//! - Simulated playback sessions with an event log

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod timeline;

use output::OutputFormat;

/// Kino Player CLI - Media player framework harness
#[derive(Parser)]
#[command(name = "kino-player")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Probe playback techs and run simulated player sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered techs and components
    Techs,

    /// Show which tech would play a source
    Probe {
        /// Source URL
        src: String,

        /// Explicit MIME type
        #[arg(short = 't', long = "type")]
        mime: Option<String>,

        /// Comma-separated tech order (default: registry order)
        #[arg(long, value_delimiter = ',')]
        tech_order: Vec<String>,

        /// Browser user agent to derive capabilities from
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Run a simulated playback session
    Play {
        /// Candidate sources, in preference order
        #[arg(required = true)]
        sources: Vec<String>,

        /// Simulated seconds to run
        #[arg(short, long, default_value = "5")]
        seconds: f64,

        /// Simulated milliseconds per wall-clock millisecond
        #[arg(long, default_value = "10")]
        speed: f64,

        /// Initial volume (0.0 - 1.0)
        #[arg(long)]
        volume: Option<f64>,

        /// Playback rate
        #[arg(long)]
        rate: Option<f64>,

        /// Seek to this position once the player is ready
        #[arg(long)]
        seek: Option<f64>,

        /// Make this source fail with a network error (repeatable)
        #[arg(long = "fail-src")]
        fail: Vec<String>,

        /// JSON file with player options
        #[arg(short, long)]
        options: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    kino_player::init();
    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Techs => commands::techs(format)?,
        Commands::Probe { src, mime, tech_order, user_agent } => {
            commands::probe(&src, mime, &tech_order, user_agent, format)?;
        }
        Commands::Play { sources, seconds, speed, volume, rate, seek, fail, options } => {
            let args = commands::PlayArgs {
                sources,
                seconds,
                speed,
                volume,
                rate,
                seek,
                fail,
                options,
            };
            commands::play(args, format).await?;
        }
    }

    Ok(())
}
