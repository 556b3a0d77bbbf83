//! Command-line interface.

mod fingerprint;
mod replay;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adaptive-cache")]
#[command(version, about = "Inspect and exercise the adaptive response cache")]
pub(crate) struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized key factors and fingerprint for a request
    Fingerprint {
        /// Message text
        message: String,
        /// Mood label (default: neutral)
        #[arg(long)]
        mood: Option<String>,
        /// Energy level (default: 50)
        #[arg(long)]
        energy: Option<f64>,
        /// Situational flag, repeatable
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Key the request to a single user
        #[arg(long)]
        user_specific: bool,
        /// User identifier, used only with --user-specific
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Replay a JSON-lines script of cache operations against a fresh cache
    Replay {
        /// Script file, one operation per line
        input: PathBuf,
        /// JSON cache config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fingerprint {
            message,
            mood,
            energy,
            flags,
            user_specific,
            user_id,
        } => fingerprint::cmd_fingerprint(message, mood, energy, flags, user_specific, user_id),
        Commands::Replay { input, config } => replay::cmd_replay(input, config),
    }
}
