//! CLI entry point for Cadence.

pub mod replay;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence agent run CLI
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Cadence agent run pipeline CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded event stream through an agent
    Replay(ReplayArgs),
}

/// Arguments for the `replay` subcommand.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file with one event per line
    pub events: PathBuf,

    /// Agent configuration (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log every event passing through the stream transforms
    #[arg(long)]
    pub debug: bool,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print the legacy protocol events instead of the final transcript
    #[arg(long)]
    pub legacy: bool,
}
