//! Cadence CLI binary entry point.

use clap::Parser;
use cadence::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let debug = match &cli.command {
        Commands::Replay(args) => args.debug,
    };
    let default_level = if debug { "cadence=debug" } else { "cadence=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Replay(args) => cadence::cli::replay::handle_replay(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
