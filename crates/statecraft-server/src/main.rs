//! Statecraft Server
//!
//! Runs an all-AI game and prints a JSON summary on stdout.

use statecraft_server::{run_game, ServerConfig, ServerError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG: &str = "statecraft_server=info,statecraft_core=info,statecraft_ai=info";

fn run() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;
    info!("Statecraft Server v{}", env!("CARGO_PKG_VERSION"));
    info!(turns = config.turns, players = config.players.len(), seed = config.seed, "starting game");
    let summary = run_game(&config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}
