use statecraft_core::{GameError, RulesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("ruleset: {0}")]
    Rules(#[from] RulesError),
    #[error("no players configured")]
    NoPlayers,
    #[error("map has no start position for player {0}")]
    NoStartPosition(usize),
    #[error("game setup: {0}")]
    Game(#[from] GameError),
    #[error("summary encoding: {0}")]
    Json(#[from] serde_json::Error),
}
