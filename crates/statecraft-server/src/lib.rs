//! Statecraft headless server
//!
//! Plays computer-only games turn by turn and reports how each empire
//! ended up.

pub mod config;
pub mod error;
pub mod runner;

pub use config::{MapConfig, ServerConfig, CONFIG_ENV};
pub use error::ServerError;
pub use runner::{play, run_game, setup_game, summarize, GameSummary, PlayerSummary};
