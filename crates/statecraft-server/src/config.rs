//! Server configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use statecraft_ai::AiConfig;
use statecraft_core::MapGenConfig;

use crate::error::ServerError;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "STATECRAFT_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Seed for map generation and the game RNG.
    pub seed: u64,
    /// Turns to play before printing the summary.
    pub turns: u32,
    /// One computer player per name.
    pub players: Vec<String>,
    pub map: MapConfig,
    /// Directory with ruleset files; the embedded classic rules otherwise.
    pub ruleset: Option<String>,
    pub ai: AiConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            turns: 100,
            players: vec!["Babylon".into(), "Carthage".into(), "Egypt".into(), "Greece".into()],
            map: MapConfig::default(),
            ruleset: None,
            ai: AiConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ServerError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Config named by `STATECRAFT_CONFIG`, or the defaults.
    pub fn from_env() -> Result<Self, ServerError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn map_gen(&self) -> MapGenConfig {
        MapGenConfig {
            width: self.map.width,
            height: self.map.height,
            num_players: self.players.len() as u32,
            water_ratio: self.map.water_ratio,
            elevation_variance: self.map.elevation_variance,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    /// Share of tiles below sea level (0.0-1.0)
    pub water_ratio: f32,
    /// How rough the land is (0.0-1.0)
    pub elevation_variance: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        let map = MapGenConfig::default();
        Self {
            width: map.width,
            height: map.height,
            water_ratio: map.water_ratio,
            elevation_variance: map.elevation_variance,
        }
    }
}
