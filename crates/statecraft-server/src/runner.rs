//! Headless game: generate a map, seat computer players, play turns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use statecraft_ai::AiController;
use statecraft_core::{
    create_city, generate_map, load_rules, run_turn, GameState, RulesSource,
};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Per-player statistics at the end of the run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: u8,
    pub name: String,
    pub alive: bool,
    pub gold: i32,
    pub cities: u32,
    /// Sum of city sizes.
    pub citizens: u32,
    pub buildings: u32,
    pub units: u32,
    pub techs_known: u32,
    pub government: String,
    pub researching: Option<String>,
}

/// What the server prints when the run is over.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub seed: u64,
    pub turns_played: u32,
    pub final_turn: u32,
    pub players: Vec<PlayerSummary>,
}

/// Build the starting position: a generated map with one city per player.
pub fn setup_game(config: &ServerConfig) -> Result<GameState, ServerError> {
    if config.players.is_empty() {
        return Err(ServerError::NoPlayers);
    }
    let source = match &config.ruleset {
        Some(dir) => RulesSource::Path(dir.clone()),
        None => RulesSource::Embedded,
    };
    let rules = Arc::new(load_rules(source)?);
    let generated = generate_map(&rules, &config.map_gen(), config.seed);
    let mut state = GameState::new(generated.map, rules, config.seed);

    for (i, name) in config.players.iter().enumerate() {
        let hex = *generated
            .start_positions
            .get(i)
            .ok_or(ServerError::NoStartPosition(i))?;
        let player = state.add_player(name.clone(), true);
        let city = create_city(&mut state, player, hex, format!("{name} Capital"))?;
        debug!(player = %player, ?city, ?hex, "player seated");
    }
    info!(
        players = state.players.len(),
        width = config.map.width,
        height = config.map.height,
        seed = config.seed,
        "game ready"
    );
    Ok(state)
}

/// Play `turns` turns, logging every event.
pub fn play(state: &mut GameState, controller: &mut AiController, turns: u32) -> u32 {
    let mut played = 0;
    for _ in 0..turns {
        if state.players.iter().all(|p| !p.is_alive) {
            break;
        }
        run_turn(state, controller);
        for (audience, event) in state.take_events() {
            info!(turn = state.turn, ?audience, ?event, "event");
        }
        played += 1;
    }
    played
}

pub fn summarize(state: &GameState, seed: u64, turns_played: u32) -> GameSummary {
    let players = state
        .players
        .iter()
        .map(|p| {
            let cities: Vec<_> = state
                .cities
                .iter_ordered()
                .filter(|(_, c)| c.owner == p.id)
                .map(|(_, c)| c)
                .collect();
            PlayerSummary {
                player_id: p.id.0,
                name: p.name.clone(),
                alive: p.is_alive,
                gold: p.gold,
                cities: cities.len() as u32,
                citizens: cities.iter().map(|c| c.size).sum(),
                buildings: cities.iter().map(|c| c.buildings().count() as u32).sum(),
                units: state
                    .units
                    .iter_ordered()
                    .filter(|(_, u)| u.owner == p.id)
                    .count() as u32,
                techs_known: p.known_count() as u32,
                government: state.rules.government(p.government).name.clone(),
                researching: p
                    .research
                    .researching
                    .map(|t| state.rules.tech(t).name.clone()),
            }
        })
        .collect();
    GameSummary {
        seed,
        turns_played,
        final_turn: state.turn,
        players,
    }
}

/// Set up, play and summarize a whole game.
pub fn run_game(config: &ServerConfig) -> Result<GameSummary, ServerError> {
    let mut state = setup_game(config)?;
    let mut controller = AiController::new(config.ai.clone());
    let played = play(&mut state, &mut controller, config.turns);
    Ok(summarize(&state, config.seed, played))
}
