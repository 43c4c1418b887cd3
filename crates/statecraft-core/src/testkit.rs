//! Fixtures for tests: the embedded ruleset, small flat maps and shortcuts
//! that skip the normal turn flow. Helpers panic on misuse.

use std::sync::Arc;

use statecraft_protocol::{BuildingId, CityId, Hex, PlayerId, UnitId};

use crate::cityrefresh::{city_refresh, city_refresh_for_player};
use crate::citytools::{city_add_improvement, create_city};
use crate::cm::{auto_arrange_workers, GreedyGovernor};
use crate::game::GameState;
use crate::map::GameMap;
use crate::rules::{load_rules, CompiledRules, RulesSource};

pub fn rules() -> Arc<CompiledRules> {
    rules_with(|_| {})
}

/// The embedded ruleset with a tweak applied before it is shared.
pub fn rules_with(tweak: impl FnOnce(&mut CompiledRules)) -> Arc<CompiledRules> {
    let mut rules = load_rules(RulesSource::Embedded).expect("embedded ruleset loads");
    tweak(&mut rules);
    Arc::new(rules)
}

/// All-grassland map, seed 0.
pub fn state(width: u32, height: u32) -> GameState {
    state_with(width, height, rules())
}

pub fn state_with(width: u32, height: u32, rules: Arc<CompiledRules>) -> GameState {
    let grassland = rules.terrain_id("grassland").expect("grassland terrain");
    let map = GameMap::new(width, height, grassland);
    GameState::new(map, rules, 0)
}

pub fn found_city(state: &mut GameState, player: PlayerId, q: i32, r: i32) -> CityId {
    let name = format!("City {}", state.cities.len() + 1);
    create_city(state, player, Hex::new(q, r), name).expect("valid city site")
}

/// Install a building regardless of requirements.
pub fn give_building(state: &mut GameState, city: CityId, building: BuildingId) {
    city_add_improvement(state, city, building);
    city_refresh(state, city);
}

/// Mark a tech known without going through research.
pub fn give_tech(state: &mut GameState, player: PlayerId, tech: &str) {
    let tech = state.rules.tech_id(tech).expect("known tech name");
    if let Some(p) = state.player_mut(player) {
        p.known_techs[tech.index()] = true;
    }
    city_refresh_for_player(state, player);
}

pub fn set_size(state: &mut GameState, city: CityId, size: u32) {
    if let Some(c) = state.city_mut(city) {
        c.size = size;
    }
    auto_arrange_workers(state, city, &GreedyGovernor);
    city_refresh(state, city);
}

/// Put `stock` shields into production as if they were carried over from
/// last turn.
pub fn set_shield_stock(state: &mut GameState, city: CityId, stock: i32) {
    if let Some(c) = state.city_mut(city) {
        c.shield_stock = stock;
        c.before_change_shields = stock;
    }
}

pub fn spawn_unit(
    state: &mut GameState,
    player: PlayerId,
    unit_type: &str,
    home: Option<CityId>,
    q: i32,
    r: i32,
) -> UnitId {
    let unit_type = state.rules.unit_type_id(unit_type).expect("known unit type");
    let unit = state.create_unit(player, unit_type, home, Hex::new(q, r));
    if let Some(home) = home {
        city_refresh(state, home);
    }
    unit
}
