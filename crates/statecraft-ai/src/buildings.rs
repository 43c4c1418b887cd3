//! Building wants per city, the wonder city, and caravan reach.

use std::collections::BTreeMap;
use std::sync::Arc;

use statecraft_core::{
    can_city_build_improvement_later, can_city_build_improvement_now, can_city_build_now,
    can_player_build_unit_direct, impr_build_shield_cost, improvement_redundant, is_req_active,
    num_unknown_techs_for_goal, production_class, BuildingFlag, GameState, PathIter,
    ReqContext, ReqProbe, ReqRange, ReqSource, UnitFlag,
};
use statecraft_protocol::{BuildTarget, BuildingId, CityId, PlayerId, UnitTypeId};
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::data::AiData;
use crate::effects::{EffectContext, EffectRegistry};
use crate::reqs::{adjust_wants_for_reqs, TechWants};
use crate::want::{base_want, refresh_city_worth};

/// Extra want for spaceship parts once we lead the race or the economy.
const SPACE_PART_BONUS: i32 = 140;

/// What to do with a city's building wants this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecalcDecision {
    /// Human city: every want is a flat 1.
    Placeholder,
    /// Recompute every building.
    Full,
    /// Keep last turn's wants.
    Deferred,
}

fn cities_in_range(state: &GameState, data: &AiData, city: CityId, range: ReqRange) -> i32 {
    let count = match range {
        ReqRange::Local | ReqRange::City => 1,
        ReqRange::Continent => state
            .city(city)
            .map_or(1, |c| data.stats.cities_on(state.map.continent(c.tile))),
        ReqRange::Player | ReqRange::World => data.stats.cities,
    };
    count.max(1)
}

/// Fold every effect of `building` into `base` and push the remainder onto
/// the techs and buildings it is waiting for.
///
/// Returns the want to store for the city: zero unless the building can be
/// built right now.
#[allow(clippy::too_many_arguments)]
pub fn adjust_improvement_wants_by_effects(
    state: &GameState,
    data: &AiData,
    config: &AiConfig,
    registry: &EffectRegistry,
    city: CityId,
    building: BuildingId,
    base: i32,
    techs: &mut TechWants,
) -> i32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    let rules = &state.rules;
    let owner = c.owner;
    let already = c.has_building(building);
    let ctx = ReqContext::city(state, city);
    let mut v = base;

    for effect in rules.effects_of_building(building) {
        let Some(mine) = effect.building_req(building) else {
            continue;
        };
        let mut active = true;
        let mut impossible = false;
        let mut needed_techs = Vec::new();
        for req in &effect.reqs {
            if req.building() == Some(building) {
                continue;
            }
            if is_req_active(state, &ctx, req, ReqProbe::Possible) {
                continue;
            }
            active = false;
            match req.source {
                ReqSource::Tech(t) if req.present => needed_techs.push(t),
                ReqSource::Building(other) if req.present => {
                    if !c.has_building(other) && !can_city_build_improvement_later(state, city, other) {
                        impossible = true;
                    }
                }
                // government, size, terrain, lost techs: not ours to research
                _ => impossible = true,
            }
        }
        if impossible || (!active && needed_techs.is_empty()) {
            continue;
        }

        let affected = cities_in_range(state, data, city, mine.range);
        let Some(ectx) = EffectContext::new(state, data, config, city, building, effect, affected) else {
            continue;
        };
        let mut v1 = registry.value(&ectx, v);
        if !mine.present {
            // the building removes the effect
            v1 = v - (v1 - v);
        }
        if active {
            v = v1;
        } else {
            let dv = (v1 - v) / needed_techs.len() as i32;
            for t in needed_techs {
                techs.credit(t, dv);
            }
        }
    }

    let kind = rules.building(building);
    let knows = |t| state.player(owner).is_some_and(|p| p.knows(t));
    if already {
        if v > 0 {
            if let Some(obsolete_by) = kind.obsolete_by.filter(|&t| !knows(t)) {
                techs.credit(obsolete_by, -v);
            }
        }
        return 0;
    }

    let all_met = adjust_wants_for_reqs(state, city, building, v, techs, config);
    let coinage = kind.has_flag(BuildingFlag::Gold);
    let can_build = all_met && !coinage && can_city_build_improvement_now(state, city, building);

    if let Some(obsolete_by) = kind.obsolete_by.filter(|&t| !knows(t)) {
        let steps = num_unknown_techs_for_goal(state, owner, obsolete_by).max(1) as i32;
        v -= v / steps;
    }
    if v > 0 {
        v -= impr_build_shield_cost(rules, building) / (c.surplus.shield.max(0) * 10 + 1);
    }
    if !c.built_last_turn(state.turn)
        && production_class(rules, c.currently_building)
            != production_class(rules, BuildTarget::Improvement(building))
    {
        v -= c.before_change_shields / 4;
    }
    if kind.space_part.is_some() && (data.standing.spacerace_leader || data.standing.production_leader) {
        v += SPACE_PART_BONUS;
    }

    if can_build {
        v
    } else {
        0
    }
}

pub fn recalc_decision(state: &GameState, city: CityId) -> RecalcDecision {
    let Some(c) = state.city(city) else {
        return RecalcDecision::Deferred;
    };
    if !state.player(c.owner).is_some_and(|p| p.ai_control) {
        return RecalcDecision::Placeholder;
    }
    if c.ai.next_recalc <= state.turn {
        return RecalcDecision::Full;
    }
    if c.built_last_turn(state.turn) && !can_city_build_now(state, city, c.currently_building) {
        debug!(city = %c.name, "production became invalid, recalculating early");
        return RecalcDecision::Full;
    }
    RecalcDecision::Deferred
}

/// Each of the player's cities with what to do about its wants this turn.
pub fn schedule_recalcs(state: &GameState, player: PlayerId) -> Vec<(CityId, RecalcDecision)> {
    state
        .player_cities(player)
        .into_iter()
        .map(|city| (city, recalc_decision(state, city)))
        .collect()
}

/// Recompute every building want of `city` and its tech shares, then pick
/// the next recalc turn.
pub fn recalc_city_wants(
    state: &mut GameState,
    city: CityId,
    data: &AiData,
    config: &AiConfig,
    registry: &EffectRegistry,
) {
    let rules = Arc::clone(&state.rules);
    let mut techs = TechWants::new(rules.techs.len());
    let mut wants = vec![0; rules.buildings.len()];
    let wonder_city = data.wonder_city == Some(city);
    for building in rules.building_ids() {
        let base = base_want(state, data, city, building);
        let want = adjust_improvement_wants_by_effects(
            state, data, config, registry, city, building, base, &mut techs,
        );
        wants[building.index()] = if rules.is_great_wonder(building) && !wonder_city {
            0
        } else {
            want
        };
    }

    let speed = config.recalc_speed.max(1);
    let interval = speed + state.rng.below(speed);
    let turn = state.turn;
    if let Some(c) = state.city_mut(city) {
        c.ai.building_want = wants;
        c.ai.tech_share = techs.into_shares();
        c.ai.recalc_interval = interval;
        c.ai.next_recalc = turn + interval;
        debug!(city = %c.name, next = c.ai.next_recalc, "building wants recalculated");
    }
}

/// Caravan-like unit used to measure how cities can help each other.
fn helper_unit_type(state: &GameState, player: PlayerId) -> Option<UnitTypeId> {
    let mut helpers = state.rules.units_with_flag(UnitFlag::HelpWonder).peekable();
    let first = helpers.peek().copied();
    helpers
        .find(|&u| can_player_build_unit_direct(state, player, u))
        .or(first)
}

/// Count, for each city, the other own cities a helper reaches in
/// `cluster_turns`.
pub fn calculate_city_clusters(state: &mut GameState, player: PlayerId, config: &AiConfig) {
    let cities = state.player_cities(player);
    let helper = helper_unit_type(state, player);
    let mut downtown = Vec::with_capacity(cities.len());
    for &city in &cities {
        let count = match (helper, state.city(city)) {
            (Some(helper), Some(c)) => {
                let start = c.tile;
                PathIter::new(state, helper, start, config.cluster_turns)
                    .filter(|s| s.tile != start)
                    .filter(|s| {
                        state.map.tile(s.tile).city.is_some_and(|other| {
                            state.city(other).is_some_and(|o| o.owner == player)
                        })
                    })
                    .count() as u32
            }
            _ => 0,
        };
        downtown.push(count);
    }
    for (city, count) in cities.into_iter().zip(downtown) {
        if let Some(c) = state.city_mut(city) {
            c.ai.downtown = count;
        }
    }
}

/// Helper walking time from each city to the wonder city: 0 for the wonder
/// city itself, -1 when out of reach.
pub fn calculate_wonder_helpers(state: &mut GameState, player: PlayerId, data: &AiData, config: &AiConfig) {
    let cities = state.player_cities(player);
    let mut reach: BTreeMap<usize, i32> = BTreeMap::new();
    let wonder_tile = data.wonder_city.and_then(|w| state.city(w)).map(|c| c.tile);
    if let (Some(tile), Some(helper)) = (wonder_tile, helper_unit_type(state, player)) {
        reach = PathIter::new(state, helper, tile, config.wonder_helper_turns)
            .map(|s| (s.tile, s.turns))
            .collect();
    }
    for city in cities {
        let distance = if Some(city) == data.wonder_city {
            0
        } else {
            state
                .city(city)
                .and_then(|c| reach.get(&c.tile))
                .map_or(-1, |&turns| turns.max(1))
        };
        if let Some(c) = state.city_mut(city) {
            c.ai.distance_to_wonder_city = distance;
        }
    }
}

/// A wonder city stays one while it is ours, safe, productive, and busy
/// with a great wonder it can still finish.
pub fn wonder_city_still_valid(state: &GameState, player: PlayerId, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if c.owner != player || c.ai.grave_danger > 0 || c.surplus.shield <= 0 {
        return false;
    }
    match c.currently_building {
        BuildTarget::Improvement(b) => {
            state.rules.is_great_wonder(b)
                && can_city_build_improvement_now(state, city, b)
                && !improvement_redundant(state, city, b)
        }
        BuildTarget::Unit(_) => false,
    }
}

/// Best city to build great wonders in, if any qualifies.
pub fn select_wonder_city(state: &GameState, player: PlayerId, data: &AiData, config: &AiConfig) -> Option<CityId> {
    let cities = state.player_cities(player);
    let helpers = state.rules.units_with_flag(UnitFlag::HelpWonder).next().is_some();
    let min_downtown = config
        .wonder_min_downtown
        .min(cities.len().saturating_sub(1) as u32);
    let mut best = None;
    let mut best_value = 0;
    for city in cities {
        let Some(c) = state.city(city) else {
            continue;
        };
        if c.ai.grave_danger > 0 {
            continue;
        }
        let continent = state.map.continent(c.tile);
        let mut value = c.surplus.shield;
        if state.map.is_coastal(c.tile, &state.rules) {
            value /= 2;
        }
        if helpers {
            if c.ai.downtown < min_downtown {
                continue;
            }
            value += c.ai.downtown as i32 + data.stats.cities_on(continent) / 8;
        }
        if data.threats.continents.contains(&continent) {
            value -= value / 4;
        }
        if value > best_value {
            best_value = value;
            best = Some(city);
        }
    }
    best
}

/// Refresh the wonder city and every city's building wants for this turn.
pub fn ai_manage_buildings(
    state: &mut GameState,
    player: PlayerId,
    data: &mut AiData,
    config: &AiConfig,
    registry: &EffectRegistry,
) {
    let Some(p) = state.player(player) else {
        return;
    };
    if !p.ai_control {
        let buildings = state.rules.buildings.len();
        for city in state.player_cities(player) {
            if let Some(c) = state.city_mut(city) {
                c.ai.building_want = vec![1; buildings];
            }
        }
        return;
    }

    refresh_city_worth(state, player, data);

    let previous = data.wonder_city;
    if let Some(w) = previous.filter(|&w| !wonder_city_still_valid(state, player, w)) {
        debug!(player = %player, city = ?w, "wonder city dropped");
        data.wonder_city = None;
    }
    calculate_city_clusters(state, player, config);
    if data.wonder_city.is_none() {
        data.wonder_city = select_wonder_city(state, player, data, config);
        if let Some(w) = data.wonder_city.filter(|&w| Some(w) != previous) {
            let turn = state.turn;
            if let Some(c) = state.city_mut(w) {
                info!(player = %player, city = %c.name, "new wonder city");
                c.ai.next_recalc = turn;
            }
        }
    }
    calculate_wonder_helpers(state, player, data, config);

    for (city, decision) in schedule_recalcs(state, player) {
        if decision == RecalcDecision::Full {
            recalc_city_wants(state, city, data, config, registry);
        }
    }

    let rules = Arc::clone(&state.rules);
    for city in state.player_cities(player) {
        if data.wonder_city == Some(city) {
            continue;
        }
        if let Some(c) = state.city_mut(city) {
            for b in rules.building_ids().filter(|&b| rules.is_great_wonder(b)) {
                if let Some(w) = c.ai.building_want.get_mut(b.index()) {
                    *w = 0;
                }
            }
        }
    }
}
