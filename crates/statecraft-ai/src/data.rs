//! Per-player AI bookkeeping, refreshed at the start of every AI phase.

use std::collections::{BTreeMap, BTreeSet};

use statecraft_core::{
    can_upgrade_unittype, free_upgrades_per_turn, player_bonus, Continent, EffectType, GameState,
    Handicap, UnitClass, UnitFlag,
};
use statecraft_protocol::{CityId, GovernmentId, PlayerId, TechId};
use tracing::trace;

use crate::config::{AiConfig, Priorities};

/// Empire statistics the effect heuristics scale with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AiStats {
    pub land_units: i32,
    pub sea_units: i32,
    pub air_units: i32,
    pub missile_units: i32,
    pub nuclear_units: i32,
    /// Units that could be upgraded right now.
    pub upgradeable: i32,
    pub cities_per_continent: BTreeMap<Continent, i32>,
    /// Cities next to the sea.
    pub ocean_cities: i32,
    /// Mean shield surplus over all cities.
    pub average_production: i32,
    pub cities: i32,
}

impl AiStats {
    pub fn units_of_class(&self, class: UnitClass) -> i32 {
        match class {
            UnitClass::Land => self.land_units,
            UnitClass::Sea => self.sea_units,
            UnitClass::Air => self.air_units,
            UnitClass::Missile => self.missile_units,
        }
    }

    pub fn total_units(&self) -> i32 {
        self.land_units + self.sea_units + self.air_units + self.missile_units
    }

    pub fn cities_on(&self, continent: Continent) -> i32 {
        self.cities_per_continent.get(&continent).copied().unwrap_or(0)
    }
}

/// What enemies could do to us.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AiThreats {
    /// Continents where an enemy attacker stands next to our cities.
    pub continents: BTreeSet<Continent>,
    /// Enemy attackers on a continent where they own no city.
    pub invasions: bool,
    pub sea: bool,
    pub missile: bool,
    pub nuclear: bool,
}

/// Where we stand relative to everyone else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AiStanding {
    pub tech_leader: bool,
    pub spacerace_leader: bool,
    pub production_leader: bool,
    pub at_war: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AiData {
    pub priorities: Priorities,
    /// Government makes celebrations grow cities and we have cities big
    /// enough to celebrate.
    pub wants_celebration: bool,
    pub wonder_city: Option<CityId>,
    /// Most expensive purchase we wanted but could not afford this turn.
    pub maxbuycost: i32,
    /// Free unit upgrades left this turn.
    pub free_upgrades: i32,
    /// Government desirability, indexed by government.
    pub government_want: Vec<i32>,
    /// Turns until governments are evaluated again.
    pub govt_reeval: u32,
    pub goal_government: Option<GovernmentId>,
    /// Tech standing between us and the goal government, with its want.
    pub goal_government_tech: Option<(TechId, i32)>,
    pub stats: AiStats,
    pub threats: AiThreats,
    pub standing: AiStanding,
}

fn threat_visible(state: &GameState, player: PlayerId, enemy_tile: usize, fog: bool) -> bool {
    if !fog {
        return true;
    }
    let hex = state.map.hex_at_index(enemy_tile);
    let range = state.rules.game.city_radius * 3;
    state
        .cities
        .iter_ordered()
        .any(|(_, c)| c.owner == player && c.hex.distance(hex) <= range)
}

fn refresh_stats(state: &GameState, player: PlayerId) -> AiStats {
    let mut stats = AiStats::default();
    for (_, u) in state.units.iter_ordered().filter(|(_, u)| u.owner == player) {
        let t = state.rules.unit_type(u.unit_type);
        match t.class {
            UnitClass::Land => stats.land_units += 1,
            UnitClass::Sea => stats.sea_units += 1,
            UnitClass::Air => stats.air_units += 1,
            UnitClass::Missile => stats.missile_units += 1,
        }
        if t.has_flag(UnitFlag::Nuclear) {
            stats.nuclear_units += 1;
        }
        if can_upgrade_unittype(state, player, u.unit_type).is_some() {
            stats.upgradeable += 1;
        }
    }

    let mut production = 0;
    for (_, c) in state.cities.iter_ordered().filter(|(_, c)| c.owner == player) {
        stats.cities += 1;
        *stats
            .cities_per_continent
            .entry(state.map.continent(c.tile))
            .or_insert(0) += 1;
        if state.map.is_coastal(c.tile, &state.rules) {
            stats.ocean_cities += 1;
        }
        production += c.surplus.shield;
    }
    if stats.cities > 0 {
        stats.average_production = production / stats.cities;
    }
    stats
}

fn refresh_threats(state: &GameState, player: PlayerId, stats: &AiStats) -> AiThreats {
    let fog = state
        .player(player)
        .is_some_and(|p| p.handicaps.has(Handicap::Fog));
    let mut threats = AiThreats::default();
    for (_, u) in state.units.iter_ordered() {
        if u.owner == player || !state.diplomacy.at_war(player, u.owner) {
            continue;
        }
        let t = state.rules.unit_type(u.unit_type);
        if t.attack <= 0 {
            continue;
        }
        let Some(tile) = state.map.index_of(u.hex) else {
            continue;
        };
        if !threat_visible(state, player, tile, fog) {
            continue;
        }
        if t.has_flag(UnitFlag::Nuclear) {
            threats.nuclear = true;
        }
        match t.class {
            UnitClass::Sea => threats.sea = true,
            UnitClass::Missile | UnitClass::Air => threats.missile = true,
            UnitClass::Land => {
                let continent = state.map.continent(tile);
                if stats.cities_on(continent) > 0 {
                    threats.continents.insert(continent);
                    let enemy_home = state.cities.iter_ordered().any(|(_, c)| {
                        c.owner == u.owner && state.map.continent(c.tile) == continent
                    });
                    if !enemy_home {
                        threats.invasions = true;
                    }
                }
            }
        }
    }
    threats
}

fn refresh_standing(state: &GameState, player: PlayerId) -> AiStanding {
    let rivals: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|p| p.is_alive && !p.barbarian && p.id != player)
        .map(|p| p.id)
        .collect();
    let techs = |p: PlayerId| state.player(p).map_or(0, |p| p.known_count());
    let space = |p: PlayerId| {
        state.player(p).map_or(0, |p| {
            p.spaceship.structurals + p.spaceship.components + p.spaceship.modules
        })
    };
    let production = |p: PlayerId| -> i32 {
        state
            .cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == p)
            .map(|(_, c)| c.surplus.shield.max(0))
            .sum()
    };
    AiStanding {
        tech_leader: rivals.iter().all(|&r| techs(player) >= techs(r)),
        spacerace_leader: space(player) > 0 && rivals.iter().all(|&r| space(player) >= space(r)),
        production_leader: rivals.iter().all(|&r| production(player) >= production(r)),
        at_war: state.diplomacy.any_war(player),
    }
}

/// Rebuild statistics, threats and priorities for this turn.
pub fn ai_data_phase_init(state: &GameState, player: PlayerId, data: &mut AiData, config: &AiConfig) {
    data.stats = refresh_stats(state, player);
    data.threats = refresh_threats(state, player, &data.stats);
    data.standing = refresh_standing(state, player);

    let celebrate_size = state.rules.game.celebrate_size;
    data.wants_celebration = player_bonus(state, player, EffectType::RaptureGrow) > 0
        && state
            .cities
            .iter_ordered()
            .any(|(_, c)| c.owner == player && c.size >= celebrate_size);
    data.priorities = if data.wants_celebration {
        config.priorities.celebrating()
    } else {
        config.priorities
    };

    data.free_upgrades = free_upgrades_per_turn(state, player);

    let governments = state.rules.governments.len();
    if data.government_want.len() != governments {
        data.government_want = vec![0; governments];
    }
    if data
        .wonder_city
        .is_some_and(|c| state.city(c).map_or(true, |c| c.owner != player))
    {
        data.wonder_city = None;
    }
    trace!(
        player = %player,
        cities = data.stats.cities,
        units = data.stats.total_units(),
        at_war = data.standing.at_war,
        "ai data refreshed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    #[test]
    fn stats_count_units_and_cities() {
        let mut state = testkit::state(12, 12);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 3, 3);
        testkit::found_city(&mut state, p, 8, 8);
        testkit::spawn_unit(&mut state, p, "warriors", Some(city), 3, 3);
        testkit::spawn_unit(&mut state, p, "nuclear", Some(city), 3, 3);

        let mut data = AiData::default();
        ai_data_phase_init(&state, p, &mut data, &AiConfig::default());
        assert_eq!(data.stats.cities, 2);
        assert_eq!(data.stats.land_units, 1);
        assert_eq!(data.stats.missile_units, 1);
        assert_eq!(data.stats.nuclear_units, 1);
        let continent = state.map.continent(state.city(city).unwrap().tile);
        assert_eq!(data.stats.cities_on(continent), 2);
    }

    #[test]
    fn enemy_attackers_mark_the_continent() {
        let mut state = testkit::state(12, 12);
        let a = state.add_player("A", true);
        let b = state.add_player("B", true);
        let city = testkit::found_city(&mut state, a, 3, 3);
        testkit::spawn_unit(&mut state, b, "archers", None, 5, 5);

        let mut data = AiData::default();
        ai_data_phase_init(&state, a, &mut data, &AiConfig::default());
        assert!(data.threats.continents.is_empty());

        state.diplomacy.set_war(a, b, true);
        ai_data_phase_init(&state, a, &mut data, &AiConfig::default());
        let continent = state.map.continent(state.city(city).unwrap().tile);
        assert!(data.threats.continents.contains(&continent));
        assert!(data.threats.invasions);
        assert!(data.standing.at_war);
    }

    #[test]
    fn lost_wonder_city_is_forgotten() {
        let mut state = testkit::state(12, 12);
        let a = state.add_player("A", true);
        let b = state.add_player("B", true);
        let city = testkit::found_city(&mut state, b, 3, 3);
        let mut data = AiData {
            wonder_city: Some(city),
            ..AiData::default()
        };
        ai_data_phase_init(&state, a, &mut data, &AiConfig::default());
        assert_eq!(data.wonder_city, None);
    }
}
