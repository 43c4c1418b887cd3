//! Peaceful production: buildings, new cities, and caravans for the
//! wonder city.

use statecraft_core::{
    best_role_unit, can_city_build_improvement_now, can_city_build_unit_now, citymindist_ok,
    unit_build_shield_cost, AiChoice, ChoiceKind, GameState, PathIter, UnitFlag,
};
use statecraft_protocol::{BuildTarget, CityId, PlayerId};
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::data::AiData;

/// Want for a new city founded from `city`: value of the best free site a
/// founder reaches in `settler_search_turns`, less five per turn walked.
pub fn city_settler_want(state: &GameState, city: CityId, data: &AiData, config: &AiConfig) -> i32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    if state.city_count(c.owner) >= config.settler_city_limit {
        return 0;
    }
    let Some(founder) = best_role_unit(state, city, |t| t.has_flag(UnitFlag::Cities)) else {
        return 0;
    };
    let owner = c.owner;
    let radius = state.rules.game.city_radius;
    let p = &data.priorities;
    let mut best = 0;
    for step in PathIter::new(state, founder, c.tile, config.settler_search_turns) {
        let tile = state.map.tile(step.tile);
        if tile.owner.is_some_and(|o| o != owner) || state.map.is_ocean(step.tile, &state.rules) {
            continue;
        }
        let hex = state.map.hex_at_index(step.tile);
        if !citymindist_ok(state, hex) {
            continue;
        }
        let yield_sum: i32 = state
            .map
            .indices_in_radius(hex, radius)
            .into_iter()
            .filter(|&i| state.map.tile(i).owner.map_or(true, |o| o == owner))
            .map(|i| {
                let out = state.rules.terrain(state.map.tile(i).terrain).output;
                out.food * p.food + out.shield * p.shield + out.trade * p.trade
            })
            .sum();
        let value = yield_sum / 10 - 5 * step.turns;
        best = best.max(value);
    }
    best
}

/// Best peaceful production for `city`.
pub fn domestic_advisor_choose_build(
    state: &GameState,
    city: CityId,
    data: &AiData,
    config: &AiConfig,
) -> AiChoice {
    let Some(c) = state.city(city) else {
        return AiChoice::default();
    };
    let rules = &state.rules;
    let is_wonder_city = data.wonder_city == Some(city);
    let mut choice = AiChoice::default();

    if c.ai.settler_want > 0 {
        if let Some(founder) = best_role_unit(state, city, |t| t.has_flag(UnitFlag::Cities)) {
            let t = rules.unit_type(founder);
            if c.size > t.pop_cost && c.surplus.food >= t.upkeep.food {
                let want = if is_wonder_city {
                    c.ai.settler_want / 5
                } else {
                    c.ai.settler_want
                };
                choice.copy_if_better(&AiChoice::new(
                    BuildTarget::Unit(founder),
                    want,
                    ChoiceKind::NonMilitary,
                ));
            }
        }
    }

    if !is_wonder_city && c.ai.distance_to_wonder_city > 0 {
        let wonder = data
            .wonder_city
            .and_then(|w| state.city(w))
            .and_then(|w| match w.currently_building {
                BuildTarget::Improvement(b) if rules.is_great_wonder(b) => {
                    w.ai.building_want.get(b.index()).copied()
                }
                _ => None,
            });
        let helper = rules
            .units_with_flag(UnitFlag::HelpWonder)
            .find(|&u| can_city_build_unit_now(state, city, u));
        if let (Some(wonder_want), Some(helper)) = (wonder, helper) {
            let want = wonder_want / c.ai.distance_to_wonder_city.max(1);
            choice.copy_if_better(&AiChoice::new(
                BuildTarget::Unit(helper),
                want,
                ChoiceKind::NonMilitary,
            ));
        }
    }

    let building = rules
        .building_ids()
        .filter(|&b| is_wonder_city || !rules.is_great_wonder(b))
        .filter(|&b| c.ai.building_want.get(b.index()).copied().unwrap_or(0) > 0)
        .filter(|&b| can_city_build_improvement_now(state, city, b))
        .max_by_key(|&b| (c.ai.building_want[b.index()], -(b.index() as i32)));
    if let Some(b) = building {
        choice.copy_if_better(&AiChoice::new(
            BuildTarget::Improvement(b),
            c.ai.building_want[b.index()],
            ChoiceKind::Building,
        ));
    }

    // Leave room for the military advisor and emergency purchases.
    choice.want = choice.want.min(config.very_high_want - 1);
    choice
}

/// Caravans of ours whose home city can reach the wonder city hand their
/// shields over to the wonder under construction.
pub fn ai_help_wonders(state: &mut GameState, player: PlayerId, data: &AiData) -> i32 {
    let Some(wonder_city) = data.wonder_city else {
        return 0;
    };
    let building_wonder = state.city(wonder_city).is_some_and(|w| {
        w.owner == player
            && matches!(w.currently_building, BuildTarget::Improvement(b) if state.rules.is_great_wonder(b))
    });
    if !building_wonder {
        return 0;
    }
    let helpers: Vec<_> = state
        .units
        .iter_ordered()
        .filter(|(_, u)| u.owner == player)
        .filter(|(_, u)| state.rules.unit_type(u.unit_type).has_flag(UnitFlag::HelpWonder))
        .filter(|(_, u)| {
            u.home.is_some_and(|home| {
                home != wonder_city
                    && state
                        .city(home)
                        .is_some_and(|h| h.ai.distance_to_wonder_city >= 0)
            })
        })
        .map(|(id, u)| (id, u.unit_type))
        .collect();

    let mut delivered = 0;
    for (unit, unit_type) in helpers {
        if state.wipe_unit(unit).is_none() {
            continue;
        }
        let shields = unit_build_shield_cost(&state.rules, unit_type);
        delivered += shields;
        debug!(player = %player, ?unit, shields, "caravan helps build wonder");
    }
    if delivered > 0 {
        if let Some(w) = state.city_mut(wonder_city) {
            w.shield_stock += delivered;
            w.before_change_shields += delivered;
            w.caravan_shields += delivered;
            info!(player = %player, city = %w.name, shields = delivered, "caravans delivered");
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    #[test]
    fn open_land_is_worth_settling() {
        let mut state = testkit::state(16, 16);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 5, 5);
        let data = AiData::default();
        let config = AiConfig::default();
        assert!(city_settler_want(&state, city, &data, &config) > 0);

        let crowded = AiConfig {
            settler_city_limit: 1,
            ..AiConfig::default()
        };
        assert_eq!(city_settler_want(&state, city, &data, &crowded), 0);
    }

    #[test]
    fn size_one_city_does_not_build_founders() {
        let mut state = testkit::state(16, 16);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 5, 5);
        state.city_mut(city).unwrap().ai.settler_want = 80;
        let config = AiConfig::default();
        let choice = domestic_advisor_choose_build(&state, city, &AiData::default(), &config);
        assert!(!matches!(choice.target, Some(BuildTarget::Unit(_))));

        testkit::set_size(&mut state, city, 3);
        state.city_mut(city).unwrap().ai.settler_want = 80;
        let choice = domestic_advisor_choose_build(&state, city, &AiData::default(), &config);
        let settlers = state.rules.unit_type_id("settlers").unwrap();
        assert_eq!(choice.target, Some(BuildTarget::Unit(settlers)));
        assert_eq!(choice.want, 80);
    }

    #[test]
    fn domestic_want_stays_below_emergency_level() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let barracks = state.rules.building_id("barracks").unwrap();
        state.city_mut(city).unwrap().ai.building_want[barracks.index()] = 5000;
        let config = AiConfig::default();
        let choice = domestic_advisor_choose_build(&state, city, &AiData::default(), &config);
        assert_eq!(choice.target, Some(BuildTarget::Improvement(barracks)));
        assert_eq!(choice.want, config.very_high_want - 1);
    }

    #[test]
    fn caravans_feed_the_wonder() {
        let mut state = testkit::state(16, 16);
        let p = state.add_player("A", true);
        let wonder_city = testkit::found_city(&mut state, p, 3, 3);
        let helper_city = testkit::found_city(&mut state, p, 6, 3);
        let pyramids = state.rules.building_id("pyramids").unwrap();
        state.city_mut(wonder_city).unwrap().currently_building = BuildTarget::Improvement(pyramids);
        state.city_mut(helper_city).unwrap().ai.distance_to_wonder_city = 2;
        testkit::spawn_unit(&mut state, p, "caravan", Some(helper_city), 6, 3);
        let stock = state.city(wonder_city).unwrap().shield_stock;

        let data = AiData {
            wonder_city: Some(wonder_city),
            ..AiData::default()
        };
        assert_eq!(ai_help_wonders(&mut state, p, &data), 50);
        let w = state.city(wonder_city).unwrap();
        assert_eq!(w.shield_stock, stock + 50);
        assert_eq!(w.caravan_shields, 50);
        assert_eq!(w.before_change_shields, w.shield_stock);
        assert_eq!(state.units.len(), 0);
    }
}
