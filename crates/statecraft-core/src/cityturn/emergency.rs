use statecraft_protocol::{CityId, DisbandCause, Event};
use tracing::{debug, info, warn};

use crate::cityrefresh::city_refresh;
use crate::cm::{auto_arrange_workers, GreedyGovernor};
use crate::game::GameState;
use crate::unittools::{disband_unit, unit_can_be_disbanded};

fn in_emergency(state: &GameState, city: CityId) -> bool {
    state.city(city).is_some_and(|c| c.is_emergency())
}

/// Try everything short of changing production to get a city out of
/// disorder, starvation or shield debt: rearrange workers, take back tiles
/// worked by the owner's other cities, then disband units that make
/// citizens unhappy. Returns whether the emergency is over.
pub fn resolve_city_emergency(state: &mut GameState, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let (owner, hex, name) = (c.owner, c.hex, c.name.clone());
    info!(
        city = %name,
        happy = c.citizens.happy,
        unhappy = c.citizens.unhappy,
        angry = c.citizens.angry,
        food = c.surplus.food,
        shield = c.surplus.shield,
        "city emergency"
    );

    auto_arrange_workers(state, city, &GreedyGovernor);
    if !in_emergency(state, city) {
        debug!(city = %name, "emergency resolved by rearranging workers");
        return true;
    }

    let mut touched: Vec<CityId> = Vec::new();
    for idx in state.map.indices_in_radius(hex, state.rules.game.city_radius) {
        let Some(other) = state.map.tile(idx).worked_by else {
            continue;
        };
        if other == city || state.city(other).map_or(true, |o| o.owner != owner) {
            continue;
        }
        state.map.tile_mut(idx).worked_by = None;
        if let Some(o) = state.city_mut(other) {
            o.worked.retain(|&t| t != idx);
            o.specialists.entertainers += 1;
        }
        if !touched.contains(&other) {
            touched.push(other);
        }
    }
    if !touched.is_empty() {
        debug!(city = %name, cities = touched.len(), "took back tiles from neighbours");
        auto_arrange_workers(state, city, &GreedyGovernor);
    }

    if state.city(city).is_some_and(|c| c.is_unhappy()) {
        for unit in state.supported_units(city) {
            if !state.city(city).is_some_and(|c| c.is_unhappy()) {
                break;
            }
            let causes_unhappiness = state.units.get(unit).is_some_and(|u| u.unhappy > 0);
            if causes_unhappiness && unit_can_be_disbanded(state, unit) {
                info!(city = %name, "disbanding a unit to restore order");
                disband_unit(state, unit, DisbandCause::Unhappiness);
            }
        }
    }

    let resolved = !in_emergency(state, city);
    if resolved {
        info!(city = %name, "emergency resolved");
    } else {
        warn!(city = %name, "emergency unresolved");
        state.notify_player(owner, Event::EmergencyUnresolved { city });
    }

    for other in touched {
        city_refresh(state, other);
        auto_arrange_workers(state, other, &GreedyGovernor);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn shield_debt_on_bare_grassland_stays_unresolved() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        state.players[p.index()].government = state.rules.government_id("republic").unwrap();
        let city = testkit::found_city(&mut state, p, 4, 4);
        for _ in 0..3 {
            testkit::spawn_unit(&mut state, p, "warriors", Some(city), 4, 4);
        }
        assert!(state.city(city).unwrap().is_emergency());
        state.take_events();

        assert!(!resolve_city_emergency(&mut state, city));
        assert_eq!(state.supported_units(city).len(), 3);
        assert!(state
            .pending_events()
            .iter()
            .any(|(_, e)| matches!(e, Event::EmergencyUnresolved { .. })));
    }

    #[test]
    fn disorder_from_units_abroad_is_resolved() {
        let mut state = testkit::state_with(
            12,
            12,
            testkit::rules_with(|rules| {
                let warriors = rules.unit_type_id("warriors").unwrap();
                rules.unit_types[warriors.index()].upkeep.shield = 0;
            }),
        );
        let p = state.add_player("A", false);
        state.players[p.index()].government = state.rules.government_id("republic").unwrap();
        let city = testkit::found_city(&mut state, p, 2, 2);
        testkit::set_size(&mut state, city, 2);
        testkit::spawn_unit(&mut state, p, "warriors", Some(city), 9, 9);
        testkit::spawn_unit(&mut state, p, "warriors", Some(city), 9, 8);
        state.city_mut(city).unwrap().food_stock = 15;
        city_refresh(&mut state, city);

        assert!(resolve_city_emergency(&mut state, city));
        assert!(!state.city(city).unwrap().is_unhappy());
    }
}
