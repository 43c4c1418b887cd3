use statecraft_protocol::{CityId, DisbandCause, Event};
use tracing::{debug, info};

use crate::citytools::{city_increase_size, city_reduce_size};
use crate::effects::city_bonus;
use crate::game::GameState;
use crate::rules::{EffectType, UnitFlag};
use crate::unittools::disband_unit;

/// Rapture growth: a celebrating city with a food surplus grows every
/// `rapture_delay` turns where the government allows it.
pub fn city_rapture_grow(state: &GameState, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let delay = state.rules.game.rapture_delay.max(1);
    c.rapture > 0
        && c.surplus.food > 0
        && c.rapture % delay == 0
        && city_bonus(state, city, EffectType::RaptureGrow) > 0
}

/// Add the food surplus to the granary, then grow or starve.
/// Returns false when the city starved to death.
pub fn city_populate(state: &mut GameState, city: CityId) -> bool {
    let rapture_grow = city_rapture_grow(state, city);
    let Some(c) = state.city_mut(city) else {
        return false;
    };
    c.food_stock += c.surplus.food;
    let (size, stock, owner) = (c.size, c.food_stock, c.owner);
    let game = &state.rules.game;
    let granary = game.granary_size(size);

    if stock >= granary || rapture_grow {
        let savings = city_bonus(state, city, EffectType::GrowthFood).clamp(0, 100);
        let grown = city_increase_size(state, city);
        let new_granary = state.rules.game.granary_size(size + 1);
        if let Some(c) = state.city_mut(city) {
            c.food_stock = if !grown {
                c.food_stock.min(granary)
            } else if rapture_grow {
                c.food_stock.min(new_granary / 2)
            } else {
                c.food_stock.min(granary * savings / 100)
            };
        }
        if grown && rapture_grow {
            debug!(?city, "rapture growth");
        }
        return true;
    }

    if stock >= 0 {
        return true;
    }

    // Famine: a unit eating from the granary goes first.
    let hungry = state.supported_units(city).into_iter().find(|&u| {
        state.units.get(u).is_some_and(|unit| {
            unit.upkeep.food > 0
                && !state.rules.unit_type(unit.unit_type).has_flag(UnitFlag::Undisbandable)
        })
    });
    if let Some(unit) = hungry {
        info!(?city, "famine feared, disbanding a unit");
        disband_unit(state, unit, DisbandCause::FoodUpkeep);
        if let Some(c) = state.city_mut(city) {
            c.food_stock = 0;
        }
        return true;
    }

    info!(?city, size, "famine");
    state.notify_player(owner, Event::CityFamine { city, size });
    if size > 1 {
        let refill = state.rules.game.granary_size(size - 1) / 2;
        if let Some(c) = state.city_mut(city) {
            c.food_stock = refill;
        }
    }
    if !city_reduce_size(state, city, 1) {
        return false;
    }
    if let Some(c) = state.city_mut(city) {
        c.food_stock = c.food_stock.max(0);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn full_granary_grows_and_empties() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        {
            let c = state.city_mut(city).unwrap();
            c.food_stock = 19;
            c.surplus.food = 2;
        }
        assert!(city_populate(&mut state, city));
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 2);
        assert_eq!(c.food_stock, 0);
    }

    #[test]
    fn granary_keeps_a_share_after_growth() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let granary = state.rules.building_id("granary").unwrap();
        testkit::give_building(&mut state, city, granary);
        {
            let c = state.city_mut(city).unwrap();
            c.food_stock = 19;
            c.surplus.food = 2;
        }
        city_populate(&mut state, city);
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 2);
        assert_eq!(c.food_stock, 20 * 25 / 100);
    }

    #[test]
    fn rapture_grows_without_a_full_granary() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        state.players[p.index()].government = state.rules.government_id("republic").unwrap();
        let city = testkit::found_city(&mut state, p, 4, 4);
        {
            let c = state.city_mut(city).unwrap();
            c.rapture = 1;
            c.food_stock = 0;
            c.surplus.food = 3;
        }
        assert!(city_populate(&mut state, city));
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 2);
        assert_eq!(c.food_stock, 3);
    }

    #[test]
    fn famine_disbands_a_food_eater_first() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let settlers = testkit::spawn_unit(&mut state, p, "settlers", Some(city), 4, 4);
        {
            let c = state.city_mut(city).unwrap();
            c.food_stock = 0;
            c.surplus.food = -3;
        }
        assert!(city_populate(&mut state, city));
        assert!(state.units.get(settlers).is_none());
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 1);
        assert_eq!(c.food_stock, 0);
    }

    #[test]
    fn famine_shrinks_the_city() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        testkit::set_size(&mut state, city, 3);
        {
            let c = state.city_mut(city).unwrap();
            c.food_stock = 0;
            c.surplus.food = -5;
        }
        assert!(city_populate(&mut state, city));
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 2);
        assert_eq!(c.food_stock, state.rules.game.granary_size(2) / 2);
        assert!(state
            .pending_events()
            .iter()
            .any(|(_, e)| matches!(e, Event::CityFamine { size: 3, .. })));
    }

    #[test]
    fn famine_in_a_size_one_city_destroys_it() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        {
            let c = state.city_mut(city).unwrap();
            c.food_stock = 0;
            c.surplus.food = -5;
        }
        assert!(!city_populate(&mut state, city));
        assert!(state.city(city).is_none());
    }
}
