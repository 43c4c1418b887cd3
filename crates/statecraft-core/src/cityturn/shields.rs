use statecraft_protocol::{CityId, DisbandCause};
use tracing::{info, warn};

use crate::citytools::city_reduce_size;
use crate::game::GameState;
use crate::rules::UnitFlag;
use crate::unittools::disband_unit;

/// Pay shield upkeep and bank the surplus.
///
/// While the surplus is negative, supported units with shield upkeep are
/// disbanded oldest first. Units that cannot be disbanded are paid for in
/// population instead. Returns false when the city did not survive.
pub fn city_distribute_surplus_shields(state: &mut GameState, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if c.surplus.shield < 0 {
        for unit in state.supported_units(city) {
            let Some(c) = state.city(city) else {
                return false;
            };
            if c.surplus.shield >= 0 {
                break;
            }
            let Some(u) = state.units.get(unit) else {
                continue;
            };
            let undisbandable = state.rules.unit_type(u.unit_type).has_flag(UnitFlag::Undisbandable);
            if u.upkeep.shield > 0 && !undisbandable {
                info!(city = %c.name, unit_type = %state.rules.unit_type(u.unit_type).name, "cannot upkeep unit, disbanding");
                disband_unit(state, unit, DisbandCause::ShieldUpkeep);
            }
        }
    }

    let still_short = state.city(city).is_some_and(|c| c.surplus.shield < 0);
    if still_short {
        // Whatever is left cannot be disbanded: citizens pay for it.
        for unit in state.supported_units(city) {
            let Some(c) = state.city(city) else {
                return false;
            };
            if c.surplus.shield >= 0 {
                break;
            }
            let upkeep = state.units.get(unit).map_or(0, |u| u.upkeep.shield);
            if upkeep <= 0 {
                continue;
            }
            warn!(city = %c.name, "citizens perish for failing to upkeep a unit");
            if !city_reduce_size(state, city, 1) {
                return false;
            }
            if let Some(c) = state.city_mut(city) {
                c.surplus.shield += upkeep;
            }
        }
    }

    let Some(c) = state.city_mut(city) else {
        return false;
    };
    c.shield_stock += c.surplus.shield;
    c.before_change_shields = c.shield_stock;
    c.last_turns_shield_surplus = c.surplus.shield;
    true
}
