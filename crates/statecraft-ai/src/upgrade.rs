//! Paying to bring old units up to date.

use statecraft_core::{
    can_upgrade_unittype, transform_unit, unit_upgrade_price, upgrade_unit, GameState,
};
use statecraft_protocol::{CityId, Event, UnitId};
use tracing::debug;

use crate::data::AiData;

/// Upgrade our units standing in `city`, military or civilian ones, as
/// long as the treasury stays above `limit`. Free upgrades are spent
/// first. Upgrades we cannot afford raise `maxbuycost`.
///
/// Returns how many units were upgraded.
pub fn ai_upgrade_units(
    state: &mut GameState,
    city: CityId,
    limit: i32,
    military: bool,
    data: &mut AiData,
) -> u32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    let owner = c.owner;
    let units: Vec<UnitId> = state
        .units_at(c.hex)
        .filter(|(_, u)| u.owner == owner)
        .filter(|(_, u)| state.rules.unit_type(u.unit_type).is_military() == military)
        .map(|(id, _)| id)
        .collect();

    let mut upgraded = 0;
    for unit in units {
        let Some(from) = state.units.get(unit).map(|u| u.unit_type) else {
            continue;
        };
        let Some(to) = can_upgrade_unittype(state, owner, from) else {
            continue;
        };
        if data.free_upgrades > 0 {
            transform_unit(state, unit, to);
            data.free_upgrades -= 1;
            state.notify_player(owner, Event::UnitUpgraded { unit, from, to, cost: 0 });
            upgraded += 1;
            continue;
        }
        let cost = unit_upgrade_price(&state.rules, from, to);
        let gold = state.player(owner).map_or(0, |p| p.gold);
        if gold - cost > limit {
            match upgrade_unit(state, unit) {
                Ok(paid) => {
                    debug!(player = %owner, ?unit, cost = paid, "unit upgraded");
                    upgraded += 1;
                }
                Err(err) => debug!(player = %owner, ?unit, %err, "upgrade refused"),
            }
        } else {
            data.maxbuycost = data.maxbuycost.max(cost);
        }
    }
    upgraded
}
