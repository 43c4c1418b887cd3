use statecraft_protocol::{BuildingId, CityId, DisbandCause, Event, PlayerId, UnitId};
use tracing::warn;

use crate::cityrefresh::{city_improvement_upkeep, city_refresh};
use crate::citytools::{city_remove_improvement, impr_sell_gold};
use crate::game::GameState;
use crate::unittools::{disband_unit, unit_can_be_disbanded};

fn in_debt(state: &GameState, player: PlayerId) -> bool {
    state.player(player).is_some_and(|p| p.gold < 0)
}

/// Get a bankrupt player back to a non-negative balance: sell buildings
/// that cost upkeep, then disband units that cost gold.
pub fn player_balance_treasury(state: &mut GameState, player: PlayerId) {
    if !in_debt(state, player) {
        return;
    }
    warn!(player = %player, gold = state.players[player.index()].gold, "treasury in debt");

    let sellable: Vec<(CityId, BuildingId)> = state
        .player_cities(player)
        .into_iter()
        .flat_map(|city| {
            let buildings: Vec<BuildingId> = state
                .city(city)
                .map(|c| c.buildings().collect())
                .unwrap_or_default();
            buildings.into_iter().map(move |b| (city, b))
        })
        .filter(|&(city, b)| {
            state.rules.building(b).is_sellable() && city_improvement_upkeep(state, city, b) > 0
        })
        .collect();
    for (city, building) in sellable {
        if !in_debt(state, player) {
            return;
        }
        let gold = impr_sell_gold(&state.rules, building);
        city_remove_improvement(state, city, building);
        if let Some(p) = state.player_mut(player) {
            p.gold += gold;
        }
        city_refresh(state, city);
        state.notify_player(player, Event::ImprovementSold { city, building, gold });
    }

    let paid_in_gold: Vec<UnitId> = state
        .units
        .iter_ordered()
        .filter(|(_, u)| u.owner == player && u.upkeep.gold > 0)
        .map(|(id, _)| id)
        .collect();
    for unit in paid_in_gold {
        if !in_debt(state, player) {
            return;
        }
        if unit_can_be_disbanded(state, unit) {
            let upkeep = state.units.get(unit).map_or(0, |u| u.upkeep.gold);
            disband_unit(state, unit, DisbandCause::GoldUpkeep);
            if let Some(p) = state.player_mut(player) {
                p.gold += upkeep;
            }
        }
    }
    if in_debt(state, player) {
        // Nothing left to sell: the debt is forgiven.
        if let Some(p) = state.player_mut(player) {
            p.gold = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn bankruptcy_sells_until_solvent() {
        let mut state = testkit::state(12, 12);
        let p = state.add_player("A", false);
        let a = testkit::found_city(&mut state, p, 2, 2);
        let b = testkit::found_city(&mut state, p, 8, 8);
        let barracks = state.rules.building_id("barracks").unwrap();
        let temple = state.rules.building_id("temple").unwrap();
        testkit::give_building(&mut state, a, barracks);
        testkit::give_building(&mut state, b, temple);
        state.players[p.index()].gold = -10;

        player_balance_treasury(&mut state, p);
        assert!(state.players[p.index()].gold >= 0);
        assert!(!state.city(a).unwrap().has_building(barracks));
        // one sale covered the debt
        assert!(state.city(b).unwrap().has_building(temple));
    }

    #[test]
    fn wonders_are_never_sold() {
        let mut state = testkit::state(12, 12);
        let p = state.add_player("A", false);
        let a = testkit::found_city(&mut state, p, 2, 2);
        let palace = state.rules.building_id("palace").unwrap();
        assert!(state.city(a).unwrap().has_building(palace));
        state.players[p.index()].gold = -10;

        player_balance_treasury(&mut state, p);
        assert!(state.city(a).unwrap().has_building(palace));
        assert_eq!(state.players[p.index()].gold, 0);
    }
}
