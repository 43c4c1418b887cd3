use statecraft_protocol::{CityId, Event, UnitId, UnitTypeId};
use statecraft_protocol::{DisbandCause, PlayerId};
use tracing::debug;

use crate::cityrefresh::city_refresh;
use crate::citytools::{can_player_build_unit_direct, unit_build_shield_cost};
use crate::effects::player_bonus;
use crate::error::GameError;
use crate::game::GameState;
use crate::rules::{CompiledRules, EffectType, UnitFlag};

/// Most advanced unit `from` upgrades into that the player can build.
pub fn can_upgrade_unittype(
    state: &GameState,
    player: PlayerId,
    from: UnitTypeId,
) -> Option<UnitTypeId> {
    let mut best = None;
    let mut current = from;
    for _ in 0..state.rules.unit_types.len() {
        let Some(next) = state.rules.unit_type(current).obsoleted_by else {
            break;
        };
        if can_player_build_unit_direct(state, player, next) {
            best = Some(next);
        }
        current = next;
    }
    best
}

/// Gold to turn a `from` into a `to`.
pub fn unit_upgrade_price(rules: &CompiledRules, from: UnitTypeId, to: UnitTypeId) -> i32 {
    let base = (unit_build_shield_cost(rules, to) - unit_build_shield_cost(rules, from) / 2).max(0);
    2 * base + base * base / 20
}

/// Units upgrade only while standing in one of their owner's cities.
pub fn unit_in_own_city(state: &GameState, unit: UnitId) -> Option<CityId> {
    let u = state.units.get(unit)?;
    let city = state.city_at(u.hex)?;
    (state.city(city)?.owner == u.owner).then_some(city)
}

/// Upgrade `unit` for gold. Returns the price paid.
pub fn upgrade_unit(state: &mut GameState, unit: UnitId) -> Result<i32, GameError> {
    let u = state.units.get(unit).ok_or(GameError::UnknownUnit)?;
    let (owner, from) = (u.owner, u.unit_type);
    unit_in_own_city(state, unit).ok_or(GameError::CannotUpgrade)?;
    let to = can_upgrade_unittype(state, owner, from).ok_or(GameError::CannotUpgrade)?;
    let cost = unit_upgrade_price(&state.rules, from, to);
    let have = state.player(owner).ok_or(GameError::UnknownPlayer(owner))?.gold;
    if cost > have {
        return Err(GameError::NotEnoughGold { needed: cost, have });
    }
    transform_unit(state, unit, to);
    if let Some(p) = state.player_mut(owner) {
        p.gold -= cost;
    }
    state.notify_player(owner, Event::UnitUpgraded { unit, from, to, cost });
    Ok(cost)
}

/// Free upgrades granted by `UpgradeUnit`: that many units a turn.
pub fn free_upgrades_per_turn(state: &GameState, player: PlayerId) -> i32 {
    player_bonus(state, player, EffectType::UpgradeUnit).max(0)
}

/// Change the type of a unit, keeping its relative health.
pub fn transform_unit(state: &mut GameState, unit: UnitId, to: UnitTypeId) {
    let new_hp = state.rules.unit_type(to).hp;
    let Some(u) = state.units.get_mut(unit) else {
        return;
    };
    let old_hp = state.rules.unit_type(u.unit_type).hp.max(1);
    u.hp = (u.hp * new_hp / old_hp).clamp(1, new_hp);
    u.unit_type = to;
    u.veteran = u.veteran.saturating_sub(1);
    let home = u.home;
    if let Some(home) = home {
        city_refresh(state, home);
    }
}

pub fn unit_can_be_disbanded(state: &GameState, unit: UnitId) -> bool {
    state
        .units
        .get(unit)
        .is_some_and(|u| !state.rules.unit_type(u.unit_type).has_flag(UnitFlag::Undisbandable))
}

/// Disband `unit` and tell its owner why. Refreshes the home city.
pub fn disband_unit(state: &mut GameState, unit: UnitId, cause: DisbandCause) {
    let Some(u) = state.wipe_unit(unit) else {
        return;
    };
    debug!(?unit, unit_type = %state.rules.unit_type(u.unit_type).name, ?cause, "unit disbanded");
    if let Some(home) = u.home {
        city_refresh(state, home);
        state.notify_player(
            u.owner,
            Event::UnitDisbanded {
                city: home,
                unit_type: u.unit_type,
                cause,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn upgrade_follows_obsolete_chain() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let warriors = state.rules.unit_type_id("warriors").unwrap();
        let pikemen = state.rules.unit_type_id("pikemen").unwrap();
        assert_eq!(can_upgrade_unittype(&state, p, warriors), None);
        testkit::give_tech(&mut state, p, "feudalism");
        assert_eq!(can_upgrade_unittype(&state, p, warriors), Some(pikemen));
        let price = unit_upgrade_price(&state.rules, warriors, pikemen);
        assert!(price > 0);
    }

    #[test]
    fn upgrade_needs_a_city_and_gold() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        testkit::give_tech(&mut state, p, "feudalism");
        let warriors = state.rules.unit_type_id("warriors").unwrap();
        let unit = testkit::spawn_unit(&mut state, p, "warriors", Some(city), 3, 3);
        state.players[p.index()].gold = 0;
        assert!(matches!(
            upgrade_unit(&mut state, unit),
            Err(GameError::NotEnoughGold { .. })
        ));
        state.players[p.index()].gold = 1000;
        let cost = upgrade_unit(&mut state, unit).unwrap();
        assert_eq!(state.players[p.index()].gold, 1000 - cost);
        assert_ne!(state.units.get(unit).unwrap().unit_type, warriors);

        let away = testkit::spawn_unit(&mut state, p, "warriors", Some(city), 6, 6);
        assert_eq!(upgrade_unit(&mut state, away), Err(GameError::CannotUpgrade));
    }
}
