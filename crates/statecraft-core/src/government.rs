use statecraft_protocol::{Event, GovernmentId, PlayerId};
use tracing::info;

use crate::cityrefresh::city_refresh_for_player;
use crate::effects::{are_reqs_active, player_bonus, ReqContext, ReqProbe};
use crate::error::GameError;
use crate::game::GameState;
use crate::player::TaxRates;
use crate::rules::{CompiledRules, EffectType};

pub fn anarchy_government(rules: &CompiledRules) -> Option<GovernmentId> {
    rules
        .government_ids()
        .find(|&g| rules.government(g).anarchy)
}

pub fn is_in_anarchy(state: &GameState, player: PlayerId) -> bool {
    state
        .player(player)
        .is_some_and(|p| state.rules.government(p.government).anarchy)
}

pub fn can_change_to_government(state: &GameState, player: PlayerId, gov: GovernmentId) -> bool {
    if state.rules.government(gov).anarchy {
        return false;
    }
    are_reqs_active(
        state,
        &ReqContext::player(player),
        &state.rules.government(gov).reqs,
        ReqProbe::Certain,
    )
}

/// Clamp rates to what the current government allows.
pub fn set_tax_rates(state: &mut GameState, player: PlayerId, rates: TaxRates) -> TaxRates {
    let max_rate = player_bonus(state, player, EffectType::MaxRates);
    let clamped = rates.clamped(max_rate);
    if let Some(p) = state.player_mut(player) {
        p.rates = clamped;
    }
    city_refresh_for_player(state, player);
    clamped
}

/// Start a revolution towards `target`. The player sits in anarchy for
/// `revolution_length` turns first.
pub fn handle_player_change_government(
    state: &mut GameState,
    player: PlayerId,
    target: GovernmentId,
) -> Result<(), GameError> {
    if !can_change_to_government(state, player, target) {
        return Err(GameError::GovernmentUnavailable);
    }
    let turns = state.rules.game.revolution_length;
    let anarchy = anarchy_government(&state.rules);
    let now = state.turn;
    let p = state.player_mut(player).ok_or(GameError::UnknownPlayer(player))?;
    p.target_government = Some(target);
    match anarchy {
        Some(anarchy) if turns > 0 => {
            p.government = anarchy;
            p.revolution_finishes = Some(now + turns);
            state.notify_player(player, Event::RevolutionStarted { player, turns });
        }
        _ => {
            p.revolution_finishes = Some(now);
        }
    }
    update_revolution(state, player);
    let rates = state.players[player.index()].rates;
    set_tax_rates(state, player, rates);
    Ok(())
}

/// Finish a revolution whose anarchy period is over.
pub fn update_revolution(state: &mut GameState, player: PlayerId) {
    let turn = state.turn;
    let Some(p) = state.player_mut(player) else {
        return;
    };
    let (Some(target), Some(finishes)) = (p.target_government, p.revolution_finishes) else {
        return;
    };
    if finishes > turn {
        return;
    }
    p.government = target;
    p.target_government = None;
    p.revolution_finishes = None;
    info!(player = %player, government = %state.rules.government(target).name, "government changed");
    state.notify_player(player, Event::GovernmentChanged { player, government: target });
    let rates = state.players[player.index()].rates;
    set_tax_rates(state, player, rates);
}

/// Sustained disorder brings the government down into anarchy. The player
/// returns to the same government afterwards.
pub fn government_collapse(state: &mut GameState, player: PlayerId) {
    let Some(p) = state.player(player) else {
        return;
    };
    let current = p.government;
    let target = p.target_government.unwrap_or(current);
    let turns = state.rules.game.revolution_length.max(1);
    let finishes = state.turn + turns;
    let Some(anarchy) = anarchy_government(&state.rules) else {
        return;
    };
    if let Some(p) = state.player_mut(player) {
        p.government = anarchy;
        p.target_government = Some(target);
        p.revolution_finishes = Some(finishes);
    }
    info!(player = %player, "government collapsed");
    state.notify_player(player, Event::GovernmentCollapsed { player });
    let rates = state.players[player.index()].rates;
    set_tax_rates(state, player, rates);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn revolution_passes_through_anarchy() {
        let mut state = testkit::state(6, 6);
        let p = state.add_player("A", false);
        let monarchy = state.rules.government_id("monarchy").unwrap();
        assert_eq!(
            handle_player_change_government(&mut state, p, monarchy),
            Err(GameError::GovernmentUnavailable)
        );
        testkit::give_tech(&mut state, p, "monarchy");
        handle_player_change_government(&mut state, p, monarchy).unwrap();
        assert!(is_in_anarchy(&state, p));
        assert_eq!(state.players[p.index()].rates.sci, 0);

        state.turn += state.rules.game.revolution_length;
        update_revolution(&mut state, p);
        assert_eq!(state.players[p.index()].government, monarchy);
    }

    #[test]
    fn collapse_returns_to_same_government() {
        let mut state = testkit::state(6, 6);
        let p = state.add_player("A", false);
        let despotism = state.players[p.index()].government;
        government_collapse(&mut state, p);
        assert!(is_in_anarchy(&state, p));
        assert_eq!(state.players[p.index()].target_government, Some(despotism));
    }
}
