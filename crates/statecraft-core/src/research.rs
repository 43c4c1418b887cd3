//! Research bookkeeping: bulbs, learning techs, targets and goals.

use std::collections::BTreeSet;

use statecraft_protocol::{Event, PlayerId, TechId};
use tracing::info;

use crate::cityrefresh::city_refresh_for_player;
use crate::effects::player_bonus;
use crate::error::GameError;
use crate::game::GameState;
use crate::rules::EffectType;

/// Bulbs needed to learn `tech`.
pub fn total_bulbs_required(state: &GameState, tech: TechId) -> i32 {
    state.rules.tech(tech).cost.max(1)
}

/// Unknown techs needed before `goal`, including `goal` itself.
pub fn unknown_techs_for_goal(state: &GameState, player: PlayerId, goal: TechId) -> BTreeSet<TechId> {
    let mut out = BTreeSet::new();
    let Some(p) = state.player(player) else {
        return out;
    };
    let mut stack = vec![goal];
    while let Some(tech) = stack.pop() {
        if p.knows(tech) || !out.insert(tech) {
            continue;
        }
        stack.extend(state.rules.tech(tech).reqs.iter().copied());
    }
    out
}

pub fn num_unknown_techs_for_goal(state: &GameState, player: PlayerId, goal: TechId) -> u32 {
    unknown_techs_for_goal(state, player, goal).len() as u32
}

/// The cheapest researchable tech on the way to `goal`.
pub fn next_step_towards_goal(state: &GameState, player: PlayerId, goal: TechId) -> Option<TechId> {
    let p = state.player(player)?;
    unknown_techs_for_goal(state, player, goal)
        .into_iter()
        .filter(|&t| p.can_research(&state.rules, t))
        .min_by_key(|&t| (total_bulbs_required(state, t), t.index()))
}

/// Known already, or some unknown ancestor can be researched right now.
pub fn is_tech_reachable(state: &GameState, player: PlayerId, tech: TechId) -> bool {
    let Some(p) = state.player(player) else {
        return false;
    };
    p.knows(tech) || next_step_towards_goal(state, player, tech).is_some()
}

pub fn player_research_bulbs(state: &GameState, player: PlayerId) -> i32 {
    state
        .player_cities(player)
        .into_iter()
        .filter_map(|c| state.city(c))
        .map(|c| c.surplus.science.max(0))
        .sum()
}

/// Start of turn: switching back to this turn's target is free.
pub fn reset_research_turn(state: &mut GameState, player: PlayerId) {
    if let Some(p) = state.player_mut(player) {
        p.research.got_tech = false;
        p.research.changed_from = p.research.researching;
        p.research.bulbs_before_change = p.research.bulbs_researched;
    }
}

/// Mark `tech` known and pick the next target from the goal.
pub fn found_new_tech(state: &mut GameState, player: PlayerId, tech: TechId) {
    let cost = total_bulbs_required(state, tech);
    let Some(p) = state.player_mut(player) else {
        return;
    };
    if p.knows(tech) {
        return;
    }
    p.known_techs[tech.index()] = true;
    p.research.techs_researched += 1;
    p.research.got_tech = true;
    if p.research.researching == Some(tech) {
        p.research.bulbs_researched = (p.research.bulbs_researched - cost).max(0);
        p.research.researching = None;
    }
    if p.research.goal == Some(tech) {
        p.research.goal = None;
    }
    let goal = p.research.goal;
    let researching = p.research.researching;
    info!(player = %player, tech = %state.rules.tech(tech).name, "tech learned");
    state.notify_player(player, Event::TechLearned { player, tech });

    if researching.is_none() {
        let next = goal.and_then(|g| next_step_towards_goal(state, player, g));
        if let Some(p) = state.player_mut(player) {
            p.research.researching = next;
        }
    }
    city_refresh_for_player(state, player);
}

/// Learn the current target (or the next one towards the goal) for free.
pub fn give_immediate_free_tech(state: &mut GameState, player: PlayerId) -> Option<TechId> {
    let p = state.player(player)?;
    let tech = p
        .research
        .researching
        .or_else(|| p.research.goal.and_then(|g| next_step_towards_goal(state, player, g)))
        .or_else(|| {
            state
                .rules
                .tech_ids()
                .find(|&t| p.can_research(&state.rules, t))
        })?;
    let keep = p.research.bulbs_researched;
    found_new_tech(state, player, tech);
    // Free techs do not consume stored bulbs.
    if let Some(p) = state.player_mut(player) {
        p.research.bulbs_researched = keep;
    }
    Some(tech)
}

/// Add bulbs and learn the target when it is paid for.
pub fn update_bulbs(state: &mut GameState, player: PlayerId, bulbs: i32) {
    let Some(p) = state.player_mut(player) else {
        return;
    };
    p.research.bulbs_researched += bulbs;
    let (Some(tech), have) = (p.research.researching, p.research.bulbs_researched) else {
        return;
    };
    if have >= total_bulbs_required(state, tech) {
        found_new_tech(state, player, tech);
    }
}

/// Switch research. Bulbs are lost unless a tech was learned this turn or
/// the player returns to the target it had at the start of the turn.
pub fn choose_tech(state: &mut GameState, player: PlayerId, tech: TechId) -> Result<(), GameError> {
    let rules = state.rules.clone();
    let p = state.player_mut(player).ok_or(GameError::UnknownPlayer(player))?;
    if tech.index() >= rules.techs.len() {
        return Err(GameError::UnknownTechnology);
    }
    if p.knows(tech) {
        return Err(GameError::TechAlreadyResearched);
    }
    if !p.can_research(&rules, tech) {
        return Err(GameError::UnknownTechnology);
    }
    if p.research.researching == Some(tech) {
        return Ok(());
    }
    let mut lost = 0;
    if !p.research.got_tech {
        if p.research.changed_from == Some(tech) {
            p.research.bulbs_researched = p.research.bulbs_before_change;
        } else {
            if p.research.researching == p.research.changed_from {
                p.research.bulbs_before_change = p.research.bulbs_researched;
            }
            lost = p.research.bulbs_researched.max(0);
            p.research.bulbs_researched -= lost;
        }
    }
    p.research.researching = Some(tech);
    state.notify_player(
        player,
        Event::ResearchChanged {
            player,
            tech,
            lost_bulbs: lost,
        },
    );
    Ok(())
}

pub fn choose_tech_goal(state: &mut GameState, player: PlayerId, goal: TechId) -> Result<(), GameError> {
    let p = state.player(player).ok_or(GameError::UnknownPlayer(player))?;
    if p.knows(goal) {
        return Err(GameError::TechAlreadyResearched);
    }
    if !is_tech_reachable(state, player, goal) {
        return Err(GameError::UnknownTechnology);
    }
    let p = state.player_mut(player).ok_or(GameError::UnknownPlayer(player))?;
    if p.research.goal != Some(goal) {
        p.research.goal = Some(goal);
        state.notify_player(player, Event::TechGoalChanged { player, tech: goal });
    }
    Ok(())
}

/// `TechParasite`: learn a tech already known by that many other players.
pub fn do_tech_parasite_effect(state: &mut GameState, player: PlayerId) -> Option<TechId> {
    let needed = player_bonus(state, player, EffectType::TechParasite);
    if needed <= 0 {
        return None;
    }
    let me = state.player(player)?;
    let tech = state.rules.tech_ids().find(|&t| {
        me.can_research(&state.rules, t)
            && state
                .players
                .iter()
                .filter(|o| o.id != player && o.is_alive && o.knows(t))
                .count() as i32
                >= needed
    })?;
    found_new_tech(state, player, tech);
    Some(tech)
}
