//! Which government to live under, and which one to research towards.

use statecraft_core::{
    can_change_to_government, handle_player_change_government, is_in_anarchy,
    num_unknown_techs_for_goal, EffectType, GameState, GovernmentTrial, ReqSource,
};
use statecraft_protocol::{GovernmentId, PlayerId, TechId};
use tracing::{debug, info, warn};

use crate::data::AiData;
use crate::want::city_want;

/// Benefits lose 1/MORT of their value for every turn they are delayed.
pub const MORT: i32 = 24;

/// Value of `benefit` received `delay` turns from now.
pub fn amortize(benefit: i32, delay: u32) -> i32 {
    (0..delay.min(200)).fold(benefit, |b, _| b * (MORT - 1) / MORT)
}

/// Sum of amounts of `kind` effects tied to government `gov`.
fn government_effect(state: &GameState, gov: GovernmentId, kind: EffectType) -> i32 {
    state
        .rules
        .effects_of_government(gov)
        .filter(|e| e.kind == kind)
        .filter(|e| e.reqs.iter().any(|r| r.present && r.source == ReqSource::Gov(gov)))
        .map(|e| e.amount)
        .sum()
}

fn government_techs(state: &GameState, gov: GovernmentId) -> impl Iterator<Item = TechId> + '_ {
    state
        .rules
        .government(gov)
        .reqs
        .iter()
        .filter(|r| r.present)
        .filter_map(|r| r.tech())
}

/// Empire value under `gov`, in percent-adjusted city want.
fn evaluate_government(state: &mut GameState, player: PlayerId, gov: GovernmentId, data: &AiData) -> i32 {
    let cities = state.player_cities(player);
    let Some(trial) = GovernmentTrial::install(state, player, gov) else {
        return 0;
    };
    let view: &GameState = &trial;
    let val: i32 = cities.iter().map(|&c| city_want(view, c, data)).sum();

    let mut bonus = 0;
    if government_effect(view, gov, EffectType::VeteranBuild) > 0 {
        bonus += 3;
    }
    if government_effect(view, gov, EffectType::RevolutionWhenUnhappy) > 0 {
        bonus -= 3;
    }
    if government_effect(view, gov, EffectType::RaptureGrow) > 0 {
        bonus += 2;
    }
    bonus += government_effect(view, gov, EffectType::OutputIncTile) * 8;
    val + val.abs() * bonus / 100
}

/// Re-evaluate governments every few turns. Revolts when a strictly better
/// government is available now, and remembers the best one overall so its
/// tech can be researched.
pub fn ai_manage_government(state: &mut GameState, player: PlayerId, data: &mut AiData) {
    if data.govt_reeval > 0 {
        data.govt_reeval -= 1;
        return;
    }
    let Some(p) = state.player(player) else {
        return;
    };
    if is_in_anarchy(state, player) || p.target_government.is_some() {
        return;
    }
    let current = p.government;
    let governments: Vec<GovernmentId> = state
        .rules
        .government_ids()
        .filter(|&g| !state.rules.government(g).anarchy)
        .collect();
    if data.government_want.len() != state.rules.governments.len() {
        data.government_want = vec![0; state.rules.governments.len()];
    }

    let current_val = evaluate_government(state, player, current, data);
    let mut best: Option<(GovernmentId, i32)> = None;
    let mut best_now: Option<(GovernmentId, i32)> = None;
    for gov in governments {
        let raw = evaluate_government(state, player, gov, data);
        let dist: u32 = government_techs(state, gov)
            .filter(|&t| state.player(player).is_some_and(|p| !p.knows(t)))
            .map(|t| num_unknown_techs_for_goal(state, player, t).max(1))
            .sum();
        let val = amortize(raw, dist);
        data.government_want[gov.index()] = val;
        debug!(player = %player, government = %state.rules.government(gov).name, val, dist, "government evaluated");
        if best.map_or(true, |(_, v)| val > v) {
            best = Some((gov, val));
        }
        if can_change_to_government(state, player, gov) && best_now.map_or(true, |(_, v)| val > v) {
            best_now = Some((gov, val));
        }
    }

    if let Some((gov, val)) = best_now {
        if gov != current && val > current_val {
            info!(player = %player, government = %state.rules.government(gov).name, val, current_val, "starting revolution");
            if let Err(err) = handle_player_change_government(state, player, gov) {
                warn!(player = %player, %err, "revolution refused");
            }
        }
    }

    data.goal_government = best.map(|(g, _)| g);
    data.goal_government_tech = best.and_then(|(gov, val)| {
        if gov == current {
            return None;
        }
        let p = state.player(player)?;
        let tech = government_techs(state, gov).find(|&t| !p.knows(t))?;
        Some((tech, (val - current_val).max(100)))
    });

    data.govt_reeval = (state.city_count(player) as u32).clamp(5, 20);
}
