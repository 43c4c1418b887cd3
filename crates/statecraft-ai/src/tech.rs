//! Research target and goal selection.

use statecraft_core::{
    choose_tech, choose_tech_goal, total_bulbs_required, unknown_techs_for_goal, GameState,
    Handicap,
};
use statecraft_protocol::{PlayerId, TechId};
use tracing::{debug, info, warn};

use crate::data::AiData;

/// Outcome of one pass over the tech tree. Wants are per city.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TechSelection {
    /// Best tech researchable right now.
    pub choice: Option<TechId>,
    pub choice_want: i32,
    /// Want of what is being researched now, on the same scale.
    pub current_want: i32,
    /// Best long-term goal.
    pub goal: Option<TechId>,
    pub goal_want: i32,
    pub current_goal_want: i32,
}

/// Rank every tech by `wants`.
///
/// A tech is worth its own want plus a share of the want of each unknown
/// tech it leads to, the share being that tech's want divided by the
/// number of unknown prerequisites it still has. A goal is worth the mean
/// of its own value and those of its unknown prerequisites.
pub fn ai_select_tech(state: &GameState, player: PlayerId, wants: &[i32]) -> TechSelection {
    let Some(p) = state.player(player) else {
        return TechSelection::default();
    };
    let rules = &state.rules;
    let n = rules.techs.len();
    let mut values = vec![0i32; n];
    let mut goal_values = vec![0i32; n];
    let mut unknown = Vec::with_capacity(n);

    for t in rules.tech_ids() {
        let mut prereqs = unknown_techs_for_goal(state, player, t);
        prereqs.remove(&t);
        unknown.push(prereqs);
    }

    for t in rules.tech_ids() {
        if p.knows(t) {
            continue;
        }
        let want = wants.get(t.index()).copied().unwrap_or(0);
        values[t.index()] = values[t.index()].saturating_add(want);
        let prereqs = &unknown[t.index()];
        let share = want / (prereqs.len() as i32).max(1);
        for k in prereqs {
            values[k.index()] = values[k.index()].saturating_add(share);
        }
    }

    for t in rules.tech_ids() {
        if p.knows(t) {
            continue;
        }
        let prereqs = &unknown[t.index()];
        let total = prereqs
            .iter()
            .fold(values[t.index()], |acc, k| acc.saturating_add(values[k.index()]));
        goal_values[t.index()] = total / (prereqs.len() as i32 + 1);
    }

    let mut selection = TechSelection::default();
    let mut best_value = 0;
    let mut best_goal = 0;
    for t in rules.tech_ids() {
        let i = t.index();
        if values[i] > best_value && p.can_research(rules, t) {
            best_value = values[i];
            selection.choice = Some(t);
        }
        if goal_values[i] > best_goal && !p.knows(t) {
            best_goal = goal_values[i];
            selection.goal = Some(t);
        }
    }

    let cities = (state.city_count(player) as i32).max(1);
    selection.choice_want = best_value / cities;
    selection.goal_want = best_goal / cities;
    selection.current_want = p.research.researching.map_or(0, |t| values[t.index()]) / cities;
    selection.current_goal_want = p.research.goal.map_or(0, |t| goal_values[t.index()]) / cities;
    selection
}

/// Empire-wide tech want: every city's shares plus the government goal.
pub fn accumulate_tech_want(state: &GameState, player: PlayerId, data: &AiData) -> Vec<i32> {
    let mut wants = vec![0i32; state.rules.techs.len()];
    for city in state.player_cities(player) {
        let Some(c) = state.city(city) else {
            continue;
        };
        for &(t, w) in &c.ai.tech_share {
            if let Some(slot) = wants.get_mut(t.index()) {
                *slot = slot.saturating_add(w);
            }
        }
    }
    if let Some((t, w)) = data.goal_government_tech {
        if let Some(slot) = wants.get_mut(t.index()) {
            *slot = slot.saturating_add(w);
        }
    }
    wants
}

/// Switching only pays when the gain beats what is thrown away.
pub fn should_switch_research(want: i32, current_want: i32, penalty: i32) -> bool {
    want - current_want > penalty
}

/// Pick research and a research goal from this turn's tech wants.
pub fn ai_manage_tech(state: &mut GameState, player: PlayerId, data: &AiData) {
    let Some(p) = state.player(player) else {
        return;
    };
    if p.handicaps.has(Handicap::Away) {
        return;
    }
    let wants = accumulate_tech_want(state, player, data);
    let selection = ai_select_tech(state, player, &wants);
    let Some(p) = state.player_mut(player) else {
        return;
    };
    p.tech_want = wants;
    let research = p.research.clone();

    match (research.researching, selection.choice) {
        (None, choice) => {
            let fallback = || {
                let p = state.player(player)?;
                state
                    .rules
                    .tech_ids()
                    .filter(|&t| p.can_research(&state.rules, t))
                    .min_by_key(|&t| total_bulbs_required(state, t))
            };
            if let Some(t) = choice.or_else(fallback) {
                if let Err(err) = choose_tech(state, player, t) {
                    warn!(player = %player, %err, "could not start research");
                }
            }
        }
        (Some(current), Some(choice)) if choice != current => {
            let penalty = if research.got_tech {
                0
            } else {
                research.bulbs_researched
            };
            if should_switch_research(selection.choice_want, selection.current_want, penalty) {
                info!(
                    player = %player,
                    tech = %state.rules.tech(choice).name,
                    want = selection.choice_want,
                    current = selection.current_want,
                    penalty,
                    "switching research"
                );
                if let Err(err) = choose_tech(state, player, choice) {
                    warn!(player = %player, %err, "could not switch research");
                }
            }
        }
        _ => {}
    }

    if let Some(goal) = selection.goal {
        if research.goal != Some(goal) && selection.goal_want > selection.current_goal_want {
            debug!(player = %player, goal = %state.rules.tech(goal).name, want = selection.goal_want, "new tech goal");
            if let Err(err) = choose_tech_goal(state, player, goal) {
                warn!(player = %player, %err, "could not set tech goal");
            }
        }
    }
}
