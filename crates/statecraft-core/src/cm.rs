//! Citizen governor: decides which tiles a city works.

use statecraft_protocol::{CityId, OutputType, Outputs};
use tracing::debug;

use crate::city::Specialists;
use crate::cityrefresh::{
    city_can_work_tile, city_refresh, city_tile_output, compute_city_state, Arrangement,
};
use crate::game::GameState;

/// Floor that never binds.
pub const NO_FLOOR: i32 = i32::MIN / 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CmParameter {
    pub minimal_surplus: Outputs,
    pub factor: Outputs,
    pub happy_factor: i32,
    pub require_happy: bool,
    pub allow_disorder: bool,
    pub allow_specialists: bool,
}

impl Default for CmParameter {
    fn default() -> Self {
        Self {
            minimal_surplus: Outputs::ZERO,
            factor: Outputs::splat(1),
            happy_factor: 1,
            require_happy: false,
            allow_disorder: false,
            allow_specialists: true,
        }
    }
}

impl CmParameter {
    /// Anything goes, as long as the city keeps producing.
    pub fn emergency() -> Self {
        Self {
            minimal_surplus: Outputs::splat(NO_FLOOR),
            factor: Outputs::splat(1),
            happy_factor: 1,
            require_happy: false,
            allow_disorder: true,
            allow_specialists: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CmResult {
    pub found_a_valid: bool,
    pub disorder: bool,
    pub happy: bool,
    pub surplus: Outputs,
    pub worked: Vec<usize>,
    pub specialists: Specialists,
}

impl CmResult {
    pub fn arrangement(&self) -> Arrangement {
        Arrangement {
            worked: self.worked.clone(),
            specialists: self.specialists,
        }
    }
}

pub trait CitizenGovernor {
    fn query(&self, state: &GameState, city: CityId, param: &CmParameter) -> CmResult;
}

/// Ranks tiles by weighted output and tries every split between tile
/// workers and entertainers.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyGovernor;

impl CitizenGovernor for GreedyGovernor {
    fn query(&self, state: &GameState, city: CityId, param: &CmParameter) -> CmResult {
        let Some(c) = state.city(city) else {
            return CmResult::default();
        };
        let celebrating = c.is_celebrating(state.rules.game.celebrate_size);
        let mut tiles: Vec<(i32, usize)> = state
            .map
            .indices_in_radius(c.hex, state.rules.game.city_radius)
            .into_iter()
            .filter(|&t| city_can_work_tile(state, city, t))
            .map(|t| {
                let out = city_tile_output(state, city, t, celebrating);
                let score = out.food * param.factor.food
                    + out.shield * param.factor.shield
                    + out.trade * (param.factor.trade + param.factor.gold + param.factor.science);
                (score, t)
            })
            .collect();
        // Stable on ties: nearer tiles first.
        tiles.sort_by(|a, b| b.0.cmp(&a.0));

        let size = c.size;
        let max_workers = (size as usize).min(tiles.len());
        let min_workers = if param.allow_specialists { 0 } else { max_workers };

        let mut best: Option<(i64, CmResult)> = None;
        let mut fallback: Option<(i64, CmResult)> = None;
        for workers in (min_workers..=max_workers).rev() {
            let arrangement = Arrangement {
                worked: tiles[..workers].iter().map(|&(_, t)| t).collect(),
                specialists: Specialists {
                    entertainers: size - workers as u32,
                    ..Specialists::default()
                },
            };
            let Some(computed) = compute_city_state(state, city, Some(&arrangement)) else {
                continue;
            };
            let happy = c.size >= state.rules.game.celebrate_size
                && computed.citizens.happy >= (size + 1) / 2
                && computed.citizens.unhappy == 0
                && computed.citizens.angry == 0;
            let meets_floors = OutputType::ALL
                .iter()
                .all(|&o| computed.surplus[o] >= param.minimal_surplus[o]);
            let valid = meets_floors
                && (param.allow_disorder || !computed.disorder)
                && (!param.require_happy || happy);
            let mut score: i64 = OutputType::ALL
                .iter()
                .map(|&o| computed.surplus[o] as i64 * param.factor[o] as i64)
                .sum();
            if happy {
                score += param.happy_factor as i64;
            }
            if computed.disorder {
                score -= 1_000;
            }
            let result = CmResult {
                found_a_valid: valid,
                disorder: computed.disorder,
                happy,
                surplus: computed.surplus,
                worked: arrangement.worked,
                specialists: arrangement.specialists,
            };
            let slot = if valid { &mut best } else { &mut fallback };
            if slot.as_ref().map_or(true, |(s, _)| score > *s) {
                *slot = Some((score, result));
            }
        }
        best.or(fallback).map(|(_, r)| r).unwrap_or_default()
    }
}

// ============================================================================
// AUTO ARRANGE
// ============================================================================

/// Install a governor result: claim worked tiles and refresh.
pub fn apply_cm_result(state: &mut GameState, city: CityId, result: &CmResult) {
    let old: Vec<usize> = match state.city(city) {
        Some(c) => c.worked.clone(),
        None => return,
    };
    for t in old {
        if state.map.tile(t).worked_by == Some(city) {
            state.map.tile_mut(t).worked_by = None;
        }
    }
    for &t in &result.worked {
        state.map.tile_mut(t).worked_by = Some(city);
    }
    if let Some(c) = state.city_mut(city) {
        c.worked = result.worked.clone();
        c.specialists = result.specialists;
    }
    city_refresh(state, city);
}

/// Default parameter used for cities nobody else manages.
pub fn default_parameter(state: &GameState, city: CityId) -> CmParameter {
    let mut cmp = CmParameter {
        require_happy: false,
        allow_disorder: false,
        allow_specialists: true,
        happy_factor: 0,
        ..CmParameter::default()
    };
    let Some(c) = state.city(city) else {
        return cmp;
    };
    cmp.factor = Outputs {
        food: if c.size > 1 { 10 } else { 20 },
        shield: 5,
        trade: 0,
        gold: 2,
        luxury: 0,
        science: 2,
    };
    let granary_full = c.food_stock >= state.rules.game.granary_size(c.size);
    cmp.minimal_surplus = Outputs {
        food: if granary_full { 0 } else { 1 },
        shield: 1,
        trade: 0,
        gold: NO_FLOOR,
        luxury: 0,
        science: 0,
    };
    cmp
}

/// Rearrange workers with progressively relaxed floors. The last stage
/// accepts disorder rather than leaving the city unarranged.
pub fn auto_arrange_workers(state: &mut GameState, city: CityId, governor: &dyn CitizenGovernor) {
    let Some(c) = state.city(city) else {
        return;
    };
    let current_surplus = c.surplus;
    let human = state.player(c.owner).is_some_and(|p| !p.ai_control);
    let base = default_parameter(state, city);

    let mut result = governor.query(state, city, &base);
    if !result.found_a_valid {
        let mut relaxed = base.clone();
        relaxed.minimal_surplus = Outputs::splat(NO_FLOOR);
        result = governor.query(state, city, &relaxed);
    }
    if !result.found_a_valid {
        let mut relaxed = base.clone();
        for o in OutputType::ALL {
            relaxed.minimal_surplus[o] = base.minimal_surplus[o].min(current_surplus[o].min(0));
        }
        relaxed.allow_disorder = human;
        result = governor.query(state, city, &relaxed);
    }
    if !result.found_a_valid {
        debug!(?city, "citizen governor fell back to emergency parameter");
        result = governor.query(state, city, &CmParameter::emergency());
    }
    apply_cm_result(state, city, &result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn arrangement_covers_whole_population() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        testkit::set_size(&mut state, city, 5);
        let c = state.city(city).unwrap();
        assert_eq!(c.worked.len() as u32 + c.specialists.total(), 5);
        for &t in &c.worked {
            assert_eq!(state.map.tile(t).worked_by, Some(city));
        }
    }

    #[test]
    fn neighbours_never_share_a_tile() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let a = testkit::found_city(&mut state, p, 3, 4);
        let b = testkit::found_city(&mut state, p, 6, 4);
        testkit::set_size(&mut state, a, 8);
        testkit::set_size(&mut state, b, 8);
        let wa = &state.city(a).unwrap().worked;
        let wb = &state.city(b).unwrap().worked;
        assert!(wa.iter().all(|t| !wb.contains(t)));
    }

    #[test]
    fn emergency_parameter_always_finds_something() {
        let mut state = testkit::state(6, 6);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 2, 2);
        let result = GreedyGovernor.query(&state, city, &CmParameter::emergency());
        assert!(result.found_a_valid);
    }
}
