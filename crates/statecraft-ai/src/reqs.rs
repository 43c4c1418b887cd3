//! Pushing the want for an unbuildable building back onto whatever stands
//! in its way.

use statecraft_core::{is_req_active, GameState, ReqContext, ReqProbe, ReqSource};
use statecraft_protocol::{BuildingId, CityId, TechId};

use crate::config::AiConfig;

/// Prerequisite chains deeper than this are not followed.
const MAX_REQ_DEPTH: u32 = 8;

/// Tech want accumulated while evaluating one city.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TechWants {
    wants: Vec<i32>,
}

impl TechWants {
    pub fn new(techs: usize) -> Self {
        Self {
            wants: vec![0; techs],
        }
    }

    pub fn credit(&mut self, tech: TechId, amount: i32) {
        if let Some(w) = self.wants.get_mut(tech.index()) {
            *w = w.saturating_add(amount);
        }
    }

    pub fn get(&self, tech: TechId) -> i32 {
        self.wants.get(tech.index()).copied().unwrap_or(0)
    }

    /// Nonzero entries, in tech order.
    pub fn into_shares(self) -> Vec<(TechId, i32)> {
        self.wants
            .into_iter()
            .enumerate()
            .filter(|&(_, w)| w != 0)
            .map(|(i, w)| (TechId::new(i as u16), w))
            .collect()
    }
}

/// Credit `want` to the missing techs of `building`, and a quarter share
/// to its missing prerequisite buildings, recursively.
///
/// Returns whether every requirement of `building` already holds for
/// `city`. Non-positive want is never propagated.
pub fn adjust_wants_for_reqs(
    state: &GameState,
    city: CityId,
    building: BuildingId,
    want: i32,
    techs: &mut TechWants,
    config: &AiConfig,
) -> bool {
    adjust_wants_at_depth(state, city, building, want, techs, config, 0)
}

fn adjust_wants_at_depth(
    state: &GameState,
    city: CityId,
    building: BuildingId,
    want: i32,
    techs: &mut TechWants,
    config: &AiConfig,
    depth: u32,
) -> bool {
    let ctx = ReqContext::city(state, city);
    let mut all_met = true;
    let mut needed_techs = Vec::new();
    let mut needed_buildings = Vec::new();
    for req in &state.rules.building(building).reqs {
        let active = is_req_active(state, &ctx, req, ReqProbe::Possible);
        if !active {
            match req.source {
                ReqSource::Tech(t) => needed_techs.push(t),
                ReqSource::Building(b) => needed_buildings.push(b),
                _ => {}
            }
        }
        all_met &= active;
    }

    if want > 0 && !needed_techs.is_empty() {
        let dv = want / (needed_techs.len() as i32 * config.tech_req_divisor.max(1));
        for t in needed_techs {
            techs.credit(t, dv);
        }
    }

    // Prerequisite buildings are followed whether or not they can be built
    // right away.
    if want > 0 && !needed_buildings.is_empty() && depth < MAX_REQ_DEPTH {
        let dv = want / (needed_buildings.len() as i32 * config.building_req_divisor.max(1));
        for needed in needed_buildings {
            if needed != building {
                let met = adjust_wants_at_depth(state, city, needed, dv, techs, config, depth + 1);
                all_met &= met;
            }
        }
    }
    all_met
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    #[test]
    fn missing_tech_gets_the_full_want() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let library = state.rules.building_id("library").unwrap();
        let writing = state.rules.tech_id("writing").unwrap();

        let mut techs = TechWants::new(state.rules.techs.len());
        let met = adjust_wants_for_reqs(&state, city, library, 80, &mut techs, &AiConfig::default());
        assert!(!met);
        assert_eq!(techs.get(writing), 80);
    }

    #[test]
    fn missing_building_passes_a_quarter_down() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let university = state.rules.building_id("university").unwrap();
        let writing = state.rules.tech_id("writing").unwrap();
        let university_tech = state.rules.tech_id("university").unwrap();

        let mut techs = TechWants::new(state.rules.techs.len());
        adjust_wants_for_reqs(&state, city, university, 400, &mut techs, &AiConfig::default());
        assert_eq!(techs.get(university_tech), 400);
        // library needs writing; the library share is 400 / 4
        assert_eq!(techs.get(writing), 100);
    }

    #[test]
    fn negative_want_is_not_propagated() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let library = state.rules.building_id("library").unwrap();

        let mut techs = TechWants::new(state.rules.techs.len());
        let met = adjust_wants_for_reqs(&state, city, library, -50, &mut techs, &AiConfig::default());
        assert!(!met);
        assert!(techs.into_shares().is_empty());
    }

    #[test]
    fn met_requirements_report_true() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let barracks = state.rules.building_id("barracks").unwrap();
        let mut techs = TechWants::new(state.rules.techs.len());
        assert!(adjust_wants_for_reqs(&state, city, barracks, 30, &mut techs, &AiConfig::default()));
    }
}
