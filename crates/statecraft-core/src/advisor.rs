//! The seam through which the turn driver asks for a new build target.

use statecraft_protocol::{BuildTarget, CityId};

use crate::citytools::{best_defender_type, can_city_build_improvement_now};
use crate::game::GameState;

/// Picks what a city should build next once its target is done or invalid.
pub trait ProductionAdvisor {
    fn choose_build(&self, state: &GameState, city: CityId) -> Option<BuildTarget>;
}

/// Highest positive `building_want` among buildings the city can build now,
/// otherwise the best defender.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAdvisor;

impl ProductionAdvisor for DefaultAdvisor {
    fn choose_build(&self, state: &GameState, city: CityId) -> Option<BuildTarget> {
        let c = state.city(city)?;
        let building = state
            .rules
            .building_ids()
            .filter(|&b| c.ai.building_want.get(b.index()).copied().unwrap_or(0) > 0)
            .filter(|&b| can_city_build_improvement_now(state, city, b))
            .max_by_key(|&b| (c.ai.building_want[b.index()], -(b.index() as i32)));
        building
            .map(BuildTarget::Improvement)
            .or_else(|| best_defender_type(state, city).map(BuildTarget::Unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn highest_buildable_want_wins() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let granary = state.rules.building_id("granary").unwrap();
        let temple = state.rules.building_id("temple").unwrap();
        let barracks = state.rules.building_id("barracks").unwrap();
        {
            let c = state.city_mut(city).unwrap();
            c.ai.building_want[granary.index()] = 500;
            c.ai.building_want[temple.index()] = 900;
            c.ai.building_want[barracks.index()] = 40;
        }
        // temple needs ceremonial burial, granary needs pottery
        assert_eq!(
            DefaultAdvisor.choose_build(&state, city),
            Some(BuildTarget::Improvement(barracks))
        );
        testkit::give_tech(&mut state, p, "ceremonial_burial");
        assert_eq!(
            DefaultAdvisor.choose_build(&state, city),
            Some(BuildTarget::Improvement(temple))
        );
    }

    #[test]
    fn falls_back_to_a_defender() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let warriors = state.rules.unit_type_id("warriors").unwrap();
        assert_eq!(
            DefaultAdvisor.choose_build(&state, city),
            Some(BuildTarget::Unit(warriors))
        );
    }
}
