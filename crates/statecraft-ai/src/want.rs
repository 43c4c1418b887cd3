//! The output model: one integer saying how good a city is for us.

use statecraft_core::{
    can_city_build_improvement_later, compute_city_state, GameState, ImprovementTrial, ReqRange,
};
use statecraft_protocol::{BuildingId, CityId, PlayerId};

use crate::data::AiData;

/// Weighted sum of what the city yields, by the player's priorities.
/// A city that cannot feed or maintain itself never scores above zero.
pub fn city_want(state: &GameState, city: CityId, data: &AiData) -> i32 {
    let Some(cs) = compute_city_state(state, city, None) else {
        return 0;
    };
    let p = &data.priorities;
    let mut want = cs.surplus.food * p.food
        + cs.surplus.shield * p.shield
        + cs.prod.trade * p.trade
        + cs.surplus.gold * p.gold
        + cs.prod.luxury * p.luxury
        + cs.prod.science * p.science
        + cs.citizens.happy as i32 * p.happy
        - cs.citizens.unhappy as i32 * p.unhappy
        - cs.citizens.angry as i32 * p.angry
        - cs.pollution * p.pollution;
    if cs.surplus.food < 0 || cs.surplus.shield < 0 {
        want = want.min(0);
    }
    want
}

/// Widest range any effect of `building` reaches.
pub fn impr_range(state: &GameState, building: BuildingId) -> ReqRange {
    state
        .rules
        .effects_of_building(building)
        .filter_map(|e| e.building_req(building))
        .map(|r| r.range)
        .max()
        .unwrap_or(ReqRange::City)
}

/// Our cities an effect of `building` placed in `city` would touch.
pub fn affected_cities(state: &GameState, city: CityId, building: BuildingId) -> Vec<CityId> {
    let Some(c) = state.city(city) else {
        return Vec::new();
    };
    match impr_range(state, building) {
        ReqRange::Local | ReqRange::City => vec![city],
        ReqRange::Continent => {
            let continent = state.map.continent(c.tile);
            state
                .player_cities(c.owner)
                .into_iter()
                .filter(|&o| state.city(o).is_some_and(|o| state.map.continent(o.tile) == continent))
                .collect()
        }
        ReqRange::Player | ReqRange::World => state.player_cities(c.owner),
    }
}

/// How much better off the empire would be with `building` in `city`,
/// measured against each affected city's cached worth.
///
/// The building is installed through an [`ImprovementTrial`], so the city
/// and the wonder tables are back to normal once this returns.
pub fn base_want(state: &mut GameState, data: &AiData, city: CityId, building: BuildingId) -> i32 {
    if !can_city_build_improvement_later(state, city, building) {
        return 0;
    }
    let cities = affected_cities(state, city, building);
    let Some(trial) = ImprovementTrial::install(state, city, building) else {
        return 0;
    };
    let view: &GameState = &trial;
    cities
        .iter()
        .map(|&c| {
            let worth = view.city(c).map_or(0, |c| c.ai.worth);
            city_want(view, c, data) - worth
        })
        .sum()
}

/// Store every city's current score as its baseline.
pub fn refresh_city_worth(state: &mut GameState, player: PlayerId, data: &AiData) {
    for city in state.player_cities(player) {
        let worth = city_want(state, city, data);
        if let Some(c) = state.city_mut(city) {
            c.ai.worth = worth;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    fn setup() -> (GameState, CityId, AiData) {
        let mut state = testkit::state(12, 12);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 4, 4);
        testkit::set_size(&mut state, city, 4);
        let data = AiData::default();
        refresh_city_worth(&mut state, p, &data);
        (state, city, data)
    }

    #[test]
    fn starving_city_scores_at_most_zero() {
        let (mut state, city, data) = setup();
        assert!(city_want(&state, city, &data) > 0);
        let c = state.city_mut(city).unwrap();
        c.worked.clear();
        c.specialists.entertainers = c.size;
        assert!(city_want(&state, city, &data) <= 0);
    }

    #[test]
    fn library_is_worth_something_once_known() {
        let (mut state, city, mut data) = setup();
        // upkeep is paid in gold; judge the library on science alone
        data.priorities.gold = 0;
        let p = state.city(city).unwrap().owner;
        let library = state.rules.building_id("library").unwrap();
        testkit::give_tech(&mut state, p, "writing");
        refresh_city_worth(&mut state, p, &data);
        assert!(base_want(&mut state, &data, city, library) > 0);
    }

    #[test]
    fn wonder_range_covers_the_empire() {
        let (mut state, city, _) = setup();
        let p = state.city(city).unwrap().owner;
        let other = testkit::found_city(&mut state, p, 9, 9);
        let michelangelo = state.rules.building_id("michelangelos_chapel").unwrap();
        let temple = state.rules.building_id("temple").unwrap();
        assert_eq!(impr_range(&state, michelangelo), ReqRange::Player);
        assert_eq!(affected_cities(&state, city, michelangelo), vec![city, other]);
        assert_eq!(affected_cities(&state, city, temple), vec![city]);
    }
}
