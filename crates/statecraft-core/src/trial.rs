//! Scoped "what if" changes to the shared world state.
//!
//! A trial installs a hypothetical building or government, hands out
//! read-only access for evaluation, and restores the previous state when it
//! goes out of scope, on every exit path.

use std::ops::Deref;

use statecraft_protocol::{BuildingId, CityId, GovernmentId, PlayerId};

use crate::game::{GameState, WonderSlot};
use crate::rules::BuildingGenus;

pub struct ImprovementTrial<'a> {
    state: &'a mut GameState,
    city: CityId,
    building: BuildingId,
    had_building: bool,
    great_slot: Option<WonderSlot>,
    small_holder: Option<(PlayerId, Option<CityId>)>,
}

impl<'a> ImprovementTrial<'a> {
    /// Pretend `city` has `building`. Returns `None` for an unknown city.
    pub fn install(state: &'a mut GameState, city: CityId, building: BuildingId) -> Option<Self> {
        let c = state.city(city)?;
        let owner = c.owner;
        let had_building = c.has_building(building);
        let mut great_slot = None;
        let mut small_holder = None;
        match state.rules.building(building).genus {
            BuildingGenus::GreatWonder => {
                great_slot = Some(state.great_wonders[building.index()]);
                state.great_wonders[building.index()] = WonderSlot::Built { city, owner };
            }
            BuildingGenus::SmallWonder => {
                let p = state.player_mut(owner)?;
                small_holder = Some((owner, p.small_wonders[building.index()]));
                p.small_wonders[building.index()] = Some(city);
            }
            _ => {}
        }
        if let Some(c) = state.city_mut(city) {
            c.built[building.index()] = true;
        }
        Some(Self {
            state,
            city,
            building,
            had_building,
            great_slot,
            small_holder,
        })
    }

    pub fn city(&self) -> CityId {
        self.city
    }

    pub fn building(&self) -> BuildingId {
        self.building
    }
}

impl Deref for ImprovementTrial<'_> {
    type Target = GameState;

    fn deref(&self) -> &GameState {
        self.state
    }
}

impl Drop for ImprovementTrial<'_> {
    fn drop(&mut self) {
        let index = self.building.index();
        if let Some(c) = self.state.city_mut(self.city) {
            c.built[index] = self.had_building;
        }
        if let Some(slot) = self.great_slot {
            self.state.great_wonders[index] = slot;
        }
        if let Some((owner, holder)) = self.small_holder {
            if let Some(p) = self.state.player_mut(owner) {
                p.small_wonders[index] = holder;
            }
        }
    }
}

/// Pretend a player lives under another government.
pub struct GovernmentTrial<'a> {
    state: &'a mut GameState,
    player: PlayerId,
    previous: GovernmentId,
}

impl<'a> GovernmentTrial<'a> {
    pub fn install(state: &'a mut GameState, player: PlayerId, government: GovernmentId) -> Option<Self> {
        let p = state.player_mut(player)?;
        let previous = p.government;
        p.government = government;
        Some(Self {
            state,
            player,
            previous,
        })
    }
}

impl Deref for GovernmentTrial<'_> {
    type Target = GameState;

    fn deref(&self) -> &GameState {
        self.state
    }
}

impl Drop for GovernmentTrial<'_> {
    fn drop(&mut self) {
        if let Some(p) = self.state.player_mut(self.player) {
            p.government = self.previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::city_bonus;
    use crate::rules::EffectType;
    use crate::testkit;

    #[test]
    fn wonder_trial_restores_tables() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let shakespeare = state.rules.building_id("shakespeares_theatre").unwrap();
        let built_before = state.city(city).unwrap().built.clone();
        let wonders_before = state.great_wonders.clone();
        {
            let trial = ImprovementTrial::install(&mut state, city, shakespeare).unwrap();
            assert_eq!(city_bonus(&trial, city, EffectType::NoUnhappy), 1);
            assert_eq!(trial.great_wonder_owner(shakespeare), Some(p));
        }
        assert_eq!(state.city(city).unwrap().built, built_before);
        assert_eq!(state.great_wonders, wonders_before);
    }

    #[test]
    fn small_wonder_trial_keeps_real_holder() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let capital = testkit::found_city(&mut state, p, 2, 2);
        let other = testkit::found_city(&mut state, p, 6, 6);
        let palace = state.rules.building_id("palace").unwrap();
        {
            let trial = ImprovementTrial::install(&mut state, other, palace).unwrap();
            assert_eq!(trial.small_wonder_city(p, palace), Some(other));
        }
        assert_eq!(state.small_wonder_city(p, palace), Some(capital));
        assert!(!state.city(other).unwrap().has_building(palace));
    }

    #[test]
    fn government_trial_restores() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let before = state.players[p.index()].government;
        let republic = state.rules.government_id("republic").unwrap();
        {
            let trial = GovernmentTrial::install(&mut state, p, republic).unwrap();
            assert_eq!(trial.players[p.index()].government, republic);
        }
        assert_eq!(state.players[p.index()].government, before);
    }
}
