use statecraft_protocol::{CityId, Event};
use tracing::{info, warn};

use crate::effects::player_bonus;
use crate::game::GameState;
use crate::government::government_collapse;
use crate::rules::EffectType;

/// Advance the celebration counter and remember whether the city was
/// happy this turn.
pub fn update_city_celebration(state: &mut GameState, city: CityId) {
    let celebrate_size = state.rules.game.celebrate_size;
    let Some(c) = state.city_mut(city) else {
        return;
    };
    let happy = c.is_happy(celebrate_size);
    let celebrating = c.is_celebrating(celebrate_size) && happy;
    let owner = c.owner;
    let event = if celebrating {
        c.rapture += 1;
        match c.rapture {
            1 => Some(Event::CelebrationStarted { city }),
            2 => Some(Event::CelebrationContinues { city }),
            _ => None,
        }
    } else {
        let ended = c.rapture > 0;
        c.rapture = 0;
        ended.then_some(Event::CelebrationEnded { city })
    };
    c.was_happy = happy;
    if let Some(event) = event {
        state.notify_player(owner, event);
    }
}

/// Advance the disorder counter. Sustained disorder under a government
/// that cannot stand it brings the government down. Returns whether it did.
pub fn update_city_disorder(state: &mut GameState, city: CityId) -> bool {
    let Some(c) = state.city_mut(city) else {
        return false;
    };
    let owner = c.owner;
    let event = if c.is_unhappy() {
        c.anarchy += 1;
        match c.anarchy {
            1 => Some(Event::DisorderStarted { city }),
            2 => Some(Event::DisorderContinues { city }),
            _ => None,
        }
    } else {
        let ended = c.anarchy > 0;
        c.anarchy = 0;
        ended.then_some(Event::DisorderEnded { city })
    };
    let anarchy = c.anarchy;
    let name = c.name.clone();
    match &event {
        Some(Event::DisorderStarted { .. }) => info!(city = %name, "civil disorder"),
        Some(Event::DisorderEnded { .. }) => info!(city = %name, "order restored"),
        _ => {}
    }
    if let Some(event) = event {
        state.notify_player(owner, event);
    }

    if anarchy > state.rules.game.disorder_revolution_turns
        && player_bonus(state, owner, EffectType::RevolutionWhenUnhappy) > 0
    {
        warn!(city = %name, player = %owner, "the people have overthrown the government");
        government_collapse(state, owner);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::Citizens;
    use crate::government::is_in_anarchy;
    use crate::testkit;

    fn set_citizens(state: &mut GameState, city: CityId, citizens: Citizens) {
        state.city_mut(city).unwrap().citizens = citizens;
    }

    #[test]
    fn celebration_starts_continues_and_ends() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        testkit::set_size(&mut state, city, 3);
        let joyful = Citizens {
            happy: 2,
            content: 1,
            unhappy: 0,
            angry: 0,
        };
        set_citizens(&mut state, city, joyful);
        state.city_mut(city).unwrap().was_happy = true;
        state.take_events();

        update_city_celebration(&mut state, city);
        update_city_celebration(&mut state, city);
        update_city_celebration(&mut state, city);
        assert_eq!(state.city(city).unwrap().rapture, 3);

        set_citizens(
            &mut state,
            city,
            Citizens {
                content: 3,
                ..Citizens::default()
            },
        );
        update_city_celebration(&mut state, city);
        let c = state.city(city).unwrap();
        assert_eq!(c.rapture, 0);
        assert!(!c.was_happy);

        let events: Vec<Event> = state.take_events().into_iter().map(|(_, e)| e).collect();
        assert_eq!(
            events,
            vec![
                Event::CelebrationStarted { city },
                Event::CelebrationContinues { city },
                Event::CelebrationEnded { city },
            ]
        );
    }

    #[test]
    fn disorder_is_reported_once_per_phase() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        state.take_events();
        set_citizens(
            &mut state,
            city,
            Citizens {
                unhappy: 1,
                ..Citizens::default()
            },
        );
        for _ in 0..4 {
            assert!(!update_city_disorder(&mut state, city));
        }
        assert_eq!(state.city(city).unwrap().anarchy, 4);
        set_citizens(
            &mut state,
            city,
            Citizens {
                content: 1,
                ..Citizens::default()
            },
        );
        update_city_disorder(&mut state, city);
        assert_eq!(state.city(city).unwrap().anarchy, 0);

        let events: Vec<Event> = state.take_events().into_iter().map(|(_, e)| e).collect();
        assert_eq!(
            events,
            vec![
                Event::DisorderStarted { city },
                Event::DisorderContinues { city },
                Event::DisorderEnded { city },
            ]
        );
    }

    #[test]
    fn long_disorder_topples_a_republic() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let republic = state.rules.government_id("republic").unwrap();
        state.players[p.index()].government = republic;
        let city = testkit::found_city(&mut state, p, 4, 4);
        set_citizens(
            &mut state,
            city,
            Citizens {
                unhappy: 1,
                ..Citizens::default()
            },
        );
        let limit = state.rules.game.disorder_revolution_turns;
        for _ in 0..limit {
            assert!(!update_city_disorder(&mut state, city));
        }
        assert!(update_city_disorder(&mut state, city));
        assert!(is_in_anarchy(&state, p));
        assert_eq!(state.players[p.index()].target_government, Some(republic));
    }
}
