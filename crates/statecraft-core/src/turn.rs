//! The turn loop: start-of-turn bookkeeping, each player's phase, then the
//! turn counter.

use statecraft_protocol::{Audience, Event, PlayerId};
use tracing::{debug, info};

use crate::advisor::{DefaultAdvisor, ProductionAdvisor};
use crate::cityturn::update_city_activities;
use crate::game::GameState;
use crate::government::update_revolution;
use crate::research::{
    do_tech_parasite_effect, player_research_bulbs, reset_research_turn, update_bulbs,
};

/// Decision-making for computer players. Runs before the player's cities
/// are processed and then advises their production.
pub trait TurnAgent: ProductionAdvisor {
    fn player_phase(&mut self, state: &mut GameState, player: PlayerId);

    /// Bookkeeping for a human player's cities. Production stays with
    /// [`DefaultAdvisor`].
    fn human_phase(&mut self, _state: &mut GameState, _player: PlayerId) {}
}

impl TurnAgent for DefaultAdvisor {
    fn player_phase(&mut self, _state: &mut GameState, _player: PlayerId) {}
}

pub fn begin_turn(state: &mut GameState) {
    let turn = state.turn;
    info!(turn, "turn started");
    state.notify(Audience::All, Event::TurnStarted { turn });
    for player in live_players(state) {
        reset_research_turn(state, player);
    }
}

fn live_players(state: &GameState) -> Vec<PlayerId> {
    state
        .players
        .iter()
        .filter(|p| p.is_alive)
        .map(|p| p.id)
        .collect()
}

/// One player's share of the turn: AI phase, cities, research, revolution.
pub fn player_turn<A: TurnAgent>(state: &mut GameState, player: PlayerId, agent: &mut A) {
    let ai = state.player(player).is_some_and(|p| p.ai_control);
    if ai {
        agent.player_phase(state, player);
        update_city_activities(state, player, &*agent);
    } else {
        agent.human_phase(state, player);
        update_city_activities(state, player, &DefaultAdvisor);
    }

    let bulbs = player_research_bulbs(state, player);
    update_bulbs(state, player, bulbs);
    if let Some(tech) = do_tech_parasite_effect(state, player) {
        debug!(player = %player, ?tech, "tech acquired from other players");
    }
    update_revolution(state, player);

    if state.city_count(player) == 0 && state.units.iter_ordered().all(|(_, u)| u.owner != player) {
        if let Some(p) = state.player_mut(player) {
            if p.is_alive {
                info!(player = %player, "player eliminated");
                p.is_alive = false;
            }
        }
    }
}

pub fn end_turn<A: TurnAgent>(state: &mut GameState, agent: &mut A) {
    for player in live_players(state) {
        player_turn(state, player, agent);
    }
    state.turn += 1;
}

pub fn run_turn<A: TurnAgent>(state: &mut GameState, agent: &mut A) {
    begin_turn(state);
    end_turn(state, agent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;
    use statecraft_protocol::{BuildTarget, CityId};

    #[test]
    fn turns_advance_and_cities_produce() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let pottery = state.rules.tech_id("pottery").unwrap();
        state.players[p.index()].research.researching = Some(pottery);

        for _ in 0..5 {
            run_turn(&mut state, &mut DefaultAdvisor);
        }
        assert_eq!(state.turn, 6);
        let c = state.city(city).unwrap();
        assert!(c.shield_stock > 0 || !state.supported_units(city).is_empty());
        assert!(state.players[p.index()].research.bulbs_researched > 0
            || state.players[p.index()].knows(pottery));
        let started = state
            .take_events()
            .into_iter()
            .filter(|(_, e)| matches!(e, Event::TurnStarted { .. }))
            .count();
        assert_eq!(started, 5);
    }

    #[test]
    fn revolution_finishes_during_turn_processing() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        testkit::found_city(&mut state, p, 4, 4);
        testkit::give_tech(&mut state, p, "monarchy");
        let monarchy = state.rules.government_id("monarchy").unwrap();
        crate::government::handle_player_change_government(&mut state, p, monarchy).unwrap();
        // anarchy lasts revolution_length full turns
        for _ in 0..=state.rules.game.revolution_length {
            run_turn(&mut state, &mut DefaultAdvisor);
        }
        assert_eq!(state.players[p.index()].government, monarchy);
    }

    #[derive(Default)]
    struct CountingAgent {
        ai: u32,
        human: u32,
    }

    impl ProductionAdvisor for CountingAgent {
        fn choose_build(&self, state: &GameState, city: CityId) -> Option<BuildTarget> {
            DefaultAdvisor.choose_build(state, city)
        }
    }

    impl TurnAgent for CountingAgent {
        fn player_phase(&mut self, _state: &mut GameState, _player: PlayerId) {
            self.ai += 1;
        }

        fn human_phase(&mut self, _state: &mut GameState, _player: PlayerId) {
            self.human += 1;
        }
    }

    #[test]
    fn agent_sees_each_kind_of_player_once_per_turn() {
        let mut state = testkit::state(12, 12);
        let human = state.add_player("Human", false);
        let ai = state.add_player("Ai", true);
        testkit::found_city(&mut state, human, 2, 2);
        testkit::found_city(&mut state, ai, 8, 8);
        let mut agent = CountingAgent::default();
        run_turn(&mut state, &mut agent);
        run_turn(&mut state, &mut agent);
        assert_eq!(agent.ai, 2);
        assert_eq!(agent.human, 2);
    }
}
