//! Danger assessment and defensive production.

use statecraft_core::{
    best_defender_type, turns_between, AiChoice, ChoiceKind, GameState, UnitClass,
};
use statecraft_protocol::{BuildTarget, CityId};
use tracing::debug;

use crate::config::AiConfig;

/// Score enemy attackers that could reach `city` within `danger_turns`
/// and the defence standing in it. Results land in the city's AI record.
pub fn assess_danger(state: &mut GameState, city: CityId, config: &AiConfig) {
    let Some(c) = state.city(city) else {
        return;
    };
    let owner = c.owner;
    let tile = c.tile;
    let hex = c.hex;

    let mut danger = 0;
    let mut urgency = 0;
    let mut grave_danger = 0;
    for (_, u) in state.units.iter_ordered() {
        if u.owner == owner || !state.diplomacy.at_war(owner, u.owner) {
            continue;
        }
        let t = state.rules.unit_type(u.unit_type);
        if t.attack <= 0 {
            continue;
        }
        let Some(from) = state.map.index_of(u.hex) else {
            continue;
        };
        let turns = if t.class == UnitClass::Land {
            turns_between(state, u.unit_type, from, tile, config.danger_turns)
        } else {
            let moves = (u.hex.distance(hex) + t.move_rate - 1) / t.move_rate.max(1);
            (moves <= config.danger_turns).then_some(moves)
        };
        let Some(turns) = turns else {
            continue;
        };
        danger += t.attack * u.hp * t.firepower / turns.max(1);
        if turns <= 1 {
            grave_danger += 1;
        }
        if turns <= 2 {
            urgency += 1;
        }
    }

    let defense: i32 = state
        .units_at(hex)
        .filter(|(_, u)| u.owner == owner)
        .map(|(_, u)| {
            let t = state.rules.unit_type(u.unit_type);
            t.defense * u.hp * t.firepower
        })
        .sum();

    if let Some(c) = state.city_mut(city) {
        c.ai.danger = danger;
        c.ai.urgency = urgency;
        c.ai.grave_danger = grave_danger;
        c.ai.defense = defense;
        if danger > 0 {
            debug!(city = %c.name, danger, defense, urgency, grave_danger, "city in danger");
        }
    }
}

/// Defender wanted when the danger outweighs the defence.
pub fn military_advisor_choose_build(state: &GameState, city: CityId, config: &AiConfig) -> AiChoice {
    let Some(c) = state.city(city) else {
        return AiChoice::default();
    };
    if c.ai.danger <= c.ai.defense {
        return AiChoice::default();
    }
    let Some(defender) = best_defender_type(state, city) else {
        return AiChoice::default();
    };
    let want = if c.ai.grave_danger > 0 && c.ai.defense == 0 {
        config.very_high_want + 100
    } else {
        100 + 50 * c.ai.urgency as i32
    };
    AiChoice::new(BuildTarget::Unit(defender), want, ChoiceKind::Defender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    #[test]
    fn adjacent_enemy_is_grave_danger() {
        let mut state = testkit::state(10, 10);
        let a = state.add_player("A", true);
        let b = state.add_player("B", true);
        let city = testkit::found_city(&mut state, a, 4, 4);
        testkit::spawn_unit(&mut state, b, "archers", None, 5, 4);
        let config = AiConfig::default();

        assess_danger(&mut state, city, &config);
        assert_eq!(state.city(city).unwrap().ai.danger, 0);

        state.diplomacy.set_war(a, b, true);
        assess_danger(&mut state, city, &config);
        let ai = &state.city(city).unwrap().ai;
        assert!(ai.danger > 0);
        assert_eq!(ai.grave_danger, 1);
        assert_eq!(ai.urgency, 1);
        assert_eq!(ai.defense, 0);

        let choice = military_advisor_choose_build(&state, city, &config);
        assert_eq!(choice.kind, ChoiceKind::Defender);
        assert_eq!(choice.want, config.very_high_want + 100);
    }

    #[test]
    fn garrison_counts_as_defence() {
        let mut state = testkit::state(10, 10);
        let a = state.add_player("A", true);
        let city = testkit::found_city(&mut state, a, 4, 4);
        testkit::spawn_unit(&mut state, a, "warriors", Some(city), 4, 4);
        assess_danger(&mut state, city, &AiConfig::default());
        let ai = &state.city(city).unwrap().ai;
        assert!(ai.defense > 0);
        assert_eq!(
            military_advisor_choose_build(&state, city, &AiConfig::default()).want,
            0
        );
    }
}
