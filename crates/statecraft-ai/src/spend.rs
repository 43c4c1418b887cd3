//! Turning gold into production.

use statecraft_core::{
    build_shield_cost, city_bonus, city_granary_size, city_production_buy_gold_cost,
    player_improvement_upkeep, really_handle_city_buy, really_handle_city_sell, ChoiceKind,
    EffectType, GameState, UnitFlag,
};
use statecraft_protocol::{BuildTarget, CityId, Event, PlayerId};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::data::AiData;
use crate::upgrade::ai_upgrade_units;

/// Gold to keep in the treasury: two per citizen, or the most expensive
/// thing we recently could not buy.
pub fn ai_gold_reserve(state: &GameState, player: PlayerId, data: &AiData) -> i32 {
    let citizens: u32 = state
        .player_cities(player)
        .into_iter()
        .filter_map(|c| state.city(c))
        .map(|c| c.size)
        .sum();
    data.maxbuycost.max(citizens as i32 * 2)
}

/// Gold the player pays every turn for buildings and units.
fn expenses(state: &GameState, player: PlayerId) -> i32 {
    let units: i32 = state
        .units
        .iter_ordered()
        .filter(|(_, u)| u.owner == player)
        .map(|(_, u)| u.upkeep.gold)
        .sum();
    player_improvement_upkeep(state, player) + units
}

/// Sell the first building that is not part of the city's defence.
fn try_to_sell_stuff(state: &mut GameState, player: PlayerId, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let rules = &state.rules;
    let candidate = c.buildings().find(|&b| {
        rules.building(b).is_sellable()
            && !rules
                .effects_of_building(b)
                .any(|e| e.kind == EffectType::DefendBonus)
    });
    let Some(building) = candidate else {
        return false;
    };
    match really_handle_city_sell(state, player, city, building) {
        Ok(gold) => {
            info!(player = %player, building = %state.rules.building(building).name, gold, "sold building for emergency defence");
            true
        }
        Err(err) => {
            debug!(player = %player, %err, "emergency sale refused");
            false
        }
    }
}

fn buy(state: &mut GameState, player: PlayerId, city: CityId, want: i32) -> bool {
    match really_handle_city_buy(state, player, city) {
        Ok(cost) => {
            if let Some(c) = state.city(city) {
                info!(player = %player, city = %c.name, cost, want, "bought production");
            }
            true
        }
        Err(err) => {
            debug!(player = %player, %err, "purchase refused");
            false
        }
    }
}

/// Spend the treasury on the most wanted production across the empire,
/// highest want first, then upgrade civilian units with what is left.
pub fn ai_spend_gold(state: &mut GameState, player: PlayerId, data: &mut AiData, config: &AiConfig) {
    data.maxbuycost = 0;
    let war_footing = data.standing.at_war;
    let expenses = expenses(state, player);
    let cities = state.player_cities(player);
    let mut wants: Vec<(CityId, i32)> = cities
        .iter()
        .filter_map(|&c| state.city(c).map(|city| (c, city.ai.choice.want)))
        .collect();

    loop {
        let mut limit = ai_gold_reserve(state, player, data);
        let mut best: Option<usize> = None;
        for (i, &(_, want)) in wants.iter().enumerate() {
            if want > best.map_or(0, |b| wants[b].1) {
                best = Some(i);
            }
        }
        let Some(best) = best else {
            break;
        };
        let (city, want) = wants[best];
        wants[best].1 = 0;

        let Some(c) = state.city(city) else {
            continue;
        };
        let choice = c.ai.choice;
        let urgency = c.ai.urgency;

        if urgency > 1 {
            let building_wonder = matches!(
                c.currently_building,
                BuildTarget::Improvement(b) if state.rules.is_wonder(b)
            );
            if building_wonder {
                debug!(city = %c.name, "wonder being built in a dangerous place");
            } else {
                let upgrade_limit = if urgency > config.extreme_urgency {
                    limit / 2
                } else {
                    limit
                };
                ai_upgrade_units(state, city, upgrade_limit, true, data);
            }
        }

        let Some(c) = state.city(city) else {
            continue;
        };
        if c.anarchy > 0 && choice.kind != ChoiceKind::Building {
            continue;
        }
        let buycost = city_production_buy_gold_cost(state, city);
        if buycost <= 0 {
            continue;
        }

        let target = c.currently_building;
        let founder = target
            .unit()
            .is_some_and(|u| state.rules.unit_type(u).has_flag(UnitFlag::Cities));
        if founder {
            if city_bonus(state, city, EffectType::GrowthFood) == 0
                && c.size == 1
                && city_granary_size(state, c.size) > c.food_stock + c.surplus.food
            {
                continue;
            }
            if cities.len() >= config.settler_city_limit || war_footing {
                continue;
            }
        } else {
            limit *= 2;
        }

        let gold = state.player(player).map_or(0, |p| p.gold);
        let expensive = c.shield_stock == 0 || gold - buycost < limit;
        if choice.kind == ChoiceKind::Attacker
            && !war_footing
            && buycost > build_shield_cost(&state.rules, target) * 2
        {
            continue;
        }

        let grave = c.ai.grave_danger > 0 && c.ai.defense == 0;
        if gold - expenses >= buycost
            && (!expensive || grave || (want > config.very_high_want && urgency > 1))
        {
            buy(state, player, city, want);
        } else if grave && choice.kind == ChoiceKind::Defender {
            warn!(player = %player, city = %c.name, cost = buycost, gold, "cannot afford a defender");
            try_to_sell_stuff(state, player, city);
            let gold = state.player(player).map_or(0, |p| p.gold);
            let bought = gold - expenses >= buycost && buy(state, player, city, want);
            if !bought {
                state.notify_player(player, Event::GoldShortfall { player, wanted: buycost });
            }
            data.maxbuycost = data.maxbuycost.max(buycost);
        } else {
            data.maxbuycost = data.maxbuycost.max(buycost);
        }
    }

    if !war_footing {
        for city in cities {
            let limit = ai_gold_reserve(state, player, data);
            ai_upgrade_units(state, city, limit, false, data);
        }
    }
}
