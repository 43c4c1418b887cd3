//! Tax, luxury and science rates.

use statecraft_core::{
    compute_city_state, is_in_anarchy, player_bonus, set_tax_rates, EffectType, GameState,
    Handicap, TaxRates,
};
use statecraft_protocol::PlayerId;
use tracing::debug;

use crate::data::AiData;
use crate::spend::ai_gold_reserve;

const RATE_STEP: i32 = 10;

/// What the empire would look like at some rates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RateOutcome {
    net_gold: i32,
    /// Cities big enough to celebrate that would be happy.
    celebrating: usize,
    celebrate_candidates: usize,
}

fn evaluate_rates(state: &mut GameState, player: PlayerId, rates: TaxRates) -> RateOutcome {
    let Some(p) = state.player_mut(player) else {
        return RateOutcome::default();
    };
    let saved = p.rates;
    p.rates = rates;

    let celebrate_size = state.rules.game.celebrate_size;
    let mut outcome = RateOutcome::default();
    for city in state.player_cities(player) {
        let (Some(c), Some(cs)) = (state.city(city), compute_city_state(state, city, None)) else {
            continue;
        };
        outcome.net_gold += cs.surplus.gold;
        if c.size >= celebrate_size {
            outcome.celebrate_candidates += 1;
            if cs.citizens.happy >= (c.size + 1) / 2 && cs.citizens.unhappy == 0 && cs.citizens.angry == 0 {
                outcome.celebrating += 1;
            }
        }
    }

    if let Some(p) = state.player_mut(player) {
        p.rates = saved;
    }
    outcome
}

/// Pick rates for this turn.
///
/// Tax is the lowest step that keeps income non-negative and the treasury
/// at the reserve. When celebrating pays, luxury is raised until every
/// large city celebrates. Science takes the rest.
pub fn ai_manage_taxes(state: &mut GameState, player: PlayerId, data: &AiData) -> Option<TaxRates> {
    let p = state.player(player)?;
    if p.handicaps.has(Handicap::Rates) || is_in_anarchy(state, player) {
        return None;
    }
    let gold = p.gold;
    let max_rate = player_bonus(state, player, EffectType::MaxRates).clamp(0, 100);
    let reserve = ai_gold_reserve(state, player, data);

    let split = |tax: i32, lux: i32| {
        let sci = (100 - tax - lux).min(max_rate);
        TaxRates::new(tax, 100 - tax - sci, sci)
    };

    let mut tax = max_rate;
    let mut step = 0;
    while step <= max_rate {
        let outcome = evaluate_rates(state, player, split(step, 0));
        if outcome.net_gold >= 0 && gold + outcome.net_gold >= reserve {
            tax = step;
            break;
        }
        step += RATE_STEP;
    }

    let mut lux = 0;
    if data.wants_celebration {
        let mut trial = RATE_STEP;
        while tax + trial <= 100 {
            let outcome = evaluate_rates(state, player, split(tax, trial));
            if outcome.celebrate_candidates > 0 && outcome.celebrating == outcome.celebrate_candidates {
                lux = trial;
                break;
            }
            trial += RATE_STEP;
        }
    }

    let rates = split(tax, lux);
    debug!(player = %player, tax = rates.tax, lux = rates.lux, sci = rates.sci, reserve, "rates chosen");
    Some(set_tax_rates(state, player, rates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    fn setup(gold: i32) -> (GameState, PlayerId) {
        let mut state = testkit::state(12, 12);
        let p = state.add_player("A", true);
        let city = testkit::found_city(&mut state, p, 5, 5);
        testkit::set_size(&mut state, city, 4);
        state.player_mut(p).unwrap().gold = gold;
        (state, p)
    }

    #[test]
    fn rich_empire_funds_science() {
        let (mut state, p) = setup(1000);
        let rates = ai_manage_taxes(&mut state, p, &AiData::default()).unwrap();
        assert_eq!(rates.sci, 60);
        assert_eq!(rates.tax + rates.lux + rates.sci, 100);
        assert_eq!(state.player(p).unwrap().rates, rates);
    }

    #[test]
    fn reserve_pushes_taxes_up() {
        let (mut state, p) = setup(0);
        let data = AiData {
            maxbuycost: 1_000_000,
            ..AiData::default()
        };
        let rates = ai_manage_taxes(&mut state, p, &data).unwrap();
        assert_eq!(rates.tax, 60);
    }

    #[test]
    fn handicapped_player_keeps_rates() {
        let (mut state, p) = setup(0);
        let before = state.player(p).unwrap().rates;
        {
            let player = state.player_mut(p).unwrap();
            player.handicaps = player.handicaps.with(Handicap::Rates);
        }
        assert_eq!(ai_manage_taxes(&mut state, p, &AiData::default()), None);
        assert_eq!(state.player(p).unwrap().rates, before);
    }
}
