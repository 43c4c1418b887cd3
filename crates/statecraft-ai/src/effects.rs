//! Effect valuation: what one ruleset effect is worth to one city.
//!
//! Each effect type has its own evaluator in [`EffectRegistry`]. An
//! evaluator takes the running want `v` and returns the adjusted want. The
//! numbers are guesses tuned against play, not derived from anything.

use std::collections::HashMap;

use statecraft_core::{
    city_size_max, player_bonus, total_bulbs_required, Effect, EffectType, GameState,
    ReqSource, UnitClass,
};
use statecraft_protocol::{BuildingId, CityId, PlayerId};
use tracing::debug;

use crate::config::AiConfig;
use crate::data::AiData;

/// Everything an evaluator may look at.
pub struct EffectContext<'a> {
    pub state: &'a GameState,
    pub data: &'a AiData,
    pub config: &'a AiConfig,
    pub player: PlayerId,
    pub city: CityId,
    pub building: BuildingId,
    pub effect: &'a Effect,
    /// The city being evaluated is the capital.
    pub capital: bool,
    /// Cities the effect reaches from where it would be built.
    pub affected_cities: i32,
    /// Live players in the game, barbarians excluded.
    pub nplayers: i32,
}

impl<'a> EffectContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: &'a GameState,
        data: &'a AiData,
        config: &'a AiConfig,
        city: CityId,
        building: BuildingId,
        effect: &'a Effect,
        affected_cities: i32,
    ) -> Option<Self> {
        let player = state.city(city)?.owner;
        let nplayers = state
            .players
            .iter()
            .filter(|p| p.is_alive && !p.barbarian)
            .count() as i32;
        Some(Self {
            state,
            data,
            config,
            player,
            city,
            building,
            effect,
            capital: state.capital(player) == Some(city),
            affected_cities,
            nplayers,
        })
    }

    fn amount(&self) -> i32 {
        self.effect.amount
    }

    /// Unit class the effect is restricted to, if any.
    fn unit_class(&self) -> Option<UnitClass> {
        self.effect.reqs.iter().find_map(|r| match r.source {
            ReqSource::UnitClass(class) if r.present => Some(class),
            _ => None,
        })
    }

    /// Our units the effect would touch.
    fn affected_units(&self) -> i32 {
        match self.unit_class() {
            Some(class) => self.data.stats.units_of_class(class),
            None => self.data.stats.total_units(),
        }
    }

    fn continent_threatened(&self) -> bool {
        self.state.city(self.city).is_some_and(|c| {
            self.data
                .threats
                .continents
                .contains(&self.state.map.continent(c.tile))
        })
    }

    fn coastal(&self) -> bool {
        self.state
            .city(self.city)
            .is_some_and(|c| self.state.map.is_coastal(c.tile, &self.state.rules))
    }
}

pub type EffectEvaluator = fn(&EffectContext<'_>, i32) -> i32;

/// Maps effect types to their evaluators.
#[derive(Clone, Debug)]
pub struct EffectRegistry {
    evaluators: HashMap<EffectType, EffectEvaluator>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl EffectRegistry {
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// Every effect type the classic rules use.
    pub fn standard() -> Self {
        use EffectType::*;

        let mut registry = Self::empty();
        // Already reflected in the city's outputs when the building is
        // installed for evaluation.
        for kind in [
            OutputAdd,
            OutputBonus,
            OutputPerTile,
            OutputIncTile,
            OutputPenaltyTile,
            OutputWaste,
            OutputWastePct,
            OutputWasteByDistance,
            UpkeepFactor,
            UnitUpkeepFreePerCity,
            UpkeepFree,
            PolluProdPct,
            PolluPopPct,
            CapitalCity,
            EmpireBase,
            EmpireStep,
            CityUnhappysize,
            UnhappyFactor,
            MaxRates,
            HealthPct,
            SlowDownTimeline,
        ] {
            registry.register(kind, unchanged);
        }
        registry.register(MakeHappy, make_happy);
        registry.register(ForceContent, make_happy);
        registry.register(NoUnhappy, no_unhappy);
        registry.register(MakeContent, make_content);
        registry.register(MakeContentMil, make_content_mil);
        registry.register(MakeContentMilPer, make_content_mil);
        registry.register(GrowthFood, growth_food);
        registry.register(SizeAdj, size_adj);
        registry.register(SizeUnlimit, size_adj);
        registry.register(RaptureGrow, rapture_grow);
        registry.register(NoIllness, no_illness);
        registry.register(UpgradeUnit, upgrade_unit);
        registry.register(NoSinkDeep, no_sink_deep);
        registry.register(MoveBonus, move_bonus);
        registry.register(HpRegen, unit_recover);
        registry.register(UnitRecover, unit_recover);
        registry.register(VeteranBuild, veteran_build);
        registry.register(Vision, vision);
        registry.register(DefendBonus, defend_bonus);
        registry.register(SpyResistant, spy_resistant);
        registry.register(EnableNuke, enable_nuke);
        registry.register(EnableSpace, enable_space);
        registry.register(GainAiLove, gain_ai_love);
        registry.register(RevealMap, reveal_map);
        registry.register(HaveEmbassies, have_embassies);
        registry.register(RevealCities, reveal_cities);
        registry.register(GiveImmTech, give_imm_tech);
        registry.register(TechParasite, tech_parasite);
        registry.register(TradeRevenueBonus, trade_revenue_bonus);
        registry.register(RevolutionWhenUnhappy, revolution_when_unhappy);
        registry
    }

    pub fn register(&mut self, kind: EffectType, evaluator: EffectEvaluator) {
        self.evaluators.insert(kind, evaluator);
    }

    pub fn contains(&self, kind: EffectType) -> bool {
        self.evaluators.contains_key(&kind)
    }

    /// Adjust `v` for the effect in `ctx`.
    pub fn value(&self, ctx: &EffectContext<'_>, v: i32) -> i32 {
        match self.evaluators.get(&ctx.effect.kind) {
            Some(evaluate) => evaluate(ctx, v),
            None => {
                debug!(kind = ?ctx.effect.kind, "no evaluator for effect");
                v
            }
        }
    }
}

fn unchanged(_: &EffectContext<'_>, v: i32) -> i32 {
    v
}

// Happiness

fn make_happy(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let amount = ctx.amount();
    let content = player_bonus(ctx.state, ctx.player, EffectType::MakeContent);
    v + (content + amount) * ctx.affected_cities + amount.min(5) * ctx.affected_cities
}

fn no_unhappy(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let content = player_bonus(ctx.state, ctx.player, EffectType::MakeContent);
    v + (content + 4) * ctx.affected_cities
}

fn make_content(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let amount = ctx.amount();
    let Some(city) = ctx.state.city(ctx.city) else {
        return v;
    };
    let unhappy = (city.citizens.unhappy + city.citizens.angry + city.specialists.entertainers) as i32;
    let mut factor = 2;
    let base = player_bonus(ctx.state, ctx.player, EffectType::EmpireBase);
    let step = player_bonus(ctx.state, ctx.player, EffectType::EmpireStep);
    if ctx.data.stats.cities > base {
        if base > 0 {
            factor += ctx.data.stats.cities / step.max(1);
        }
        factor += 2;
    }
    v + amount.min(unhappy) * 35 + factor * ctx.affected_cities * amount
}

fn make_content_mil(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let amount = ctx.amount();
    let unit_unhappy: i32 = ctx
        .state
        .supported_units(ctx.city)
        .into_iter()
        .filter_map(|u| ctx.state.units.get(u))
        .map(|u| u.unhappy)
        .sum();
    v + unit_unhappy.min(amount) * 25 + amount.min(5) * ctx.affected_cities
}

// Growth

fn growth_food(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let surplus = ctx.state.city(ctx.city).map_or(0, |c| c.surplus.food);
    v + 4 * ctx.affected_cities + (ctx.amount() / 7) * surplus
}

fn size_adj(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let Some(city) = ctx.state.city(ctx.city) else {
        return v;
    };
    let amount = ctx.amount();
    if city.size.saturating_add(1) > city_size_max(ctx.state, ctx.city) {
        v + city.surplus.food * ctx.data.priorities.food * amount
    } else {
        v + ctx.affected_cities * amount / 4
    }
}

fn rapture_grow(ctx: &EffectContext<'_>, v: i32) -> i32 {
    if ctx.data.wants_celebration {
        v + 10 * ctx.affected_cities
    } else {
        v
    }
}

fn no_illness(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 5 * ctx.affected_cities
}

// Military

fn upgrade_unit(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let per_unit = match ctx.amount() {
        1 => 2,
        2 => 3,
        _ => 4,
    };
    v + ctx.data.stats.upgradeable * per_unit
}

fn no_sink_deep(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 15 + ctx.data.stats.sea_units * 5
}

// Scales with `v` itself. Saturating so a large running want cannot wrap.
fn move_bonus(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let num = ctx.affected_units();
    v.saturating_add(8i32.saturating_mul(v).saturating_mul(ctx.amount()))
        .saturating_add(num)
}

fn unit_recover(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 5 * ctx.affected_cities + ctx.affected_units()
}

fn veteran_build(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 3 * ctx.affected_units() * ctx.amount()
}

fn vision(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + ctx.affected_cities * ctx.amount()
}

fn defend_bonus(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let amount = ctx.amount();
    let threats = &ctx.data.threats;
    let threatened = match ctx.unit_class() {
        Some(UnitClass::Land) | None => ctx.continent_threatened(),
        Some(UnitClass::Sea) => threats.sea && ctx.coastal(),
        Some(UnitClass::Air) | Some(UnitClass::Missile) => threats.missile,
    };
    let mut v = v + if threatened { amount / 5 } else { amount / 20 };
    let invasions = i32::from(threats.invasions);
    v += (amount / 20 + invasions - 1) * ctx.affected_cities;
    if ctx.capital && threats.invasions {
        v += amount;
    }
    v
}

fn spy_resistant(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 5 * ctx.affected_cities
}

// Empire

fn enable_nuke(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let mut v = v + 20 + ctx.data.stats.missile_units * 5;
    if ctx.data.standing.production_leader {
        v += 100;
    }
    v
}

fn enable_space(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let mut v = v + 5;
    if ctx.data.standing.production_leader {
        v += 100;
    }
    v
}

fn gain_ai_love(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let amount = ctx.amount();
    ctx.state
        .players
        .iter()
        .filter(|p| p.id != ctx.player && p.is_alive && p.ai_control)
        .fold(v, |v, p| {
            if ctx.state.diplomacy.at_war(ctx.player, p.id) {
                v + amount / 10
            } else {
                v + amount / 20
            }
        })
}

fn reveal_map(_: &EffectContext<'_>, v: i32) -> i32 {
    v + 10
}

fn have_embassies(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 5 * ctx.nplayers
}

fn reveal_cities(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + 2 * ctx.nplayers
}

fn give_imm_tech(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + ctx.amount() * (ctx.state.rules.game.sciencebox + 1)
}

fn tech_parasite(ctx: &EffectContext<'_>, v: i32) -> i32 {
    let amount = ctx.amount();
    if ctx.nplayers <= amount {
        return v;
    }
    let bulbs = ctx
        .state
        .player(ctx.player)
        .and_then(|p| p.research.researching)
        .map_or(0, |t| total_bulbs_required(ctx.state, t));
    let value = bulbs * (ctx.nplayers - amount) / ctx.nplayers;
    v + value / 4
}

fn trade_revenue_bonus(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v + ctx.amount() / 10 * ctx.affected_cities
}

fn revolution_when_unhappy(ctx: &EffectContext<'_>, v: i32) -> i32 {
    v - 5 * ctx.amount()
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::testkit;

    fn effect_of(state: &GameState, building: &str, kind: EffectType) -> (BuildingId, Effect) {
        let b = state.rules.building_id(building).unwrap();
        let e = state
            .rules
            .effects_of_building(b)
            .find(|e| e.kind == kind)
            .unwrap()
            .clone();
        (b, e)
    }

    #[test]
    fn every_effect_type_has_an_evaluator() {
        let state = testkit::state(4, 4);
        let registry = EffectRegistry::standard();
        for e in &state.rules.effects {
            assert!(registry.contains(e.kind), "{:?}", e.kind);
        }
    }

    #[test]
    fn city_walls_are_worth_more_under_threat() {
        let mut state = testkit::state(12, 12);
        let a = state.add_player("A", true);
        let b = state.add_player("B", true);
        let city = testkit::found_city(&mut state, a, 3, 3);
        let (walls, effect) = effect_of(&state, "city_walls", EffectType::DefendBonus);
        let config = AiConfig::default();
        let registry = EffectRegistry::standard();

        let mut data = AiData::default();
        crate::data::ai_data_phase_init(&state, a, &mut data, &config);
        let ctx = EffectContext::new(&state, &data, &config, city, walls, &effect, 1).unwrap();
        let calm = registry.value(&ctx, 0);

        testkit::spawn_unit(&mut state, b, "archers", None, 5, 5);
        state.diplomacy.set_war(a, b, true);
        crate::data::ai_data_phase_init(&state, a, &mut data, &config);
        let ctx = EffectContext::new(&state, &data, &config, city, walls, &effect, 1).unwrap();
        let threatened = registry.value(&ctx, 0);
        assert!(threatened > calm, "{threatened} <= {calm}");
    }

    #[test]
    fn move_bonus_feeds_on_running_want() {
        let mut state = testkit::state(8, 8);
        let a = state.add_player("A", true);
        let city = testkit::found_city(&mut state, a, 3, 3);
        let (magellan, effect) = effect_of(&state, "magellans_expedition", EffectType::MoveBonus);
        let config = AiConfig::default();
        let data = AiData::default();
        let ctx = EffectContext::new(&state, &data, &config, city, magellan, &effect, 1).unwrap();
        let registry = EffectRegistry::standard();
        assert_eq!(registry.value(&ctx, 0), 0);
        assert_eq!(registry.value(&ctx, 10), 10 + 8 * 10 * effect.amount);
        assert_eq!(registry.value(&ctx, i32::MAX), i32::MAX);
    }

    #[test]
    fn unknown_effect_type_keeps_want() {
        let mut state = testkit::state(8, 8);
        let a = state.add_player("A", true);
        let city = testkit::found_city(&mut state, a, 3, 3);
        let (temple, effect) = effect_of(&state, "temple", EffectType::MakeContent);
        let config = AiConfig::default();
        let data = AiData::default();
        let ctx = EffectContext::new(&state, &data, &config, city, temple, &effect, 1).unwrap();
        assert_eq!(EffectRegistry::empty().value(&ctx, 42), 42);
        assert!(EffectRegistry::standard().value(&ctx, 42) > 42);
    }
}
