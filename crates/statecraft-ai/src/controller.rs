use std::collections::BTreeMap;

use statecraft_core::{
    can_city_build_now, change_build_target, resolve_city_emergency, worklist_is_empty,
    DefaultAdvisor, GameState, ProductionAdvisor, TurnAgent,
};
use statecraft_protocol::{BuildTarget, CityId, PlayerId};
use tracing::{debug, warn};

use crate::buildings::ai_manage_buildings;
use crate::config::AiConfig;
use crate::data::{ai_data_phase_init, AiData};
use crate::domestic::{ai_help_wonders, city_settler_want, domestic_advisor_choose_build};
use crate::effects::EffectRegistry;
use crate::government::ai_manage_government;
use crate::military::{assess_danger, military_advisor_choose_build};
use crate::spend::ai_spend_gold;
use crate::taxes::ai_manage_taxes;
use crate::tech::ai_manage_tech;

/// Runs every computer player's phase and advises their cities'
/// production. Per-player memory survives between turns.
pub struct AiController {
    config: AiConfig,
    registry: EffectRegistry,
    players: BTreeMap<PlayerId, AiData>,
}

impl AiController {
    pub fn new(config: AiConfig) -> Self {
        Self::with_registry(config, EffectRegistry::standard())
    }

    pub fn with_registry(config: AiConfig, registry: EffectRegistry) -> Self {
        Self {
            config,
            registry,
            players: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn data(&self, player: PlayerId) -> Option<&AiData> {
        self.players.get(&player)
    }
}

impl Default for AiController {
    fn default() -> Self {
        Self::new(AiConfig::default())
    }
}

/// A city keeps building a great wonder once it is the wonder city's job.
fn keeps_wonder(state: &GameState, city: CityId, data: &AiData) -> bool {
    data.wonder_city == Some(city)
        && state.city(city).is_some_and(|c| {
            matches!(c.currently_building, BuildTarget::Improvement(b) if state.rules.is_great_wonder(b))
        })
}

fn choose_city_production(state: &mut GameState, city: CityId, data: &AiData, config: &AiConfig) {
    let settler_want = city_settler_want(state, city, data, config);
    if let Some(c) = state.city_mut(city) {
        c.ai.settler_want = settler_want;
    }

    let mut choice = domestic_advisor_choose_build(state, city, data, config);
    choice.copy_if_better(&military_advisor_choose_build(state, city, config));
    let Some(c) = state.city_mut(city) else {
        return;
    };
    c.ai.choice = choice;
    let current = c.currently_building;
    let busy = !worklist_is_empty(state, city);

    let Some(target) = choice.target else {
        return;
    };
    if target == current || busy || keeps_wonder(state, city, data) {
        return;
    }
    if can_city_build_now(state, city, target) {
        change_build_target(state, city, target);
    }
}

impl TurnAgent for AiController {
    fn player_phase(&mut self, state: &mut GameState, player: PlayerId) {
        let Self {
            config,
            registry,
            players,
        } = self;
        let data = players.entry(player).or_default();

        ai_data_phase_init(state, player, data, config);

        let cities = state.player_cities(player);
        for &city in &cities {
            if state.city(city).is_some_and(|c| c.is_emergency()) && !resolve_city_emergency(state, city) {
                warn!(player = %player, ?city, "emergency persists into production");
            }
            assess_danger(state, city, config);
        }

        ai_manage_buildings(state, player, data, config, registry);
        for &city in &cities {
            choose_city_production(state, city, data, config);
        }
        ai_help_wonders(state, player, data);

        ai_manage_government(state, player, data);
        ai_manage_tech(state, player, data);
        ai_manage_taxes(state, player, data);
        ai_spend_gold(state, player, data, config);
        debug!(player = %player, maxbuycost = data.maxbuycost, wonder_city = ?data.wonder_city, "ai phase done");
    }

    fn human_phase(&mut self, state: &mut GameState, player: PlayerId) {
        let Self {
            config,
            registry,
            players,
        } = self;
        let data = players.entry(player).or_default();
        ai_manage_buildings(state, player, data, config, registry);
    }
}

impl ProductionAdvisor for AiController {
    fn choose_build(&self, state: &GameState, city: CityId) -> Option<BuildTarget> {
        let c = state.city(city)?;
        let choice = c.ai.choice;
        choice
            .target
            .filter(|&t| choice.want > 0 && can_city_build_now(state, city, t))
            .or_else(|| DefaultAdvisor.choose_build(state, city))
    }
}
