//! Requirement evaluation and effect sums against the live game state.
//!
//! A requirement is checked against a [`ReqContext`]: whatever parts of the
//! target are known (player, city, tile, unit type). Parts the context does
//! not supply make the answer unknown, which [`ReqProbe`] resolves either
//! optimistically or pessimistically.

use statecraft_protocol::{BuildingId, CityId, OutputType, PlayerId, UnitTypeId};

use crate::game::GameState;
use crate::rules::{CompiledRequirement, EffectType, ReqRange, ReqSource, TerrainClass};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReqContext {
    pub player: Option<PlayerId>,
    pub city: Option<CityId>,
    pub tile: Option<usize>,
    pub unit_type: Option<UnitTypeId>,
}

impl ReqContext {
    pub fn player(player: PlayerId) -> Self {
        Self {
            player: Some(player),
            ..Self::default()
        }
    }

    /// Player, city and city-center tile of `city`.
    pub fn city(state: &GameState, city: CityId) -> Self {
        match state.city(city) {
            Some(c) => Self {
                player: Some(c.owner),
                city: Some(city),
                tile: Some(c.tile),
                unit_type: None,
            },
            None => Self::default(),
        }
    }

    pub fn with_tile(mut self, tile: usize) -> Self {
        self.tile = Some(tile);
        self
    }

    pub fn with_unit_type(mut self, unit_type: UnitTypeId) -> Self {
        self.unit_type = Some(unit_type);
        self
    }
}

/// How to treat a requirement the context cannot decide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReqProbe {
    /// Unknown counts as unmet.
    Certain,
    /// Unknown counts as met.
    Possible,
}

/// A building stops working once its owner knows the obsoleting tech.
pub fn improvement_obsolete(state: &GameState, player: PlayerId, building: BuildingId) -> bool {
    let Some(tech) = state.rules.building(building).obsolete_by else {
        return false;
    };
    state.player(player).is_some_and(|p| p.knows(tech))
}

fn player_has_building(state: &GameState, player: PlayerId, building: BuildingId) -> bool {
    if improvement_obsolete(state, player, building) {
        return false;
    }
    if state.rules.is_great_wonder(building) {
        return state.great_wonder_owner(building) == Some(player);
    }
    if state.rules.is_small_wonder(building) {
        return state.small_wonder_city(player, building).is_some();
    }
    state
        .cities
        .iter_ordered()
        .any(|(_, c)| c.owner == player && c.has_building(building))
}

fn building_on_continent(
    state: &GameState,
    player: PlayerId,
    tile: usize,
    building: BuildingId,
) -> bool {
    if improvement_obsolete(state, player, building) {
        return false;
    }
    let continent = state.map.continent(tile);
    state.cities.iter_ordered().any(|(_, c)| {
        c.owner == player && state.map.continent(c.tile) == continent && c.has_building(building)
    })
}

fn building_in_world(state: &GameState, building: BuildingId) -> bool {
    if state.rules.is_great_wonder(building) {
        return state
            .great_wonder_owner(building)
            .is_some_and(|owner| !improvement_obsolete(state, owner, building));
    }
    state
        .cities
        .iter_ordered()
        .any(|(_, c)| c.has_building(building) && !improvement_obsolete(state, c.owner, building))
}

/// `Some(met)` when the context decides the (un-negated) requirement.
fn evaluate(state: &GameState, ctx: &ReqContext, req: &CompiledRequirement) -> Option<bool> {
    match req.source {
        ReqSource::Tech(tech) => match req.range {
            ReqRange::World => Some(state.players.iter().any(|p| p.knows(tech))),
            _ => Some(state.player(ctx.player?)?.knows(tech)),
        },
        ReqSource::Building(building) => match req.range {
            ReqRange::Local | ReqRange::City => {
                let city = state.city(ctx.city?)?;
                Some(city.has_building(building) && !improvement_obsolete(state, city.owner, building))
            }
            ReqRange::Continent => {
                Some(building_on_continent(state, ctx.player?, ctx.tile?, building))
            }
            ReqRange::Player => Some(player_has_building(state, ctx.player?, building)),
            ReqRange::World => Some(building_in_world(state, building)),
        },
        ReqSource::Gov(gov) => Some(state.player(ctx.player?)?.government == gov),
        ReqSource::MinSize(size) => Some(state.city(ctx.city?)?.size >= size),
        ReqSource::Coastal => {
            let city = state.city(ctx.city?)?;
            Some(state.map.is_coastal(city.tile, &state.rules))
        }
        ReqSource::TerrainClass(class) => {
            let ocean = state.map.is_ocean(ctx.tile?, &state.rules);
            Some(ocean == (class == TerrainClass::Ocean))
        }
        ReqSource::UnitClass(class) => Some(state.rules.unit_type(ctx.unit_type?).class == class),
        ReqSource::UnitFlag(flag) => Some(state.rules.unit_type(ctx.unit_type?).has_flag(flag)),
        ReqSource::Never => Some(false),
    }
}

pub fn is_req_active(
    state: &GameState,
    ctx: &ReqContext,
    req: &CompiledRequirement,
    probe: ReqProbe,
) -> bool {
    match evaluate(state, ctx, req) {
        Some(met) => met == req.present,
        None => probe == ReqProbe::Possible,
    }
}

pub fn are_reqs_active(
    state: &GameState,
    ctx: &ReqContext,
    reqs: &[CompiledRequirement],
    probe: ReqProbe,
) -> bool {
    reqs.iter().all(|r| is_req_active(state, ctx, r, probe))
}

// ============================================================================
// EFFECT SUMS
// ============================================================================

/// Sum of every `kind` effect active for `ctx`. With `output`, only effects
/// for that output (or for any output) count.
pub fn effect_total(
    state: &GameState,
    ctx: &ReqContext,
    kind: EffectType,
    output: Option<OutputType>,
) -> i32 {
    state
        .rules
        .effects_of_type(kind)
        .filter(|e| output.map_or(true, |o| e.applies_to_output(o)))
        .filter(|e| are_reqs_active(state, ctx, &e.reqs, ReqProbe::Certain))
        .map(|e| e.amount)
        .sum()
}

pub fn city_bonus(state: &GameState, city: CityId, kind: EffectType) -> i32 {
    effect_total(state, &ReqContext::city(state, city), kind, None)
}

pub fn city_output_bonus(
    state: &GameState,
    city: CityId,
    kind: EffectType,
    output: OutputType,
) -> i32 {
    effect_total(state, &ReqContext::city(state, city), kind, Some(output))
}

pub fn tile_output_bonus(
    state: &GameState,
    city: CityId,
    tile: usize,
    kind: EffectType,
    output: OutputType,
) -> i32 {
    let ctx = ReqContext::city(state, city).with_tile(tile);
    effect_total(state, &ctx, kind, Some(output))
}

pub fn player_bonus(state: &GameState, player: PlayerId, kind: EffectType) -> i32 {
    effect_total(state, &ReqContext::player(player), kind, None)
}

/// Effects on units of `unit_type` built in or supported by `city`.
pub fn unittype_bonus(
    state: &GameState,
    player: PlayerId,
    city: Option<CityId>,
    unit_type: UnitTypeId,
    kind: EffectType,
) -> i32 {
    let ctx = match city {
        Some(city) => ReqContext::city(state, city),
        None => ReqContext::player(player),
    }
    .with_unit_type(unit_type);
    effect_total(state, &ctx, kind, None)
}

pub fn world_bonus(state: &GameState, kind: EffectType) -> i32 {
    effect_total(state, &ReqContext::default(), kind, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn negated_unknown_follows_probe() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let temple = state.rules.building_id("temple").unwrap();
        let req = CompiledRequirement {
            source: ReqSource::Building(temple),
            range: ReqRange::City,
            present: false,
        };
        let ctx = ReqContext::player(p);
        assert!(is_req_active(&state, &ctx, &req, ReqProbe::Possible));
        assert!(!is_req_active(&state, &ctx, &req, ReqProbe::Certain));
    }

    #[test]
    fn temple_content_grows_with_mysticism() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let temple = state.rules.building_id("temple").unwrap();
        testkit::give_building(&mut state, city, temple);
        assert_eq!(city_bonus(&state, city, EffectType::MakeContent), 1);
        testkit::give_tech(&mut state, p, "mysticism");
        assert_eq!(city_bonus(&state, city, EffectType::MakeContent), 2);
    }

    #[test]
    fn obsolete_building_is_inactive_everywhere() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let barracks = state.rules.building_id("barracks").unwrap();
        let warriors = state.rules.unit_type_id("warriors").unwrap();
        testkit::give_building(&mut state, city, barracks);
        assert_eq!(
            unittype_bonus(&state, p, Some(city), warriors, EffectType::VeteranBuild),
            1
        );
        testkit::give_tech(&mut state, p, "gunpowder");
        assert!(improvement_obsolete(&state, p, barracks));
        assert_eq!(
            unittype_bonus(&state, p, Some(city), warriors, EffectType::VeteranBuild),
            0
        );
    }

    #[test]
    fn government_effects_follow_government() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        assert_eq!(player_bonus(&state, p, EffectType::MaxRates), 60);
        let monarchy = state.rules.government_id("monarchy").unwrap();
        state.players[p.index()].government = monarchy;
        assert_eq!(player_bonus(&state, p, EffectType::MaxRates), 70);
    }
}
