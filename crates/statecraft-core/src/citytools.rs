//! Queries and mutations on single cities: what they can build, what it
//! costs, buying and selling, size changes, founding and removal.

use statecraft_protocol::{
    Audience, BuildTarget, BuildingId, CityId, Event, Hex, PlayerId, UnitId, UnitTypeId,
};
use tracing::{debug, info};

use crate::city::City;
use crate::cityrefresh::city_refresh;
use crate::cm::{auto_arrange_workers, GreedyGovernor};
use crate::effects::{
    are_reqs_active, city_bonus, improvement_obsolete, is_req_active, world_bonus,
    ReqContext, ReqProbe,
};
use crate::error::GameError;
use crate::game::{GameState, WonderSlot};
use crate::rules::{
    BuildingFlag, BuildingGenus, CompiledRules, EffectType, ReqSource, SpacePart, UnitClass,
    UnitFlag,
};

/// Cities must be at least this far apart.
pub const CITY_MIN_DISTANCE: i32 = 2;

// ============================================================================
// BUILDABILITY
// ============================================================================

/// Great wonder not yet built or destroyed anywhere.
pub fn great_wonder_is_available(state: &GameState, building: BuildingId) -> bool {
    matches!(
        state.great_wonders.get(building.index()),
        Some(WonderSlot::Available)
    )
}

fn is_capital_building(rules: &CompiledRules, building: BuildingId) -> bool {
    rules
        .effects_of_building(building)
        .any(|e| e.kind == EffectType::CapitalCity)
}

fn wonder_blocked(state: &GameState, player: PlayerId, building: BuildingId) -> bool {
    match state.rules.building(building).genus {
        BuildingGenus::GreatWonder => !great_wonder_is_available(state, building),
        // A palace may be rebuilt to move the capital.
        BuildingGenus::SmallWonder => {
            state.small_wonder_city(player, building).is_some()
                && !is_capital_building(&state.rules, building)
        }
        _ => false,
    }
}

fn space_part_blocked(state: &GameState, building: BuildingId) -> bool {
    state.rules.building(building).space_part.is_some()
        && world_bonus(state, EffectType::EnableSpace) <= 0
}

/// Could the player build this some day, once techs are known?
pub fn can_player_build_improvement_later(
    state: &GameState,
    player: PlayerId,
    building: BuildingId,
) -> bool {
    if improvement_obsolete(state, player, building) || wonder_blocked(state, player, building) {
        return false;
    }
    state
        .rules
        .building(building)
        .reqs
        .iter()
        .all(|r| !matches!(r.source, ReqSource::Never) || !r.present)
}

pub fn can_city_build_improvement_direct(
    state: &GameState,
    city: CityId,
    building: BuildingId,
) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if c.has_building(building) {
        return false;
    }
    if improvement_obsolete(state, c.owner, building)
        || wonder_blocked(state, c.owner, building)
        || space_part_blocked(state, building)
    {
        return false;
    }
    let ctx = ReqContext::city(state, city);
    are_reqs_active(state, &ctx, &state.rules.building(building).reqs, ReqProbe::Certain)
}

pub fn can_city_build_improvement_now(state: &GameState, city: CityId, building: BuildingId) -> bool {
    can_city_build_improvement_direct(state, city, building)
}

/// Buildable here once missing techs or buildings arrive. Requirements
/// tied to the site itself must already hold.
pub fn can_city_build_improvement_later(
    state: &GameState,
    city: CityId,
    building: BuildingId,
) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if c.has_building(building) || !can_player_build_improvement_later(state, c.owner, building) {
        return false;
    }
    let ctx = ReqContext::city(state, city);
    state.rules.building(building).reqs.iter().all(|r| match r.source {
        ReqSource::Coastal | ReqSource::TerrainClass(_) => {
            is_req_active(state, &ctx, r, ReqProbe::Certain)
        }
        _ => true,
    })
}

/// Unit buildable by the player's technology and flags, ignoring the site.
pub fn can_player_build_unit_direct(state: &GameState, player: PlayerId, unit_type: UnitTypeId) -> bool {
    let Some(p) = state.player(player) else {
        return false;
    };
    let t = state.rules.unit_type(unit_type);
    if t.has_flag(UnitFlag::NoBuild) {
        return false;
    }
    if t.has_flag(UnitFlag::BarbarianOnly) && !p.barbarian {
        return false;
    }
    if t.has_flag(UnitFlag::Nuclear) && world_bonus(state, EffectType::EnableNuke) <= 0 {
        return false;
    }
    if t.has_flag(UnitFlag::Unique) && state.unit_type_count(player, unit_type) > 0 {
        return false;
    }
    // Barbarians build without knowing the tech.
    p.barbarian || t.tech_req.map_or(true, |tech| p.knows(tech))
}

pub fn can_city_build_unit_direct(state: &GameState, city: CityId, unit_type: UnitTypeId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if !can_player_build_unit_direct(state, c.owner, unit_type) {
        return false;
    }
    let t = state.rules.unit_type(unit_type);
    if let Some(b) = t.building_req {
        if !c.has_building(b) {
            return false;
        }
    }
    if t.class == UnitClass::Sea && !state.map.is_coastal(c.tile, &state.rules) {
        return false;
    }
    true
}

/// Direct, and not superseded by a unit the city can also build.
pub fn can_city_build_unit_now(state: &GameState, city: CityId, unit_type: UnitTypeId) -> bool {
    if !can_city_build_unit_direct(state, city, unit_type) {
        return false;
    }
    match state.rules.unit_type(unit_type).obsoleted_by {
        Some(next) => !can_city_build_unit_direct(state, city, next),
        None => true,
    }
}

pub fn can_city_build_unit_later(state: &GameState, city: CityId, unit_type: UnitTypeId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let t = state.rules.unit_type(unit_type);
    if t.has_flag(UnitFlag::NoBuild) {
        return false;
    }
    if t.class == UnitClass::Sea && !state.map.is_coastal(c.tile, &state.rules) {
        return false;
    }
    state.player(c.owner).is_some_and(|p| !t.has_flag(UnitFlag::BarbarianOnly) || p.barbarian)
}

pub fn can_city_build_now(state: &GameState, city: CityId, target: BuildTarget) -> bool {
    match target {
        BuildTarget::Improvement(b) => can_city_build_improvement_now(state, city, b),
        BuildTarget::Unit(u) => can_city_build_unit_now(state, city, u),
    }
}

/// The building in `city` that makes `building` pointless, if any.
pub fn improvement_redundant(state: &GameState, city: CityId, building: BuildingId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    state
        .rules
        .building(building)
        .replaced_by
        .is_some_and(|r| c.has_building(r) && !improvement_obsolete(state, c.owner, r))
}

/// Best unit with the given role the city can build right now.
pub fn best_role_unit(
    state: &GameState,
    city: CityId,
    wanted: impl Fn(&crate::rules::UnitType) -> bool,
) -> Option<UnitTypeId> {
    state
        .rules
        .unit_type_ids()
        .filter(|&u| wanted(state.rules.unit_type(u)))
        .filter(|&u| can_city_build_unit_now(state, city, u))
        .max_by_key(|&u| {
            let t = state.rules.unit_type(u);
            (t.defense.max(t.attack), -(u.index() as i32))
        })
}

pub fn best_defender_type(state: &GameState, city: CityId) -> Option<UnitTypeId> {
    state
        .rules
        .unit_type_ids()
        .filter(|&u| state.rules.unit_type(u).is_defender())
        .filter(|&u| can_city_build_unit_now(state, city, u))
        .max_by_key(|&u| {
            let t = state.rules.unit_type(u);
            (t.defense * t.hp * t.firepower, -(u.index() as i32))
        })
}

// ============================================================================
// COSTS
// ============================================================================

pub fn impr_build_shield_cost(rules: &CompiledRules, building: BuildingId) -> i32 {
    (rules.building(building).cost * rules.game.shieldbox / 100).max(1)
}

pub fn unit_build_shield_cost(rules: &CompiledRules, unit_type: UnitTypeId) -> i32 {
    (rules.unit_type(unit_type).cost * rules.game.shieldbox / 100).max(1)
}

pub fn build_shield_cost(rules: &CompiledRules, target: BuildTarget) -> i32 {
    match target {
        BuildTarget::Improvement(b) => impr_build_shield_cost(rules, b),
        BuildTarget::Unit(u) => unit_build_shield_cost(rules, u),
    }
}

fn buy_cost(missing: i32, shields_in_stock: i32) -> i32 {
    if missing <= 0 {
        return 0;
    }
    let mut cost = 2 * missing + missing * missing / 20;
    if shields_in_stock == 0 {
        cost *= 2;
    }
    cost
}

pub fn impr_buy_gold_cost(rules: &CompiledRules, building: BuildingId, shields_in_stock: i32) -> i32 {
    if rules.building(building).has_flag(BuildingFlag::Gold) {
        return 0;
    }
    let missing = impr_build_shield_cost(rules, building) - shields_in_stock;
    let mut cost = buy_cost(missing, shields_in_stock);
    if rules.is_great_wonder(building) {
        cost *= 2;
    }
    cost
}

pub fn unit_buy_gold_cost(rules: &CompiledRules, unit_type: UnitTypeId, shields_in_stock: i32) -> i32 {
    let missing = unit_build_shield_cost(rules, unit_type) - shields_in_stock;
    buy_cost(missing, shields_in_stock)
}

pub fn city_production_buy_gold_cost(state: &GameState, city: CityId) -> i32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    match c.currently_building {
        BuildTarget::Improvement(b) => impr_buy_gold_cost(&state.rules, b, c.shield_stock),
        BuildTarget::Unit(u) => unit_buy_gold_cost(&state.rules, u, c.shield_stock),
    }
}

pub fn impr_sell_gold(rules: &CompiledRules, building: BuildingId) -> i32 {
    impr_build_shield_cost(rules, building)
}

pub fn city_granary_size(state: &GameState, size: u32) -> i32 {
    state.rules.game.granary_size(size)
}

/// Largest size the city may reach with its current buildings.
pub fn city_size_max(state: &GameState, city: CityId) -> u32 {
    if city_bonus(state, city, EffectType::SizeUnlimit) > 0 {
        return u32::MAX;
    }
    city_bonus(state, city, EffectType::SizeAdj).max(1) as u32
}

/// The cheapest building that would raise the size limit of `city`.
pub fn size_limit_building(state: &GameState, city: CityId) -> Option<BuildingId> {
    let raises = |b: BuildingId| {
        state.rules.effects_of_building(b).any(|e| {
            matches!(e.kind, EffectType::SizeAdj | EffectType::SizeUnlimit) && e.amount > 0
        })
    };
    let c = state.city(city)?;
    state
        .rules
        .building_ids()
        .filter(|&b| !c.has_building(b) && raises(b))
        .min_by_key(|&b| state.rules.building(b).cost)
}

// ============================================================================
// IMPROVEMENTS
// ============================================================================

/// Install `building` in `city`, keeping wonder tables and the palace unique.
pub fn city_add_improvement(state: &mut GameState, city: CityId, building: BuildingId) {
    let Some(owner) = state.city(city).map(|c| c.owner) else {
        return;
    };
    let rules = state.rules.clone();
    if let Some(part) = rules.building(building).space_part {
        if let Some(p) = state.player_mut(owner) {
            match part {
                SpacePart::Structural => p.spaceship.structurals += 1,
                SpacePart::Component => p.spaceship.components += 1,
                SpacePart::Module => p.spaceship.modules += 1,
            }
        }
        return;
    }
    match rules.building(building).genus {
        BuildingGenus::GreatWonder => {
            state.great_wonders[building.index()] = WonderSlot::Built { city, owner };
        }
        BuildingGenus::SmallWonder => {
            if let Some(prev) = state.small_wonder_city(owner, building) {
                if prev != city {
                    if let Some(c) = state.city_mut(prev) {
                        c.built[building.index()] = false;
                    }
                }
            }
            if let Some(p) = state.player_mut(owner) {
                p.small_wonders[building.index()] = Some(city);
            }
        }
        _ => {}
    }
    if let Some(c) = state.city_mut(city) {
        c.built[building.index()] = true;
    }
}

pub fn city_remove_improvement(state: &mut GameState, city: CityId, building: BuildingId) {
    let Some(owner) = state.city(city).map(|c| c.owner) else {
        return;
    };
    if let Some(c) = state.city_mut(city) {
        c.built[building.index()] = false;
    }
    match state.rules.building(building).genus {
        BuildingGenus::GreatWonder => {
            if state.great_wonder_city(building) == Some(city) {
                state.great_wonders[building.index()] = WonderSlot::Destroyed;
                state.notify(
                    Audience::All,
                    Event::WonderLost {
                        player: owner,
                        building,
                    },
                );
            }
        }
        BuildingGenus::SmallWonder => {
            if let Some(p) = state.player_mut(owner) {
                if p.small_wonders[building.index()] == Some(city) {
                    p.small_wonders[building.index()] = None;
                }
            }
        }
        _ => {}
    }
}

/// Buy the current production outright. Returns the gold paid.
pub fn really_handle_city_buy(
    state: &mut GameState,
    player: PlayerId,
    city: CityId,
) -> Result<i32, GameError> {
    let c = state.city_or_err(city)?;
    if c.owner != player {
        return Err(GameError::UnknownCity);
    }
    if c.did_buy {
        return Err(GameError::AlreadyBought);
    }
    if c.anarchy > 0 && c.currently_building.is_unit() {
        return Err(GameError::AnarchyBuy);
    }
    let target = c.currently_building;
    let cost = city_production_buy_gold_cost(state, city);
    if cost <= 0 {
        return Err(GameError::NothingToBuy);
    }
    let have = state.player(player).ok_or(GameError::UnknownPlayer(player))?.gold;
    if cost > have {
        return Err(GameError::NotEnoughGold { needed: cost, have });
    }
    let total = build_shield_cost(&state.rules, target);
    if let Some(p) = state.player_mut(player) {
        p.gold -= cost;
    }
    let c = state.city_mut_or_err(city)?;
    c.before_change_shields += total - c.shield_stock;
    c.shield_stock = total;
    c.did_buy = true;
    debug!(city = %c.name, cost, "bought production");
    state.notify_player(player, Event::ProductionBought { city, target, cost });
    Ok(cost)
}

/// Sell one building. At most one sale per city per turn.
pub fn really_handle_city_sell(
    state: &mut GameState,
    player: PlayerId,
    city: CityId,
    building: BuildingId,
) -> Result<i32, GameError> {
    let c = state.city_or_err(city)?;
    if c.owner != player {
        return Err(GameError::UnknownCity);
    }
    if c.did_sell {
        return Err(GameError::AlreadySold);
    }
    if !c.has_building(building) {
        return Err(GameError::MissingBuilding(building));
    }
    if !state.rules.building(building).is_sellable() {
        return Err(GameError::CannotSell(building));
    }
    let gold = impr_sell_gold(&state.rules, building);
    city_remove_improvement(state, city, building);
    if let Some(c) = state.city_mut(city) {
        c.did_sell = true;
    }
    if let Some(p) = state.player_mut(player) {
        p.gold += gold;
    }
    city_refresh(state, city);
    state.notify_player(player, Event::ImprovementSold { city, building, gold });
    Ok(gold)
}

// ============================================================================
// PRODUCTION CHANGES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductionClass {
    Unit,
    Improvement,
    Wonder,
}

pub fn production_class(rules: &CompiledRules, target: BuildTarget) -> ProductionClass {
    match target {
        BuildTarget::Unit(_) => ProductionClass::Unit,
        BuildTarget::Improvement(b) if rules.is_wonder(b) => ProductionClass::Wonder,
        BuildTarget::Improvement(_) => ProductionClass::Improvement,
    }
}

/// Percent of shields kept when switching between production classes.
pub const CHANGE_PENALTY_PCT: i32 = 50;

/// Shield stock the city would have after switching to `target`.
pub fn city_change_production_penalty(state: &GameState, city: CityId, target: BuildTarget) -> i32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    let from = production_class(&state.rules, c.changed_from);
    let to = production_class(&state.rules, target);
    if from == to || c.built_last_turn(state.turn) {
        return c.before_change_shields;
    }
    let mut unpenalized = 0;
    if to == ProductionClass::Unit {
        unpenalized += c.disbanded_shields;
    }
    if to == ProductionClass::Wonder {
        unpenalized += c.caravan_shields;
    }
    let unpenalized = unpenalized.min(c.before_change_shields);
    let penalized = (c.before_change_shields - unpenalized) * CHANGE_PENALTY_PCT / 100;
    unpenalized + penalized
}

pub fn change_build_target(state: &mut GameState, city: CityId, target: BuildTarget) {
    let Some(c) = state.city(city) else {
        return;
    };
    if c.currently_building == target {
        return;
    }
    let from = c.currently_building;
    let owner = c.owner;
    let stock = city_change_production_penalty(state, city, target);
    if let Some(c) = state.city_mut(city) {
        c.shield_stock = stock;
        c.currently_building = target;
        debug!(city = %c.name, ?target, stock, "production changed");
    }
    state.notify_player(owner, Event::ProductionChanged { city, from, to: target });
}

// ============================================================================
// SIZE
// ============================================================================

/// Grow by one. Returns false when the size limit blocks growth.
pub fn city_increase_size(state: &mut GameState, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let (owner, size) = (c.owner, c.size);
    if size >= city_size_max(state, city) {
        let needs = size_limit_building(state, city);
        let loss = state.rules.game.aqueduct_loss;
        if let Some(c) = state.city_mut(city) {
            c.food_stock -= c.food_stock * loss / 100;
        }
        state.notify_player(owner, Event::CityCantGrow { city, needs });
        return false;
    }
    if let Some(c) = state.city_mut(city) {
        c.size += 1;
    }
    auto_arrange_workers(state, city, &GreedyGovernor);
    state.notify_player(owner, Event::CityGrew { city, size: size + 1 });
    true
}

/// Shrink by `loss`. A loss of the whole population removes the city.
/// Returns whether the city still exists.
pub fn city_reduce_size(state: &mut GameState, city: CityId, loss: u32) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if loss == 0 {
        return true;
    }
    if loss >= c.size {
        remove_city(state, city);
        return false;
    }
    let owner = c.owner;
    let new_size = c.size - loss;
    let granary = state.rules.game.granary_size(new_size);
    if let Some(c) = state.city_mut(city) {
        c.size = new_size;
        c.food_stock = c.food_stock.min(granary);
    }
    auto_arrange_workers(state, city, &GreedyGovernor);
    state.notify_player(owner, Event::CityShrank { city, size: new_size });
    true
}

// ============================================================================
// FOUNDING AND REMOVAL
// ============================================================================

pub fn citymindist_ok(state: &GameState, hex: Hex) -> bool {
    state
        .cities
        .iter_ordered()
        .all(|(_, c)| c.hex.distance(hex) >= CITY_MIN_DISTANCE)
}

pub fn create_city(
    state: &mut GameState,
    owner: PlayerId,
    hex: Hex,
    name: impl Into<String>,
) -> Result<CityId, GameError> {
    let name = name.into();
    state.player(owner).ok_or(GameError::UnknownPlayer(owner))?;
    let tile = state.map.index_of(hex).ok_or(GameError::InvalidCitySite)?;
    if state.map.is_ocean(tile, &state.rules)
        || state.map.tile(tile).city.is_some()
        || !citymindist_ok(state, hex)
    {
        return Err(GameError::InvalidCitySite);
    }
    let first_city = state.city_count(owner) == 0;
    let placeholder = state
        .rules
        .unit_type_ids()
        .find(|&u| state.rules.unit_type(u).is_defender())
        .map(BuildTarget::Unit)
        .or_else(|| state.rules.building_ids().next().map(BuildTarget::Improvement))
        .ok_or(GameError::InvalidCitySite)?;
    let city = City::new(&name, owner, hex, tile, placeholder, &state.rules, state.turn);
    let id = state.cities.insert(city);

    {
        let t = state.map.tile_mut(tile);
        t.city = Some(id);
        t.owner = Some(owner);
        t.worked_by = None;
    }
    for idx in state.map.indices_in_radius(hex, state.rules.game.city_radius) {
        let t = state.map.tile_mut(idx);
        if t.owner.is_none() {
            t.owner = Some(owner);
        }
    }

    if first_city {
        let capital = state
            .rules
            .building_ids()
            .find(|&b| state.rules.is_small_wonder(b) && is_capital_building(&state.rules, b));
        if let Some(palace) = capital {
            city_add_improvement(state, id, palace);
        }
    }

    if let Some(defender) = best_defender_type(state, id) {
        if let Some(c) = state.city_mut(id) {
            c.currently_building = BuildTarget::Unit(defender);
            c.changed_from = BuildTarget::Unit(defender);
        }
    }

    auto_arrange_workers(state, id, &GreedyGovernor);
    for other in state.player_cities(owner) {
        city_refresh(state, other);
    }
    info!(city = %name, player = %owner, "city founded");
    Ok(id)
}

/// Remove a city: its supported units, wonders and worked tiles go with it.
pub fn remove_city(state: &mut GameState, city: CityId) {
    let Some(c) = state.city(city) else {
        return;
    };
    let owner = c.owner;
    let name = c.name.clone();
    let buildings: Vec<BuildingId> = c.buildings().collect();
    let worked = c.worked.clone();
    let tile = c.tile;

    for unit in state.supported_units(city) {
        state.wipe_unit(unit);
    }
    for b in buildings {
        city_remove_improvement(state, city, b);
    }
    for t in worked {
        state.map.tile_mut(t).worked_by = None;
    }
    state.map.tile_mut(tile).city = None;
    state.cities.remove(city);
    info!(city = %name, player = %owner, "city removed");
    state.notify(
        Audience::Player(owner),
        Event::CityDestroyed {
            city,
            player: owner,
            name,
        },
    );
    for other in state.player_cities(owner) {
        city_refresh(state, other);
    }
}

/// Rehome every unit supported by `from` onto `to`, except `keep`.
pub fn transfer_city_units(state: &mut GameState, from: CityId, to: CityId, keep: Option<UnitId>) {
    for unit in state.supported_units(from) {
        if Some(unit) == keep {
            continue;
        }
        if let Some(u) = state.units.get_mut(unit) {
            u.home = Some(to);
        }
    }
    city_refresh(state, from);
    city_refresh(state, to);
}

/// Nearest city of an ally of `player` other than `exclude`.
pub fn find_closest_allied_city(
    state: &GameState,
    player: PlayerId,
    hex: Hex,
    exclude: Option<CityId>,
) -> Option<CityId> {
    state
        .cities
        .iter_ordered()
        .filter(|(id, c)| Some(*id) != exclude && state.diplomacy.allied(player, c.owner))
        .min_by_key(|(_, c)| c.hex.distance(hex))
        .map(|(id, _)| id)
}

// ============================================================================
// WORKLIST
// ============================================================================

pub fn worklist_is_empty(state: &GameState, city: CityId) -> bool {
    state.city(city).map_or(true, |c| c.worklist.is_empty())
}

pub fn worklist_append(state: &mut GameState, city: CityId, target: BuildTarget) {
    if let Some(c) = state.city_mut(city) {
        c.worklist.push_back(target);
    }
}

/// Gold owed each turn for every building the player owns.
pub fn player_improvement_upkeep(state: &GameState, player: PlayerId) -> i32 {
    state
        .player_cities(player)
        .into_iter()
        .map(|c| crate::cityrefresh::city_total_improvement_upkeep(state, c))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn buy_cost_doubles_for_empty_stock_and_wonders() {
        let rules = testkit::rules();
        let temple = rules.building_id("temple").unwrap();
        let pyramids = rules.building_id("pyramids").unwrap();
        let m = impr_build_shield_cost(&rules, temple) - 10;
        assert_eq!(impr_buy_gold_cost(&rules, temple, 10), 2 * m + m * m / 20);
        let full = impr_build_shield_cost(&rules, temple);
        assert_eq!(
            impr_buy_gold_cost(&rules, temple, 0),
            2 * (2 * full + full * full / 20)
        );
        let w = impr_build_shield_cost(&rules, pyramids) - 10;
        assert_eq!(impr_buy_gold_cost(&rules, pyramids, 10), 2 * (2 * w + w * w / 20));
        assert_eq!(impr_buy_gold_cost(&rules, temple, full), 0);
    }

    #[test]
    fn first_city_gets_the_palace() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let a = testkit::found_city(&mut state, p, 2, 2);
        let b = testkit::found_city(&mut state, p, 6, 6);
        let palace = state.rules.building_id("palace").unwrap();
        assert!(state.city(a).unwrap().has_building(palace));
        assert!(!state.city(b).unwrap().has_building(palace));
        assert_eq!(state.capital(p), Some(a));

        city_add_improvement(&mut state, b, palace);
        assert!(!state.city(a).unwrap().has_building(palace));
        assert_eq!(state.capital(p), Some(b));
    }

    #[test]
    fn cities_keep_their_distance() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        testkit::found_city(&mut state, p, 4, 4);
        assert_eq!(
            create_city(&mut state, p, Hex::new(5, 4), "Too close"),
            Err(GameError::InvalidCitySite)
        );
        assert_eq!(
            create_city(&mut state, p, Hex::new(40, 4), "Off map"),
            Err(GameError::InvalidCitySite)
        );
    }

    #[test]
    fn reducing_whole_population_removes_city() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        testkit::set_size(&mut state, city, 3);
        assert!(city_reduce_size(&mut state, city, 1));
        assert_eq!(state.city(city).unwrap().size, 2);
        assert!(!city_reduce_size(&mut state, city, 5));
        assert!(state.city(city).is_none());
        assert!(state
            .pending_events()
            .iter()
            .any(|(_, e)| matches!(e, Event::CityDestroyed { .. })));
    }

    #[test]
    fn shrinking_clamps_food_to_the_smaller_granary() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        testkit::set_size(&mut state, city, 4);
        let full = state.rules.game.granary_size(4);
        state.city_mut(city).unwrap().food_stock = full;

        assert!(city_reduce_size(&mut state, city, 2));
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 2);
        assert_eq!(c.food_stock, state.rules.game.granary_size(2).min(full));
        assert!(c.food_stock >= 0);
    }

    #[test]
    fn class_change_halves_stock_unless_built_last_turn() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let temple = state.rules.building_id("temple").unwrap();
        state.turn = 10;
        {
            let c = state.city_mut(city).unwrap();
            c.shield_stock = 20;
            c.before_change_shields = 20;
            c.turn_last_built = 1;
        }
        change_build_target(&mut state, city, BuildTarget::Improvement(temple));
        assert_eq!(state.city(city).unwrap().shield_stock, 10);
        let back = state.city(city).unwrap().changed_from;
        change_build_target(&mut state, city, back);
        assert_eq!(state.city(city).unwrap().shield_stock, 20);
    }

    #[test]
    fn selling_twice_in_a_turn_is_refused() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let temple = state.rules.building_id("temple").unwrap();
        let granary = state.rules.building_id("granary").unwrap();
        testkit::give_building(&mut state, city, temple);
        testkit::give_building(&mut state, city, granary);
        let gold = state.players[p.index()].gold;
        let got = really_handle_city_sell(&mut state, p, city, temple).unwrap();
        assert_eq!(state.players[p.index()].gold, gold + got);
        assert_eq!(
            really_handle_city_sell(&mut state, p, city, granary),
            Err(GameError::AlreadySold)
        );
        let palace = state.rules.building_id("palace").unwrap();
        state.city_mut(city).unwrap().did_sell = false;
        assert_eq!(
            really_handle_city_sell(&mut state, p, city, palace),
            Err(GameError::CannotSell(palace))
        );
    }
}
