//! City output, upkeep and happiness.
//!
//! [`compute_city_state`] is pure: it evaluates a city (optionally under a
//! different worker arrangement) without touching the state, so the citizen
//! governor and the AI can probe alternatives. [`city_refresh`] stores the
//! result.

use statecraft_protocol::{CityId, OutputType, Outputs, PlayerId, UnitId};

use crate::city::{Citizens, Specialists};
use crate::effects::{city_bonus, city_output_bonus, player_bonus, tile_output_bonus, unittype_bonus};
use crate::game::GameState;
use crate::rules::{EffectType, UnitFlag};

/// Luxury from one entertainer.
pub const ENTERTAINER_LUXURY: i32 = 2;
/// Gold from one taxman.
pub const TAXMAN_GOLD: i32 = 3;
/// Science from one scientist.
pub const SCIENTIST_SCIENCE: i32 = 3;
/// Capital distance used when the owner has no capital.
pub const NO_CAPITAL_DISTANCE: i32 = 32;
/// Field units further than this from home cause military unhappiness.
pub const AGGRESSIVE_DISTANCE: i32 = 3;
/// Shield pollution below this threshold is harmless.
const POLLUTION_THRESHOLD: i32 = 20;

/// Which tiles a city works, besides its free center tile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Arrangement {
    pub worked: Vec<usize>,
    pub specialists: Specialists,
}

/// Upkeep one supported unit costs its home city.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitUpkeep {
    pub unit: UnitId,
    pub upkeep: Outputs,
    pub unhappy: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CityState {
    pub prod: Outputs,
    pub surplus: Outputs,
    pub waste: Outputs,
    pub usage: Outputs,
    pub citizens: Citizens,
    pub pollution: i32,
    pub units: Vec<UnitUpkeep>,
    pub disorder: bool,
}

impl CityState {
    pub fn is_emergency(&self, food_stock: i32) -> bool {
        self.surplus.shield < 0 || self.disorder || food_stock + self.surplus.food < 0
    }
}

// ============================================================================
// TILES
// ============================================================================

/// True when `tile` is within the city radius and nobody else claims it.
pub fn city_can_work_tile(state: &GameState, city: CityId, tile: usize) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if tile == c.tile {
        return false;
    }
    let hex = state.map.hex_at_index(tile);
    if hex.distance(c.hex) > state.rules.game.city_radius {
        return false;
    }
    let t = state.map.tile(tile);
    t.city.is_none()
        && t.worked_by.map_or(true, |w| w == city)
        && t.owner.map_or(true, |o| o == c.owner)
}

/// Output of one worked tile for `city`.
pub fn city_tile_output(state: &GameState, city: CityId, tile: usize, celebrating: bool) -> Outputs {
    let base = state.rules.terrain(state.map.tile(tile).terrain).output;
    let is_center = state.city(city).is_some_and(|c| c.tile == tile);
    let mut out = Outputs::ZERO;
    for o in [OutputType::Food, OutputType::Shield, OutputType::Trade] {
        let mut v = base[o];
        if is_center && o == OutputType::Shield {
            v = v.max(state.rules.game.center_min_shield);
        }
        v += tile_output_bonus(state, city, tile, EffectType::OutputPerTile, o);
        if v > 0 {
            v += tile_output_bonus(state, city, tile, EffectType::OutputIncTile, o);
        }
        let penalty = tile_output_bonus(state, city, tile, EffectType::OutputPenaltyTile, o);
        if penalty > 0 && v > penalty && !celebrating {
            v -= 1;
        }
        out[o] = v.max(0);
    }
    out
}

// ============================================================================
// HAPPINESS
// ============================================================================

/// Content citizens lost to empire size.
pub fn empire_size_penalty(state: &GameState, player: PlayerId) -> i32 {
    let basis = player_bonus(state, player, EffectType::EmpireBase);
    let step = player_bonus(state, player, EffectType::EmpireStep);
    let cities = state.city_count(player) as i32;
    if basis <= 0 || cities <= basis {
        return 0;
    }
    let mut penalty = 1;
    if step > 0 {
        penalty += (cities - basis - 1) / step;
    }
    penalty
}

fn base_citizens(state: &GameState, city: CityId, owner: PlayerId, workers: u32) -> Citizens {
    let base = city_bonus(state, city, EffectType::CityUnhappysize)
        - empire_size_penalty(state, owner);
    let workers = workers as i32;
    if base >= 0 {
        let content = base.min(workers);
        Citizens {
            happy: 0,
            content: content as u32,
            unhappy: (workers - content) as u32,
            angry: 0,
        }
    } else {
        let angry = if state.rules.game.angry_citizens {
            (-base).min(workers)
        } else {
            0
        };
        Citizens {
            happy: 0,
            content: 0,
            unhappy: (workers - angry) as u32,
            angry: angry as u32,
        }
    }
}

/// Spend luxury moving citizens up the mood ladder.
fn citizen_luxury_happy(c: &mut Citizens, mut luxury: i32, happy_cost: i32) {
    let cost = happy_cost.max(1);
    while luxury >= cost && c.angry > 0 {
        c.angry -= 1;
        c.unhappy += 1;
        luxury -= cost;
    }
    while luxury >= cost && c.content > 0 {
        c.content -= 1;
        c.happy += 1;
        luxury -= cost;
    }
    while luxury >= 2 * cost && c.unhappy > 0 {
        c.unhappy -= 1;
        c.happy += 1;
        luxury -= 2 * cost;
    }
    if luxury >= cost && c.unhappy > 0 {
        c.unhappy -= 1;
        c.content += 1;
    }
}

fn make_content(c: &mut Citizens, mut faces: i32) {
    while faces > 0 && c.angry > 0 {
        c.angry -= 1;
        c.unhappy += 1;
        faces -= 1;
    }
    while faces > 0 && c.unhappy > 0 {
        c.unhappy -= 1;
        c.content += 1;
        faces -= 1;
    }
}

fn military_unhappy(c: &mut Citizens, mut faces: i32) {
    while faces > 0 && c.content > 0 {
        c.content -= 1;
        c.unhappy += 1;
        faces -= 1;
    }
    while faces > 1 && c.happy > 0 {
        c.happy -= 1;
        c.unhappy += 1;
        faces -= 2;
    }
    if faces > 0 && c.happy > 0 {
        c.happy -= 1;
        c.content += 1;
    }
}

fn wonder_happy(state: &GameState, city: CityId, c: &mut Citizens) {
    let mut happy = city_bonus(state, city, EffectType::MakeHappy);
    while happy > 0 && c.content > 0 {
        c.content -= 1;
        c.happy += 1;
        happy -= 1;
    }
    let mut force = city_bonus(state, city, EffectType::ForceContent);
    while force > 0 && c.angry > 0 {
        c.angry -= 1;
        c.content += 1;
        force -= 1;
    }
    while force > 0 && c.unhappy > 0 {
        c.unhappy -= 1;
        c.content += 1;
        force -= 1;
    }
    if city_bonus(state, city, EffectType::NoUnhappy) > 0 {
        c.content += c.unhappy + c.angry;
        c.unhappy = 0;
        c.angry = 0;
    }
}

// ============================================================================
// UPKEEP
// ============================================================================

fn unit_is_aggressive(state: &GameState, unit: &crate::unit::Unit, home_hex: statecraft_protocol::Hex) -> bool {
    if let Some(city) = state.city_at(unit.hex).and_then(|id| state.city(id)) {
        if city.owner == unit.owner {
            return false;
        }
    }
    unit.hex.distance(home_hex) > AGGRESSIVE_DISTANCE
}

fn unit_upkeep(state: &GameState, city: CityId) -> Vec<UnitUpkeep> {
    let Some(c) = state.city(city) else {
        return Vec::new();
    };
    let mut free = Outputs::ZERO;
    for o in OutputType::ALL {
        free[o] = city_output_bonus(state, city, EffectType::UnitUpkeepFreePerCity, o).max(0);
    }
    let unhappy_factor = player_bonus(state, c.owner, EffectType::UnhappyFactor);
    let mil_per = player_bonus(state, c.owner, EffectType::MakeContentMilPer);

    let mut out = Vec::new();
    for id in state.supported_units(city) {
        let Some(unit) = state.units.get(id) else {
            continue;
        };
        let utype = state.rules.unit_type(unit.unit_type);
        let mut upkeep = Outputs::ZERO;
        for o in OutputType::ALL {
            let base = utype.upkeep[o];
            if base <= 0 {
                continue;
            }
            let factor = crate::effects::effect_total(
                state,
                &crate::effects::ReqContext::city(state, city).with_unit_type(unit.unit_type),
                EffectType::UpkeepFactor,
                Some(o),
            )
            .max(if o == OutputType::Gold { 1 } else { 0 });
            let cost = base * factor;
            let waived = cost.min(free[o]);
            free[o] -= waived;
            upkeep[o] = cost - waived;
        }
        let mut unhappy = 0;
        if unhappy_factor > 0
            && utype.has_flag(UnitFlag::FieldUnit)
            && unit_is_aggressive(state, unit, c.hex)
        {
            unhappy = (utype.happy_cost * unhappy_factor - mil_per).max(0);
        }
        out.push(UnitUpkeep {
            unit: id,
            upkeep,
            unhappy,
        });
    }
    out
}

/// Gold upkeep of one building in `city` after `UpkeepFree`.
pub fn city_improvement_upkeep(state: &GameState, city: CityId, building: statecraft_protocol::BuildingId) -> i32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    let upkeep = state.rules.building(building).upkeep;
    if upkeep <= player_bonus(state, c.owner, EffectType::UpkeepFree) {
        0
    } else {
        upkeep
    }
}

pub fn city_total_improvement_upkeep(state: &GameState, city: CityId) -> i32 {
    state
        .city(city)
        .map(|c| c.buildings().map(|b| city_improvement_upkeep(state, city, b)).sum())
        .unwrap_or(0)
}

// ============================================================================
// REFRESH
// ============================================================================

/// Percent of `output` lost to waste in `city`.
pub fn city_waste_pct(state: &GameState, city: CityId, output: OutputType) -> i32 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    let mut pct = city_output_bonus(state, city, EffectType::OutputWaste, output);
    let by_distance = city_output_bonus(state, city, EffectType::OutputWasteByDistance, output);
    if by_distance > 0 {
        let distance = state
            .capital(c.owner)
            .and_then(|cap| state.city(cap))
            .map_or(NO_CAPITAL_DISTANCE, |cap| cap.hex.distance(c.hex));
        pct += by_distance * distance;
    }
    let reduction = city_output_bonus(state, city, EffectType::OutputWastePct, output).clamp(0, 100);
    (pct * (100 - reduction) / 100).clamp(0, 100)
}

pub fn compute_city_state(
    state: &GameState,
    city: CityId,
    arrangement: Option<&Arrangement>,
) -> Option<CityState> {
    let c = state.city(city)?;
    let player = state.player(c.owner)?;
    let celebrating = c.is_celebrating(state.rules.game.celebrate_size);
    let (worked, specialists) = match arrangement {
        Some(a) => (a.worked.as_slice(), a.specialists),
        None => (c.worked.as_slice(), c.specialists),
    };

    // Tiles.
    let mut prod = city_tile_output(state, city, c.tile, celebrating);
    for &tile in worked {
        prod += city_tile_output(state, city, tile, celebrating);
    }
    for o in OutputType::ALL {
        prod[o] += city_output_bonus(state, city, EffectType::OutputAdd, o);
    }

    // Waste.
    let mut waste = Outputs::ZERO;
    for o in [OutputType::Food, OutputType::Shield, OutputType::Trade] {
        let pct = city_waste_pct(state, city, o);
        waste[o] = prod[o] * pct / 100;
        prod[o] -= waste[o];
    }

    // Trade split.
    let max_rate = player_bonus(state, c.owner, EffectType::MaxRates);
    let rates = player.rates.clamped(max_rate);
    prod.gold += prod.trade * rates.tax / 100;
    prod.science += prod.trade * rates.sci / 100;
    prod.luxury += prod.trade - prod.trade * rates.tax / 100 - prod.trade * rates.sci / 100;
    prod.luxury += specialists.entertainers as i32 * ENTERTAINER_LUXURY;
    prod.gold += specialists.taxmen as i32 * TAXMAN_GOLD;
    prod.science += specialists.scientists as i32 * SCIENTIST_SCIENCE;

    for o in [
        OutputType::Food,
        OutputType::Shield,
        OutputType::Gold,
        OutputType::Luxury,
        OutputType::Science,
    ] {
        let bonus = city_output_bonus(state, city, EffectType::OutputBonus, o);
        if bonus != 0 {
            prod[o] += prod[o] * bonus / 100;
        }
    }

    // Upkeep.
    let units = unit_upkeep(state, city);
    let mut usage = Outputs::ZERO;
    for u in &units {
        usage += u.upkeep;
    }
    usage.food += c.size as i32 * 2;
    usage.gold += city_total_improvement_upkeep(state, city);

    // Happiness.
    let workers = c.size.saturating_sub(specialists.total());
    let mut citizens = base_citizens(state, city, c.owner, workers);
    citizen_luxury_happy(&mut citizens, prod.luxury, state.rules.game.happy_cost);
    make_content(&mut citizens, city_bonus(state, city, EffectType::MakeContent));
    let mil_faces: i32 = units.iter().map(|u| u.unhappy).sum::<i32>()
        - city_bonus(state, city, EffectType::MakeContentMil);
    if mil_faces > 0 {
        military_unhappy(&mut citizens, mil_faces);
    }
    wonder_happy(state, city, &mut citizens);

    let pollution = (prod.shield * (100 + city_bonus(state, city, EffectType::PolluProdPct)) / 100
        + c.size as i32 * city_bonus(state, city, EffectType::PolluPopPct) / 100
        - POLLUTION_THRESHOLD)
        .max(0);

    let mut surplus = prod - usage;
    let disorder = citizens.happy < citizens.unhappy + 2 * citizens.angry;
    if disorder {
        surplus.shield = surplus.shield.min(0);
        for o in [OutputType::Trade, OutputType::Gold, OutputType::Science] {
            prod[o] = 0;
            surplus[o] = -usage[o];
        }
    }

    Some(CityState {
        prod,
        surplus,
        waste,
        usage,
        citizens,
        pollution,
        units,
        disorder,
    })
}

/// Recompute `city` and store the results, including per-unit upkeep.
pub fn city_refresh(state: &mut GameState, city: CityId) {
    let Some(computed) = compute_city_state(state, city, None) else {
        return;
    };
    for u in &computed.units {
        if let Some(unit) = state.units.get_mut(u.unit) {
            unit.upkeep = u.upkeep;
            unit.unhappy = u.unhappy;
        }
    }
    if let Some(c) = state.city_mut(city) {
        c.prod = computed.prod;
        c.surplus = computed.surplus;
        c.waste = computed.waste;
        c.usage = computed.usage;
        c.citizens = computed.citizens;
        c.pollution = computed.pollution;
    }
}

pub fn city_refresh_for_player(state: &mut GameState, player: PlayerId) {
    for city in state.player_cities(player) {
        city_refresh(state, city);
    }
}

/// Bonus from effects that change a unit type built here.
pub fn city_unit_veteran_level(state: &GameState, city: CityId, unit_type: statecraft_protocol::UnitTypeId) -> u8 {
    let Some(c) = state.city(city) else {
        return 0;
    };
    unittype_bonus(state, c.owner, Some(city), unit_type, EffectType::VeteranBuild).clamp(0, 3) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn luxury_ladder_matches_cost() {
        let mut c = Citizens {
            happy: 0,
            content: 2,
            unhappy: 2,
            angry: 1,
        };
        citizen_luxury_happy(&mut c, 8, 2);
        // angry -> unhappy (2), two content -> happy (4), one unhappy -> content (2)
        assert_eq!(
            c,
            Citizens {
                happy: 2,
                content: 1,
                unhappy: 2,
                angry: 0
            }
        );
    }

    #[test]
    fn size_one_city_has_positive_surplus() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let c = state.city(city).unwrap();
        assert_eq!(c.size, 1);
        assert!(c.surplus.food >= 0);
        assert!(c.surplus.shield >= 0);
        assert!(!c.is_unhappy());
        assert_eq!(c.citizens.total() + c.specialists.total(), c.size);
    }

    #[test]
    fn despotism_penalty_trims_big_tiles() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let ocean = state.rules.terrain_id("ocean").unwrap();
        let tile = state.map.index_of(statecraft_protocol::Hex::new(4, 3)).unwrap();
        state.map.set_terrain(tile, ocean);
        assert_eq!(city_tile_output(&state, city, tile, false).trade, 2);
        let colossus = state.rules.building_id("colossus").unwrap();
        testkit::give_building(&mut state, city, colossus);
        assert_eq!(city_tile_output(&state, city, tile, false).trade, 2);
        assert_eq!(city_tile_output(&state, city, tile, true).trade, 3);
    }

    #[test]
    fn republic_adds_trade_to_trading_tiles() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        let tile = state.map.index_of(statecraft_protocol::Hex::new(4, 3)).unwrap();
        assert_eq!(city_tile_output(&state, city, tile, false).trade, 1);
        state.players[p.index()].government = state.rules.government_id("republic").unwrap();
        assert_eq!(city_tile_output(&state, city, tile, false).trade, 2);
    }

    #[test]
    fn disorder_zeroes_trade_outputs() {
        let mut state = testkit::state(8, 8);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 3, 3);
        state.city_mut(city).unwrap().size = 7;
        state.players[p.index()].rates = crate::player::TaxRates::new(60, 0, 40);
        let idle = Arrangement::default();
        let computed = compute_city_state(&state, city, Some(&idle)).unwrap();
        // four content, three unhappy, no luxury
        assert_eq!(computed.citizens.unhappy, 3);
        assert!(computed.disorder);
        assert_eq!(computed.prod.science, 0);
        assert!(computed.surplus.shield <= 0);
        assert!(computed.is_emergency(0));
    }
}
