//! Finishing the current build target and choosing the next one.

use statecraft_protocol::{
    Audience, BuildBlock, BuildTarget, BuildingId, CityId, Event, UnitTypeId,
};
use tracing::{debug, error, info};

use crate::advisor::ProductionAdvisor;
use crate::cityrefresh::{city_refresh, city_unit_veteran_level};
use crate::citytools::{
    can_city_build_improvement_later, can_city_build_improvement_now, can_city_build_now,
    can_city_build_unit_direct, can_city_build_unit_later, can_city_build_unit_now,
    change_build_target, city_add_improvement, city_reduce_size, find_closest_allied_city,
    great_wonder_is_available, impr_build_shield_cost, remove_city, transfer_city_units,
    unit_build_shield_cost, worklist_is_empty,
};
use crate::effects::{are_reqs_active, improvement_obsolete, ReqContext, ReqProbe};
use crate::game::GameState;
use crate::research::give_immediate_free_tech;
use crate::rules::{BuildingFlag, EffectType, UnitFlag};

use super::shields::city_distribute_surplus_shields;

/// Pay upkeep, then try to complete the current target. Returns false when
/// the city no longer exists.
pub fn city_build_stuff(state: &mut GameState, city: CityId, advisor: &dyn ProductionAdvisor) -> bool {
    if !city_distribute_surplus_shields(state, city) {
        return false;
    }
    let Some(c) = state.city_mut(city) else {
        return false;
    };
    c.disbanded_shields = 0;
    c.caravan_shields = 0;
    // Switching back to this target later in the turn is free.
    c.changed_from = c.currently_building;
    match c.currently_building {
        BuildTarget::Improvement(b) => city_build_building(state, city, b, advisor),
        BuildTarget::Unit(u) => city_build_unit(state, city, u, advisor),
    }
}

fn build_block_reason(state: &GameState, city: CityId, building: BuildingId) -> BuildBlock {
    let owner = state.city(city).map(|c| c.owner);
    if state.rules.is_great_wonder(building) && !great_wonder_is_available(state, building) {
        BuildBlock::WonderTaken
    } else if owner.is_some_and(|o| improvement_obsolete(state, o, building)) {
        BuildBlock::Obsolete
    } else {
        BuildBlock::MissingRequirements
    }
}

/// Free techs granted by `building` now that it stands in `city`.
fn construction_bonus(state: &GameState, city: CityId, building: BuildingId, kind: EffectType) -> i32 {
    let ctx = ReqContext::city(state, city);
    state
        .rules
        .effects_of_building(building)
        .filter(|e| e.kind == kind)
        .filter(|e| are_reqs_active(state, &ctx, &e.reqs, ReqProbe::Certain))
        .map(|e| e.amount)
        .sum()
}

pub fn city_build_building(
    state: &mut GameState,
    city: CityId,
    building: BuildingId,
    advisor: &dyn ProductionAdvisor,
) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let owner = c.owner;
    let stock = c.shield_stock;
    let name = c.name.clone();
    let rules = state.rules.clone();
    let bt = rules.building(building);

    if bt.has_flag(BuildingFlag::Gold) {
        // Coinage: shields become gold, nothing completes.
        let gold = c.surplus.shield.max(0);
        if let Some(p) = state.player_mut(owner) {
            p.gold += gold;
        }
        if let Some(c) = state.city_mut(city) {
            c.shield_stock = 0;
            c.before_change_shields = 0;
        }
        choose_build_target(state, city, advisor);
        return true;
    }

    if !can_city_build_improvement_now(state, city, building) {
        let reason = build_block_reason(state, city, building);
        info!(city = %name, building = %bt.name, ?reason, "target no longer available");
        state.notify_player(
            owner,
            Event::CannotBuild {
                city,
                target: BuildTarget::Improvement(building),
                reason,
            },
        );
        choose_build_target(state, city, advisor);
        return true;
    }

    let cost = impr_build_shield_cost(&rules, building);
    if stock < cost {
        return true;
    }

    let previous_holder = rules
        .is_small_wonder(building)
        .then(|| state.small_wonder_city(owner, building))
        .flatten();
    city_add_improvement(state, city, building);
    let turn = state.turn;
    if let Some(c) = state.city_mut(city) {
        c.before_change_shields -= cost;
        c.shield_stock -= cost;
        c.turn_last_built = turn;
    }

    if bt.space_part.is_some() {
        let count = state.player(owner).map_or(0, |p| {
            p.spaceship.structurals + p.spaceship.components + p.spaceship.modules
        });
        state.notify_player(owner, Event::SpacePartBuilt { city, building, count });
    } else if rules.is_great_wonder(building) {
        info!(city = %name, wonder = %bt.name, "wonder completed");
        state.notify(
            Audience::All,
            Event::WonderBuilt {
                city,
                player: owner,
                building,
            },
        );
    } else {
        state.notify_player(owner, Event::ImprovementBuilt { city, building });
    }
    if construction_bonus(state, city, building, EffectType::CapitalCity) > 0 {
        state.notify_player(
            owner,
            Event::PalaceMoved {
                from: previous_holder.filter(|&prev| prev != city),
                to: city,
            },
        );
    }

    let free_techs = construction_bonus(state, city, building, EffectType::GiveImmTech);
    for _ in 0..free_techs {
        if give_immediate_free_tech(state, owner).is_none() {
            break;
        }
    }

    for other in state.player_cities(owner) {
        city_refresh(state, other);
    }
    choose_build_target(state, city, advisor);
    true
}

/// The most advanced unit the city can build that `unit_type` upgrades to.
pub fn city_unit_upgrade_target(state: &GameState, city: CityId, unit_type: UnitTypeId) -> Option<UnitTypeId> {
    let mut best = None;
    let mut current = unit_type;
    for _ in 0..state.rules.unit_types.len() {
        let Some(next) = state.rules.unit_type(current).obsoleted_by else {
            break;
        };
        if can_city_build_unit_direct(state, city, next) {
            best = Some(next);
        }
        current = next;
    }
    best
}

/// Switch an obsolete unit target to its upgrade. Same class, so no penalty.
fn upgrade_unit_prod(state: &mut GameState, city: CityId, unit_type: UnitTypeId) -> UnitTypeId {
    match city_unit_upgrade_target(state, city, unit_type) {
        Some(upgrade) => {
            if let Some(c) = state.city_mut(city) {
                debug!(city = %c.name, "production upgraded");
                c.currently_building = BuildTarget::Unit(upgrade);
            }
            upgrade
        }
        None => unit_type,
    }
}

pub fn city_build_unit(
    state: &mut GameState,
    city: CityId,
    unit_type: UnitTypeId,
    advisor: &dyn ProductionAdvisor,
) -> bool {
    let unit_type = upgrade_unit_prod(state, city, unit_type);
    let Some(c) = state.city(city) else {
        return false;
    };
    let owner = c.owner;
    let (size, stock, hex) = (c.size, c.shield_stock, c.hex);
    let disband_on_build = c.options.disband_on_build;
    let barbarian = state.player(owner).is_some_and(|p| p.barbarian);
    let rules = state.rules.clone();
    let ut = rules.unit_type(unit_type);

    // Barbarians do not need the know-how.
    if !barbarian && !can_city_build_unit_direct(state, city, unit_type) {
        state.notify_player(
            owner,
            Event::CannotBuild {
                city,
                target: BuildTarget::Unit(unit_type),
                reason: BuildBlock::MissingRequirements,
            },
        );
        choose_build_target(state, city, advisor);
        return true;
    }

    let cost = unit_build_shield_cost(&rules, unit_type);
    if stock < cost {
        return true;
    }

    let pop_cost = ut.pop_cost;
    if pop_cost > 0 && size == pop_cost && disband_on_build {
        return !disband_city(state, city);
    }
    if pop_cost > 0 && size <= pop_cost {
        state.notify_player(
            owner,
            Event::CannotBuild {
                city,
                target: BuildTarget::Unit(unit_type),
                reason: BuildBlock::PopulationCost,
            },
        );
        return true;
    }

    let veteran = city_unit_veteran_level(state, city, unit_type);
    let turn = state.turn;
    let unit = state.create_unit(owner, unit_type, Some(city), hex);
    if let Some(u) = state.units.get_mut(unit) {
        u.veteran = veteran;
    }
    if let Some(c) = state.city_mut(city) {
        c.turn_last_built = turn;
        c.before_change_shields -= cost;
        c.shield_stock -= cost;
    }
    if pop_cost > 0 && !city_reduce_size(state, city, pop_cost) {
        return false;
    }
    city_refresh(state, city);
    debug!(?city, unit_type = %ut.name, "unit built");
    state.notify_player(owner, Event::UnitBuilt { city, unit, unit_type });

    if !worklist_change_build_target(state, city)
        && (ut.has_flag(UnitFlag::Unique) || !can_city_build_unit_now(state, city, unit_type))
    {
        advisor_choose_build(state, city, advisor);
    }
    true
}

/// Turn the whole city into the unit it is building. The other supported
/// units move to the nearest allied city. The only city cannot disband.
/// Returns whether the city was disbanded.
pub fn disband_city(state: &mut GameState, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    let BuildTarget::Unit(unit_type) = c.currently_building else {
        return false;
    };
    let (owner, hex, name) = (c.owner, c.hex, c.name.clone());
    let Some(receiver) = find_closest_allied_city(state, owner, hex, Some(city)) else {
        info!(city = %name, "refusing to disband the only city");
        state.notify_player(owner, Event::CannotDisbandOnlyCity { city });
        return false;
    };

    state.create_unit(owner, unit_type, Some(city), hex);
    transfer_city_units(state, city, receiver, None);
    info!(city = %name, "city disbanded into a unit");
    state.notify_player(
        owner,
        Event::CityDisbanded {
            city,
            name,
            into: unit_type,
        },
    );
    remove_city(state, city);
    true
}

/// Pop worklist entries until one can be built. Entries that may become
/// buildable later stay queued; the rest are dropped. Returns whether the
/// target changed.
pub fn worklist_change_build_target(state: &mut GameState, city: CityId) -> bool {
    let Some(c) = state.city(city) else {
        return false;
    };
    if c.worklist.is_empty() {
        return false;
    }
    let owner = c.owner;
    let entries: Vec<BuildTarget> = c.worklist.iter().copied().collect();
    let mut keep = Vec::with_capacity(entries.len());
    let mut chosen = None;

    for (i, target) in entries.iter().copied().enumerate() {
        let resolved = match target {
            BuildTarget::Unit(u) if can_city_build_unit_direct(state, city, u) => Some(target),
            BuildTarget::Unit(u) => match city_unit_upgrade_target(state, city, u) {
                Some(up) => Some(BuildTarget::Unit(up)),
                None if can_city_build_unit_later(state, city, u) => {
                    keep.push(target);
                    None
                }
                None => {
                    state.notify_player(
                        owner,
                        Event::CannotBuild {
                            city,
                            target,
                            reason: BuildBlock::MissingRequirements,
                        },
                    );
                    None
                }
            },
            BuildTarget::Improvement(b) if can_city_build_improvement_now(state, city, b) => {
                Some(target)
            }
            BuildTarget::Improvement(b) if can_city_build_improvement_later(state, city, b) => {
                debug!(?city, "worklist entry postponed");
                keep.push(target);
                None
            }
            BuildTarget::Improvement(b) => {
                let reason = build_block_reason(state, city, b);
                state.notify_player(owner, Event::CannotBuild { city, target, reason });
                None
            }
        };
        if let Some(resolved) = resolved {
            chosen = Some(resolved);
            keep.extend(entries[i + 1..].iter().copied());
            break;
        }
    }

    if let Some(c) = state.city_mut(city) {
        c.worklist = keep.into();
    }
    if let Some(target) = chosen {
        change_build_target(state, city, target);
    }
    if state.city(city).is_some() && worklist_is_empty(state, city) {
        state.notify_player(owner, Event::WorklistEmpty { city });
    }
    chosen.is_some()
}

/// Ask the advisor for a target and install it if the city can build it.
pub fn advisor_choose_build(state: &mut GameState, city: CityId, advisor: &dyn ProductionAdvisor) {
    match advisor.choose_build(state, city) {
        Some(target) if can_city_build_now(state, city, target) => {
            change_build_target(state, city, target);
        }
        Some(target) => {
            debug!(?city, ?target, "advisor suggested an unbuildable target");
        }
        None => {
            let name = state.city(city).map(|c| c.name.clone()).unwrap_or_default();
            error!(city = %name, "no production target available");
        }
    }
}

/// Worklist first, then the same target again, then the advisor.
pub fn choose_build_target(state: &mut GameState, city: CityId, advisor: &dyn ProductionAdvisor) {
    if worklist_change_build_target(state, city) {
        return;
    }
    let Some(c) = state.city(city) else {
        return;
    };
    if can_city_build_now(state, city, c.currently_building) {
        return;
    }
    advisor_choose_build(state, city, advisor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::DefaultAdvisor;
    use crate::citytools::worklist_append;
    use crate::testkit;

    #[test]
    fn completed_building_is_installed_and_target_moves_on() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let barracks = state.rules.building_id("barracks").unwrap();
        change_build_target(&mut state, city, BuildTarget::Improvement(barracks));
        testkit::set_shield_stock(&mut state, city, 35);

        assert!(city_build_building(&mut state, city, barracks, &DefaultAdvisor));
        let c = state.city(city).unwrap();
        assert!(c.has_building(barracks));
        assert_eq!(c.shield_stock, 5);
        assert_eq!(c.turn_last_built, state.turn);
        assert_ne!(c.currently_building, BuildTarget::Improvement(barracks));
    }

    #[test]
    fn bought_building_completes_without_a_shield_debt() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let barracks = state.rules.building_id("barracks").unwrap();
        change_build_target(&mut state, city, BuildTarget::Improvement(barracks));
        state.player_mut(p).unwrap().gold = 1000;
        crate::citytools::really_handle_city_buy(&mut state, p, city).unwrap();

        assert!(city_build_building(&mut state, city, barracks, &DefaultAdvisor));
        let c = state.city(city).unwrap();
        assert!(c.has_building(barracks));
        assert_eq!(c.shield_stock, 0);
        assert_eq!(c.before_change_shields, 0);
    }

    #[test]
    fn taken_wonder_is_not_completed() {
        let mut state = testkit::state(12, 12);
        let a = state.add_player("A", false);
        let b = state.add_player("B", false);
        let ca = testkit::found_city(&mut state, a, 2, 2);
        let cb = testkit::found_city(&mut state, b, 8, 8);
        testkit::give_tech(&mut state, a, "bronze_working");
        let colossus = state.rules.building_id("colossus").unwrap();
        testkit::give_building(&mut state, cb, colossus);
        {
            let c = state.city_mut(ca).unwrap();
            c.currently_building = BuildTarget::Improvement(colossus);
        }
        testkit::set_shield_stock(&mut state, ca, 500);
        city_build_building(&mut state, ca, colossus, &DefaultAdvisor);
        assert!(!state.city(ca).unwrap().has_building(colossus));
        assert!(state.pending_events().iter().any(|(_, e)| matches!(
            e,
            Event::CannotBuild {
                reason: BuildBlock::WonderTaken,
                ..
            }
        )));
    }

    #[test]
    fn disband_on_build_removes_city_and_moves_units() {
        let mut state = testkit::state_with(
            12,
            12,
            testkit::rules_with(|rules| {
                let settlers = rules.unit_type_id("settlers").unwrap();
                rules.unit_types[settlers.index()].pop_cost = 3;
            }),
        );
        let p = state.add_player("A", false);
        let keeper = testkit::found_city(&mut state, p, 2, 2);
        let city = testkit::found_city(&mut state, p, 7, 7);
        testkit::set_size(&mut state, city, 3);
        let escort = testkit::spawn_unit(&mut state, p, "warriors", Some(city), 7, 7);
        let settlers = state.rules.unit_type_id("settlers").unwrap();
        {
            let c = state.city_mut(city).unwrap();
            c.currently_building = BuildTarget::Unit(settlers);
            c.options.disband_on_build = true;
        }
        testkit::set_shield_stock(&mut state, city, 100);

        assert!(!city_build_unit(&mut state, city, settlers, &DefaultAdvisor));
        assert!(state.city(city).is_none());
        assert_eq!(state.units.get(escort).unwrap().home, Some(keeper));
        assert!(state
            .units
            .iter_ordered()
            .any(|(_, u)| u.unit_type == settlers && u.home == Some(keeper)));
    }

    #[test]
    fn only_city_refuses_to_disband() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let settlers = state.rules.unit_type_id("settlers").unwrap();
        {
            let c = state.city_mut(city).unwrap();
            c.currently_building = BuildTarget::Unit(settlers);
            c.options.disband_on_build = true;
        }
        testkit::set_shield_stock(&mut state, city, 100);
        assert!(city_build_unit(&mut state, city, settlers, &DefaultAdvisor));
        assert!(state.city(city).is_some());
        assert!(state
            .pending_events()
            .iter()
            .any(|(_, e)| matches!(e, Event::CannotDisbandOnlyCity { .. })));
    }

    #[test]
    fn worklist_skips_what_will_never_be_buildable() {
        let mut state = testkit::state(10, 10);
        let p = state.add_player("A", false);
        let city = testkit::found_city(&mut state, p, 4, 4);
        let temple = state.rules.building_id("temple").unwrap();
        let barracks = state.rules.building_id("barracks").unwrap();
        let leader = state.rules.unit_type_id("barbarian_leader").unwrap();
        worklist_append(&mut state, city, BuildTarget::Unit(leader));
        worklist_append(&mut state, city, BuildTarget::Improvement(temple));
        worklist_append(&mut state, city, BuildTarget::Improvement(barracks));
        assert!(worklist_change_build_target(&mut state, city));
        let c = state.city(city).unwrap();
        assert_eq!(c.currently_building, BuildTarget::Improvement(barracks));
        // temple waits for ceremonial burial
        assert_eq!(
            c.worklist.iter().copied().collect::<Vec<_>>(),
            vec![BuildTarget::Improvement(temple)]
        );
    }
}
