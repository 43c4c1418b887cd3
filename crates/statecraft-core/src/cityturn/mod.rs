//! End-of-turn processing for cities.
//!
//! Each city pays its upkeep, completes production, grows or starves and
//! updates its mood counters, in that order. The owner's treasury is
//! balanced once all of its cities are done.

mod emergency;
mod populate;
mod production;
mod shields;
mod status;
mod treasury;

pub use emergency::resolve_city_emergency;
pub use populate::{city_populate, city_rapture_grow};
pub use production::{
    advisor_choose_build, choose_build_target, city_build_building, city_build_stuff,
    city_build_unit, city_unit_upgrade_target, disband_city, worklist_change_build_target,
};
pub use shields::city_distribute_surplus_shields;
pub use status::{update_city_celebration, update_city_disorder};
pub use treasury::player_balance_treasury;

use statecraft_protocol::{CityId, PlayerId};
use tracing::{debug, trace};

use crate::advisor::ProductionAdvisor;
use crate::cityrefresh::city_refresh;
use crate::game::GameState;

/// Run one city through its turn. Returns false if the city is gone
/// afterwards (starved, disbanded or eaten by upkeep).
pub fn update_city_activity(state: &mut GameState, city: CityId, advisor: &dyn ProductionAdvisor) -> bool {
    city_refresh(state, city);
    if !city_build_stuff(state, city, advisor) {
        debug!(?city, "city gone after production");
        return false;
    }

    update_city_celebration(state, city);

    if !city_populate(state, city) {
        debug!(?city, "city starved");
        return false;
    }

    let Some(c) = state.city_mut(city) else {
        return false;
    };
    c.did_buy = false;
    c.did_sell = false;
    let (owner, gold) = (c.owner, c.surplus.gold);
    if let Some(p) = state.player_mut(owner) {
        p.gold += gold;
    }
    trace!(?city, gold, "city income");

    update_city_disorder(state, city);
    true
}

/// All cities of `player` in founding order, then the treasury.
pub fn update_city_activities(state: &mut GameState, player: PlayerId, advisor: &dyn ProductionAdvisor) {
    for city in state.player_cities(player) {
        update_city_activity(state, city, advisor);
    }
    player_balance_treasury(state, player);
}
