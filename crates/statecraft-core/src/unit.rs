use serde::{Deserialize, Serialize};
use statecraft_protocol::{CityId, Hex, Outputs, PlayerId, UnitTypeId};

use crate::rules::CompiledRules;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    Idle,
    Fortified,
    Sentry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub unit_type: UnitTypeId,
    pub owner: PlayerId,
    /// Supporting city. Units without one cost nothing.
    pub home: Option<CityId>,
    pub hex: Hex,
    pub hp: i32,
    pub veteran: u8,
    pub moves_left: i32,
    pub activity: Activity,
    /// Upkeep charged to the home city, refreshed with the city.
    pub upkeep: Outputs,
    /// Unhappy faces caused in the home city.
    pub unhappy: i32,
}

impl Unit {
    pub fn new(
        unit_type: UnitTypeId,
        owner: PlayerId,
        home: Option<CityId>,
        hex: Hex,
        rules: &CompiledRules,
    ) -> Self {
        let t = rules.unit_type(unit_type);
        Self {
            unit_type,
            owner,
            home,
            hex,
            hp: t.hp,
            veteran: 0,
            moves_left: t.move_rate,
            activity: Activity::Idle,
            upkeep: Outputs::ZERO,
            unhappy: 0,
        }
    }
}
