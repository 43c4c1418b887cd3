use std::collections::HashMap;

use serde::Deserialize;
use statecraft_protocol::{
    BuildingId, DataId, GovernmentId, Outputs, TechId, TerrainId, UnitTypeId,
};

use crate::rules::{compile_reqs, CompiledRequirement, Effect, EffectIndex, ReqNames, Requirement, RulesError};
use crate::settings::GameSettings;

#[derive(Debug)]
pub struct CompiledRules {
    pub terrains: Vec<TerrainType>,
    pub unit_types: Vec<UnitType>,
    pub buildings: Vec<BuildingType>,
    pub techs: Vec<Technology>,
    pub governments: Vec<Government>,
    pub effects: Vec<Effect>,
    pub game: GameSettings,

    pub terrain_ids: HashMap<DataId, TerrainId>,
    pub unit_type_ids: HashMap<DataId, UnitTypeId>,
    pub building_ids: HashMap<DataId, BuildingId>,
    pub tech_ids: HashMap<DataId, TechId>,
    pub government_ids: HashMap<DataId, GovernmentId>,

    pub effect_index: EffectIndex,
}

impl CompiledRules {
    pub fn terrain(&self, id: TerrainId) -> &TerrainType {
        &self.terrains[id.index()]
    }

    pub fn unit_type(&self, id: UnitTypeId) -> &UnitType {
        &self.unit_types[id.index()]
    }

    pub fn building(&self, id: BuildingId) -> &BuildingType {
        &self.buildings[id.index()]
    }

    pub fn tech(&self, id: TechId) -> &Technology {
        &self.techs[id.index()]
    }

    pub fn government(&self, id: GovernmentId) -> &Government {
        &self.governments[id.index()]
    }

    pub fn terrain_id(&self, data_id: &str) -> Option<TerrainId> {
        self.terrain_ids.get(data_id).copied()
    }

    pub fn unit_type_id(&self, data_id: &str) -> Option<UnitTypeId> {
        self.unit_type_ids.get(data_id).copied()
    }

    pub fn building_id(&self, data_id: &str) -> Option<BuildingId> {
        self.building_ids.get(data_id).copied()
    }

    pub fn tech_id(&self, data_id: &str) -> Option<TechId> {
        self.tech_ids.get(data_id).copied()
    }

    pub fn government_id(&self, data_id: &str) -> Option<GovernmentId> {
        self.government_ids.get(data_id).copied()
    }

    pub fn building_ids(&self) -> impl Iterator<Item = BuildingId> {
        (0..self.buildings.len()).map(|i| BuildingId::new(i as u16))
    }

    pub fn unit_type_ids(&self) -> impl Iterator<Item = UnitTypeId> {
        (0..self.unit_types.len()).map(|i| UnitTypeId::new(i as u16))
    }

    pub fn tech_ids(&self) -> impl Iterator<Item = TechId> {
        (0..self.techs.len()).map(|i| TechId::new(i as u16))
    }

    pub fn government_ids(&self) -> impl Iterator<Item = GovernmentId> {
        (0..self.governments.len()).map(|i| GovernmentId::new(i as u16))
    }

    pub fn effects_of_type(&self, kind: crate::rules::EffectType) -> impl Iterator<Item = &Effect> {
        self.effect_index
            .of_type(kind)
            .iter()
            .map(move |&i| &self.effects[i])
    }

    pub fn effects_of_building(&self, building: BuildingId) -> impl Iterator<Item = &Effect> {
        self.effect_index
            .of_building(building)
            .iter()
            .map(move |&i| &self.effects[i])
    }

    pub fn effects_of_government(&self, gov: GovernmentId) -> impl Iterator<Item = &Effect> {
        self.effect_index
            .of_government(gov)
            .iter()
            .map(move |&i| &self.effects[i])
    }

    pub fn is_wonder(&self, id: BuildingId) -> bool {
        matches!(
            self.building(id).genus,
            BuildingGenus::GreatWonder | BuildingGenus::SmallWonder
        )
    }

    pub fn is_great_wonder(&self, id: BuildingId) -> bool {
        self.building(id).genus == BuildingGenus::GreatWonder
    }

    pub fn is_small_wonder(&self, id: BuildingId) -> bool {
        self.building(id).genus == BuildingGenus::SmallWonder
    }

    /// Best unit with `flag` in ruleset order, ignoring buildability.
    pub fn units_with_flag(&self, flag: UnitFlag) -> impl Iterator<Item = UnitTypeId> + '_ {
        self.unit_type_ids()
            .filter(move |&u| self.unit_type(u).has_flag(flag))
    }
}

// ============================================================================
// TERRAIN
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawTerrainType {
    pub name: String,
    pub food: i32,
    pub shield: i32,
    pub trade: i32,
    #[serde(default = "default_move_cost")]
    pub move_cost: i32,
    #[serde(default)]
    pub ocean: bool,
}

fn default_move_cost() -> i32 {
    1
}

impl RawTerrainType {
    pub fn compile(self) -> TerrainType {
        TerrainType {
            name: self.name,
            output: Outputs {
                food: self.food,
                shield: self.shield,
                trade: self.trade,
                ..Outputs::ZERO
            },
            move_cost: self.move_cost.max(1),
            ocean: self.ocean,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerrainType {
    pub name: String,
    pub output: Outputs,
    pub move_cost: i32,
    pub ocean: bool,
}

// ============================================================================
// UNITS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClass {
    Land,
    Sea,
    Air,
    Missile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFlag {
    /// Can found cities.
    Cities,
    Workers,
    /// Adds its shields to a wonder in progress.
    HelpWonder,
    Undisbandable,
    /// At most one per player.
    Unique,
    NoBuild,
    Nuclear,
    BarbarianOnly,
    NonMil,
    /// Causes unhappiness when away from home under some governments.
    FieldUnit,
    Explorer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUnitType {
    pub name: String,
    pub class: UnitClass,
    pub cost: i32,
    #[serde(default)]
    pub pop_cost: u32,
    pub attack: i32,
    pub defense: i32,
    #[serde(default = "default_move_rate")]
    pub move_rate: i32,
    #[serde(default = "default_hp")]
    pub hp: i32,
    #[serde(default = "default_firepower")]
    pub firepower: i32,
    #[serde(default)]
    pub upkeep_shield: i32,
    #[serde(default)]
    pub upkeep_food: i32,
    #[serde(default)]
    pub upkeep_gold: i32,
    #[serde(default)]
    pub happy_cost: i32,
    #[serde(default)]
    pub tech_req: Option<String>,
    #[serde(default)]
    pub building_req: Option<String>,
    #[serde(default)]
    pub obsoleted_by: Option<String>,
    #[serde(default)]
    pub flags: Vec<UnitFlag>,
}

fn lookup<I: Copy>(map: &HashMap<DataId, I>, id: Option<String>) -> Result<Option<I>, RulesError> {
    id.map(|id| map.get(&id).copied().ok_or(RulesError::MissingId(id)))
        .transpose()
}

fn default_move_rate() -> i32 {
    1
}

fn default_hp() -> i32 {
    10
}

fn default_firepower() -> i32 {
    1
}

impl RawUnitType {
    pub fn compile(
        self,
        tech_ids: &HashMap<DataId, TechId>,
        unit_ids: &HashMap<DataId, UnitTypeId>,
        building_ids: &HashMap<DataId, BuildingId>,
    ) -> Result<UnitType, RulesError> {
        Ok(UnitType {
            tech_req: lookup(tech_ids, self.tech_req)?,
            building_req: lookup(building_ids, self.building_req)?,
            obsoleted_by: lookup(unit_ids, self.obsoleted_by)?,
            name: self.name,
            class: self.class,
            cost: self.cost.max(1),
            pop_cost: self.pop_cost,
            attack: self.attack,
            defense: self.defense,
            move_rate: self.move_rate.max(1),
            hp: self.hp.max(1),
            firepower: self.firepower.max(1),
            upkeep: Outputs {
                shield: self.upkeep_shield,
                food: self.upkeep_food,
                gold: self.upkeep_gold,
                ..Outputs::ZERO
            },
            happy_cost: self.happy_cost,
            flags: self.flags,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UnitType {
    pub name: String,
    pub class: UnitClass,
    pub cost: i32,
    pub pop_cost: u32,
    pub attack: i32,
    pub defense: i32,
    pub move_rate: i32,
    pub hp: i32,
    pub firepower: i32,
    pub upkeep: Outputs,
    pub happy_cost: i32,
    pub tech_req: Option<TechId>,
    pub building_req: Option<BuildingId>,
    pub obsoleted_by: Option<UnitTypeId>,
    pub flags: Vec<UnitFlag>,
}

impl UnitType {
    pub fn has_flag(&self, flag: UnitFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_military(&self) -> bool {
        !self.has_flag(UnitFlag::NonMil)
    }

    pub fn is_defender(&self) -> bool {
        self.is_military() && self.class == UnitClass::Land && self.defense >= self.attack
    }
}

// ============================================================================
// BUILDINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingGenus {
    GreatWonder,
    SmallWonder,
    Improvement,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingFlag {
    /// Converts shields into gold; never completes.
    Gold,
    /// Destroyed wonder status is kept when the city is lost.
    SaveSmallWonder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpacePart {
    Structural,
    Component,
    Module,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBuildingType {
    pub name: String,
    pub genus: BuildingGenus,
    pub cost: i32,
    #[serde(default)]
    pub upkeep: i32,
    #[serde(default)]
    pub reqs: Vec<Requirement>,
    #[serde(default)]
    pub obsolete_by: Option<String>,
    #[serde(default)]
    pub replaced_by: Option<String>,
    #[serde(default)]
    pub flags: Vec<BuildingFlag>,
    #[serde(default)]
    pub space_part: Option<SpacePart>,
}

impl RawBuildingType {
    pub fn compile(self, names: &ReqNames<'_>) -> Result<BuildingType, RulesError> {
        let obsolete_by = lookup(names.techs, self.obsolete_by)?;
        let replaced_by = lookup(names.buildings, self.replaced_by)?;
        Ok(BuildingType {
            reqs: compile_reqs(&self.reqs, names)?,
            name: self.name,
            genus: self.genus,
            cost: self.cost.max(1),
            upkeep: self.upkeep,
            obsolete_by,
            replaced_by,
            flags: self.flags,
            space_part: self.space_part,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BuildingType {
    pub name: String,
    pub genus: BuildingGenus,
    pub cost: i32,
    pub upkeep: i32,
    pub reqs: Vec<CompiledRequirement>,
    pub obsolete_by: Option<TechId>,
    /// A building whose presence makes this one redundant.
    pub replaced_by: Option<BuildingId>,
    pub flags: Vec<BuildingFlag>,
    pub space_part: Option<SpacePart>,
}

impl BuildingType {
    pub fn has_flag(&self, flag: BuildingFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_wonder(&self) -> bool {
        matches!(
            self.genus,
            BuildingGenus::GreatWonder | BuildingGenus::SmallWonder
        )
    }

    pub fn is_sellable(&self) -> bool {
        self.genus == BuildingGenus::Improvement
    }
}

// ============================================================================
// TECHS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawTechnology {
    pub name: String,
    #[serde(default)]
    pub reqs: Vec<String>,
}

impl RawTechnology {
    pub fn compile(self, tech_ids: &HashMap<DataId, TechId>) -> Result<Technology, RulesError> {
        let reqs = self
            .reqs
            .into_iter()
            .map(|t| tech_ids.get(&t).copied().ok_or(RulesError::MissingId(t)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Technology {
            name: self.name,
            reqs,
            num_parents: 0,
            cost: 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Technology {
    pub name: String,
    /// Direct prerequisites.
    pub reqs: Vec<TechId>,
    /// Number of distinct ancestor techs.
    pub num_parents: u32,
    /// Bulbs needed, derived from `num_parents`.
    pub cost: i32,
}

// ============================================================================
// GOVERNMENTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawGovernment {
    pub name: String,
    #[serde(default)]
    pub reqs: Vec<Requirement>,
    #[serde(default)]
    pub anarchy: bool,
}

impl RawGovernment {
    pub fn compile(self, names: &ReqNames<'_>) -> Result<Government, RulesError> {
        Ok(Government {
            reqs: compile_reqs(&self.reqs, names)?,
            name: self.name,
            anarchy: self.anarchy,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Government {
    pub name: String,
    pub reqs: Vec<CompiledRequirement>,
    pub anarchy: bool,
}
