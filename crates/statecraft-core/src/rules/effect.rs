//! Ruleset effects: a typed amount gated by a requirement list.
//!
//! Effects are summed at evaluation time. Every effect whose requirements
//! are all active for a target contributes its `amount`.

use std::collections::HashMap;

use serde::Deserialize;
use statecraft_protocol::{BuildingId, GovernmentId, OutputType};

use crate::rules::{compile_reqs, CompiledRequirement, ReqNames, ReqSource, Requirement, RulesError};

// ============================================================================
// EFFECT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum EffectType {
    // Output
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

    // Happiness
    MakeContent,
    MakeContentMil,
    MakeContentMilPer,
    MakeHappy,
    ForceContent,
    NoUnhappy,
    UnhappyFactor,
    CityUnhappysize,
    EmpireBase,
    EmpireStep,

    // Growth and health
    GrowthFood,
    SizeAdj,
    SizeUnlimit,
    RaptureGrow,
    PolluProdPct,
    PolluPopPct,
    HealthPct,
    NoIllness,

    // Military
    VeteranBuild,
    DefendBonus,
    Vision,
    MoveBonus,
    HpRegen,
    UnitRecover,
    UpgradeUnit,
    EnableNuke,
    SpyResistant,
    NoSinkDeep,

    // Empire
    CapitalCity,
    GiveImmTech,
    TechParasite,
    GainAiLove,
    EnableSpace,
    HaveEmbassies,
    RevealCities,
    RevealMap,
    SlowDownTimeline,
    MaxRates,
    RevolutionWhenUnhappy,
    TradeRevenueBonus,
}

/// An effect as written in `effects.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEffect {
    #[serde(rename = "type")]
    pub kind: EffectType,
    pub amount: i32,
    #[serde(default)]
    pub output: Option<OutputType>,
    #[serde(default)]
    pub reqs: Vec<Requirement>,
}

impl RawEffect {
    pub fn compile(&self, names: &ReqNames<'_>) -> Result<Effect, RulesError> {
        Ok(Effect {
            kind: self.kind,
            amount: self.amount,
            output: self.output,
            reqs: compile_reqs(&self.reqs, names)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub kind: EffectType,
    pub amount: i32,
    /// Output type for the `Output*`/`Upkeep*` family. `None` means "any".
    pub output: Option<OutputType>,
    pub reqs: Vec<CompiledRequirement>,
}

impl Effect {
    pub fn applies_to_output(&self, output: OutputType) -> bool {
        self.output.map_or(true, |o| o == output)
    }

    /// The requirement on `building`, if this effect has one.
    pub fn building_req(&self, building: BuildingId) -> Option<&CompiledRequirement> {
        self.reqs
            .iter()
            .find(|r| r.source == ReqSource::Building(building))
    }
}

// ============================================================================
// INDEX
// ============================================================================

/// Effect lookup tables built once per ruleset.
#[derive(Debug, Clone, Default)]
pub struct EffectIndex {
    by_type: HashMap<EffectType, Vec<usize>>,
    by_building: HashMap<BuildingId, Vec<usize>>,
    by_government: HashMap<GovernmentId, Vec<usize>>,
}

impl EffectIndex {
    pub fn build(effects: &[Effect]) -> Self {
        let mut index = EffectIndex::default();
        for (i, effect) in effects.iter().enumerate() {
            index.by_type.entry(effect.kind).or_default().push(i);
            for req in &effect.reqs {
                match req.source {
                    ReqSource::Building(b) => index.by_building.entry(b).or_default().push(i),
                    ReqSource::Gov(g) => index.by_government.entry(g).or_default().push(i),
                    _ => {}
                }
            }
        }
        index
    }

    pub fn of_type(&self, kind: EffectType) -> &[usize] {
        self.by_type.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Effects with a requirement on `building` (present or negated).
    pub fn of_building(&self, building: BuildingId) -> &[usize] {
        self.by_building.get(&building).map_or(&[], Vec::as_slice)
    }

    pub fn of_government(&self, gov: GovernmentId) -> &[usize] {
        self.by_government.get(&gov).map_or(&[], Vec::as_slice)
    }
}
