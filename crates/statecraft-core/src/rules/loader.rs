use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;
use statecraft_protocol::{BuildingId, DataId, GovernmentId, TechId, TerrainId, UnitTypeId};
use thiserror::Error;

use crate::rules::{
    CompiledRules, EffectIndex, RawBuildingType, RawEffect, RawGovernment, RawTechnology,
    RawTerrainType, RawUnitType, ReqNames, Technology,
};
use crate::settings::GameSettings;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("invalid ruleset: {0}")]
    Invalid(String),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum RulesSource<'a> {
    /// The classic ruleset compiled into the binary.
    Embedded,
    /// A directory holding the seven ruleset files.
    Path(String),
    Bytes(RulesetBytes<'a>),
}

pub struct RulesetBytes<'a> {
    pub terrain: &'a [u8],
    pub units: &'a [u8],
    pub buildings: &'a [u8],
    pub techs: &'a [u8],
    pub governments: &'a [u8],
    pub effects: &'a [u8],
    pub game: Option<&'a [u8]>,
}

struct RulesetText<'a> {
    terrain: &'a str,
    units: &'a str,
    buildings: &'a str,
    techs: &'a str,
    governments: &'a str,
    effects: &'a str,
    game: Option<&'a str>,
}

#[derive(Debug)]
struct RawRules {
    terrains: BTreeMap<String, RawTerrainType>,
    units: BTreeMap<String, RawUnitType>,
    buildings: BTreeMap<String, RawBuildingType>,
    techs: BTreeMap<String, RawTechnology>,
    governments: BTreeMap<String, RawGovernment>,
    effects: Vec<RawEffect>,
    game: GameSettings,
}

#[derive(Debug, Deserialize)]
struct EffectsFile {
    effects: Vec<RawEffect>,
}

pub fn load_rules(source: RulesSource<'_>) -> Result<CompiledRules, RulesError> {
    let raw = match source {
        RulesSource::Embedded => parse_raw_rules(RulesetText {
            terrain: include_str!("../../data/classic/terrain.yaml"),
            units: include_str!("../../data/classic/units.yaml"),
            buildings: include_str!("../../data/classic/buildings.yaml"),
            techs: include_str!("../../data/classic/techs.yaml"),
            governments: include_str!("../../data/classic/governments.yaml"),
            effects: include_str!("../../data/classic/effects.yaml"),
            game: Some(include_str!("../../data/classic/game.yaml")),
        })?,
        RulesSource::Path(path) => {
            let read = |name: &str| std::fs::read_to_string(format!("{path}/{name}.yaml"));
            let terrain = read("terrain")?;
            let units = read("units")?;
            let buildings = read("buildings")?;
            let techs = read("techs")?;
            let governments = read("governments")?;
            let effects = read("effects")?;
            let game = read("game").ok();
            parse_raw_rules(RulesetText {
                terrain: &terrain,
                units: &units,
                buildings: &buildings,
                techs: &techs,
                governments: &governments,
                effects: &effects,
                game: game.as_deref(),
            })?
        }
        RulesSource::Bytes(bytes) => parse_raw_rules(RulesetText {
            terrain: std::str::from_utf8(bytes.terrain)?,
            units: std::str::from_utf8(bytes.units)?,
            buildings: std::str::from_utf8(bytes.buildings)?,
            techs: std::str::from_utf8(bytes.techs)?,
            governments: std::str::from_utf8(bytes.governments)?,
            effects: std::str::from_utf8(bytes.effects)?,
            game: bytes.game.map(std::str::from_utf8).transpose()?,
        })?,
    };

    compile_rules(raw)
}

fn parse_raw_rules(text: RulesetText<'_>) -> Result<RawRules, RulesError> {
    let effects: EffectsFile = serde_yaml::from_str(text.effects)?;
    let game = match text.game {
        Some(s) => serde_yaml::from_str(s)?,
        None => GameSettings::default(),
    };
    Ok(RawRules {
        terrains: serde_yaml::from_str(text.terrain)?,
        units: serde_yaml::from_str(text.units)?,
        buildings: serde_yaml::from_str(text.buildings)?,
        techs: serde_yaml::from_str(text.techs)?,
        governments: serde_yaml::from_str(text.governments)?,
        effects: effects.effects,
        game,
    })
}

fn enumerate_keys<V, I>(map: &BTreeMap<String, V>, make: impl Fn(u16) -> I) -> HashMap<DataId, I> {
    map.keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), make(i as u16)))
        .collect()
}

fn compile_rules(raw: RawRules) -> Result<CompiledRules, RulesError> {
    if raw.governments.is_empty() {
        return Err(RulesError::Invalid("no governments defined".into()));
    }

    let terrain_ids = enumerate_keys(&raw.terrains, TerrainId::new);
    let unit_type_ids = enumerate_keys(&raw.units, UnitTypeId::new);
    let building_ids = enumerate_keys(&raw.buildings, BuildingId::new);
    let tech_ids = enumerate_keys(&raw.techs, TechId::new);
    let government_ids = enumerate_keys(&raw.governments, GovernmentId::new);

    let names = ReqNames {
        techs: &tech_ids,
        buildings: &building_ids,
        governments: &government_ids,
    };

    let terrains = raw
        .terrains
        .into_values()
        .map(|t| t.compile())
        .collect::<Vec<_>>();
    let unit_types = raw
        .units
        .into_values()
        .map(|u| u.compile(&tech_ids, &unit_type_ids, &building_ids))
        .collect::<Result<Vec<_>, _>>()?;
    let buildings = raw
        .buildings
        .into_values()
        .map(|b| b.compile(&names))
        .collect::<Result<Vec<_>, _>>()?;
    let mut techs = raw
        .techs
        .into_values()
        .map(|t| t.compile(&tech_ids))
        .collect::<Result<Vec<_>, _>>()?;
    let governments = raw
        .governments
        .into_values()
        .map(|g| g.compile(&names))
        .collect::<Result<Vec<_>, _>>()?;
    let effects = raw
        .effects
        .iter()
        .map(|e| e.compile(&names))
        .collect::<Result<Vec<_>, _>>()?;

    price_techs(&mut techs, &raw.game)?;
    let effect_index = EffectIndex::build(&effects);

    Ok(CompiledRules {
        terrains,
        unit_types,
        buildings,
        techs,
        governments,
        effects,
        game: raw.game,
        terrain_ids,
        unit_type_ids,
        building_ids,
        tech_ids,
        government_ids,
        effect_index,
    })
}

/// Fill `num_parents` and `cost`, rejecting prerequisite cycles.
fn price_techs(techs: &mut [Technology], game: &GameSettings) -> Result<(), RulesError> {
    let mut parents: Vec<Option<HashSet<usize>>> = vec![None; techs.len()];

    fn ancestors(
        i: usize,
        techs: &[Technology],
        parents: &mut Vec<Option<HashSet<usize>>>,
        visiting: &mut Vec<bool>,
    ) -> Result<HashSet<usize>, RulesError> {
        if let Some(done) = &parents[i] {
            return Ok(done.clone());
        }
        if visiting[i] {
            return Err(RulesError::Invalid(format!(
                "tech prerequisite cycle through '{}'",
                techs[i].name
            )));
        }
        visiting[i] = true;
        let mut set = HashSet::new();
        for req in techs[i].reqs.clone() {
            set.insert(req.index());
            set.extend(ancestors(req.index(), techs, parents, visiting)?);
        }
        visiting[i] = false;
        parents[i] = Some(set.clone());
        Ok(set)
    }

    let mut visiting = vec![false; techs.len()];
    for i in 0..techs.len() {
        let n = ancestors(i, techs, &mut parents, &mut visiting)?.len() as u32;
        let tech = &mut techs[i];
        tech.num_parents = n;
        tech.cost = tech_cost(game, n);
    }
    Ok(())
}

/// Classic tech cost: `base * (1 + n) * sqrt(1 + n) / 2`, scaled by sciencebox.
fn tech_cost(game: &GameSettings, num_parents: u32) -> i32 {
    let n = 1 + num_parents as i64;
    let root = (n as f64).sqrt();
    let cost = (game.base_tech_cost as f64 * n as f64 * root / 2.0) as i64;
    ((cost * game.sciencebox as i64 / 100).max(1)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_rules_compile() {
        let rules = load_rules(RulesSource::Embedded).expect("embedded ruleset");
        assert!(rules.terrain_id("grassland").is_some());
        let pottery = rules.tech_id("pottery").expect("pottery");
        assert_eq!(rules.tech(pottery).num_parents, 0);
        let monarchy = rules.tech_id("monarchy").expect("monarchy");
        assert!(rules.tech(monarchy).num_parents >= 2);
        assert!(rules.tech(monarchy).cost > rules.tech(pottery).cost);
        let granary = rules.building_id("granary").expect("granary");
        assert!(rules.effects_of_building(granary).next().is_some());
    }

    #[test]
    fn tech_cycles_are_rejected() {
        let mut techs = vec![
            Technology {
                name: "a".into(),
                reqs: vec![TechId::new(1)],
                num_parents: 0,
                cost: 0,
            },
            Technology {
                name: "b".into(),
                reqs: vec![TechId::new(0)],
                num_parents: 0,
                cost: 0,
            },
        ];
        let err = price_techs(&mut techs, &GameSettings::default()).unwrap_err();
        assert!(matches!(err, RulesError::Invalid(_)));
    }
}
