use std::collections::HashMap;

use serde::Deserialize;
use statecraft_protocol::{BuildingId, DataId, GovernmentId, TechId};

use crate::rules::{RulesError, UnitClass, UnitFlag};

/// How far from its source a requirement looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum ReqRange {
    Local,
    City,
    Continent,
    Player,
    World,
}

impl ReqRange {
    pub const ALL: [ReqRange; 5] = [
        ReqRange::Local,
        ReqRange::City,
        ReqRange::Continent,
        ReqRange::Player,
        ReqRange::World,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReqKind {
    Tech,
    Building,
    Gov,
    MinSize,
    Coastal,
    TerrainClass,
    UnitClass,
    UnitFlag,
    Never,
}

/// A requirement as written in ruleset YAML, e.g.
/// `{ type: Tech, name: mysticism, range: Player }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: ReqKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub range: Option<ReqRange>,
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_present() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainClass {
    Land,
    Ocean,
}

/// What a compiled requirement tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqSource {
    Tech(TechId),
    Building(BuildingId),
    Gov(GovernmentId),
    MinSize(u32),
    Coastal,
    TerrainClass(TerrainClass),
    UnitClass(UnitClass),
    UnitFlag(UnitFlag),
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledRequirement {
    pub source: ReqSource,
    pub range: ReqRange,
    pub present: bool,
}

impl CompiledRequirement {
    pub fn tech(self) -> Option<TechId> {
        match self.source {
            ReqSource::Tech(t) => Some(t),
            _ => None,
        }
    }

    pub fn building(self) -> Option<BuildingId> {
        match self.source {
            ReqSource::Building(b) => Some(b),
            _ => None,
        }
    }
}

/// Id tables needed to resolve requirement names.
pub struct ReqNames<'a> {
    pub techs: &'a HashMap<DataId, TechId>,
    pub buildings: &'a HashMap<DataId, BuildingId>,
    pub governments: &'a HashMap<DataId, GovernmentId>,
}

impl Requirement {
    pub fn compile(&self, names: &ReqNames<'_>) -> Result<CompiledRequirement, RulesError> {
        let missing = |what: &str| RulesError::MissingId(format!("{what} '{}'", self.name));
        let (source, default_range) = match self.kind {
            ReqKind::Tech => (
                ReqSource::Tech(*names.techs.get(&self.name).ok_or_else(|| missing("tech"))?),
                ReqRange::Player,
            ),
            ReqKind::Building => (
                ReqSource::Building(
                    *names
                        .buildings
                        .get(&self.name)
                        .ok_or_else(|| missing("building"))?,
                ),
                ReqRange::City,
            ),
            ReqKind::Gov => (
                ReqSource::Gov(
                    *names
                        .governments
                        .get(&self.name)
                        .ok_or_else(|| missing("government"))?,
                ),
                ReqRange::Player,
            ),
            ReqKind::MinSize => (
                ReqSource::MinSize(
                    self.name
                        .parse()
                        .map_err(|_| RulesError::Invalid(format!("bad MinSize '{}'", self.name)))?,
                ),
                ReqRange::City,
            ),
            ReqKind::Coastal => (ReqSource::Coastal, ReqRange::City),
            ReqKind::TerrainClass => {
                let class = match self.name.as_str() {
                    "land" => TerrainClass::Land,
                    "ocean" => TerrainClass::Ocean,
                    _ => return Err(missing("terrain class")),
                };
                (ReqSource::TerrainClass(class), ReqRange::Local)
            }
            ReqKind::UnitClass => (
                ReqSource::UnitClass(parse_name::<UnitClass>(&self.name)?),
                ReqRange::Local,
            ),
            ReqKind::UnitFlag => (
                ReqSource::UnitFlag(parse_name::<UnitFlag>(&self.name)?),
                ReqRange::Local,
            ),
            ReqKind::Never => (ReqSource::Never, ReqRange::Local),
        };
        Ok(CompiledRequirement {
            source,
            range: self.range.unwrap_or(default_range),
            present: self.present,
        })
    }
}

/// Reuse serde's enum naming for bare identifiers.
fn parse_name<T: for<'de> Deserialize<'de>>(name: &str) -> Result<T, RulesError> {
    Ok(serde_yaml::from_str(name)?)
}

pub fn compile_reqs(
    reqs: &[Requirement],
    names: &ReqNames<'_>,
) -> Result<Vec<CompiledRequirement>, RulesError> {
    reqs.iter().map(|r| r.compile(names)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_default_by_kind() {
        let techs = HashMap::from([("pottery".to_string(), TechId::new(3))]);
        let buildings = HashMap::new();
        let governments = HashMap::new();
        let names = ReqNames {
            techs: &techs,
            buildings: &buildings,
            governments: &governments,
        };
        let req: Requirement = serde_yaml::from_str("{ type: Tech, name: pottery }").unwrap();
        let compiled = req.compile(&names).unwrap();
        assert_eq!(compiled.source, ReqSource::Tech(TechId::new(3)));
        assert_eq!(compiled.range, ReqRange::Player);
        assert!(compiled.present);

        let size: Requirement =
            serde_yaml::from_str("{ type: MinSize, name: '9', present: false }").unwrap();
        let compiled = size.compile(&names).unwrap();
        assert_eq!(compiled.source, ReqSource::MinSize(9));
        assert!(!compiled.present);

        let bad: Requirement = serde_yaml::from_str("{ type: Building, name: nope }").unwrap();
        assert!(matches!(bad.compile(&names), Err(RulesError::MissingId(_))));
    }
}
