use serde::{Deserialize, Serialize};

use crate::{BuildingId, UnitTypeId};

/// What a city is producing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum BuildTarget {
    Improvement(BuildingId),
    Unit(UnitTypeId),
}

impl BuildTarget {
    #[inline]
    pub fn is_unit(self) -> bool {
        matches!(self, BuildTarget::Unit(_))
    }

    #[inline]
    pub fn improvement(self) -> Option<BuildingId> {
        match self {
            BuildTarget::Improvement(id) => Some(id),
            BuildTarget::Unit(_) => None,
        }
    }

    #[inline]
    pub fn unit(self) -> Option<UnitTypeId> {
        match self {
            BuildTarget::Unit(id) => Some(id),
            BuildTarget::Improvement(_) => None,
        }
    }
}
