use statecraft_protocol::{BuildTarget, BuildingId, PlayerId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("unknown city")]
    UnknownCity,
    #[error("unknown unit")]
    UnknownUnit,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("tile is off the map or already has a city")]
    InvalidCitySite,
    #[error("city cannot build {0:?}")]
    CannotBuild(BuildTarget),
    #[error("not enough gold (need {needed}, have {have})")]
    NotEnoughGold { needed: i32, have: i32 },
    #[error("production already bought this turn")]
    AlreadyBought,
    #[error("cannot buy during anarchy")]
    AnarchyBuy,
    #[error("nothing to buy")]
    NothingToBuy,
    #[error("a building was already sold this turn")]
    AlreadySold,
    #[error("building {0:?} cannot be sold")]
    CannotSell(BuildingId),
    #[error("city does not have {0:?}")]
    MissingBuilding(BuildingId),
    #[error("unit cannot be upgraded")]
    CannotUpgrade,
    #[error("unknown technology")]
    UnknownTechnology,
    #[error("technology already researched")]
    TechAlreadyResearched,
    #[error("government not available")]
    GovernmentUnavailable,
}
