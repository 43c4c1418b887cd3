use serde::{Deserialize, Serialize};

use crate::{BuildTarget, BuildingId, CityId, GovernmentId, PlayerId, TechId, UnitId, UnitTypeId};

/// Who gets to see a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "player")]
pub enum Audience {
    Player(PlayerId),
    All,
}

/// Why a city could not complete or start its current target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildBlock {
    Obsolete,
    WonderTaken,
    MissingRequirements,
    PopulationCost,
    OnlyCity,
}

/// Sim-to-player notifications. Fire-and-forget: nothing in the core reads them back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TurnStarted {
        turn: u32,
    },

    // Production
    ImprovementBuilt {
        city: CityId,
        building: BuildingId,
    },
    WonderBuilt {
        city: CityId,
        player: PlayerId,
        building: BuildingId,
    },
    WonderLost {
        player: PlayerId,
        building: BuildingId,
    },
    SpacePartBuilt {
        city: CityId,
        building: BuildingId,
        count: u32,
    },
    PalaceMoved {
        from: Option<CityId>,
        to: CityId,
    },
    UnitBuilt {
        city: CityId,
        unit: UnitId,
        unit_type: UnitTypeId,
    },
    CannotBuild {
        city: CityId,
        target: BuildTarget,
        reason: BuildBlock,
    },
    ProductionChanged {
        city: CityId,
        from: BuildTarget,
        to: BuildTarget,
    },
    WorklistEmpty {
        city: CityId,
    },

    // Economy
    ProductionBought {
        city: CityId,
        target: BuildTarget,
        cost: i32,
    },
    ImprovementSold {
        city: CityId,
        building: BuildingId,
        gold: i32,
    },
    UnitUpgraded {
        unit: UnitId,
        from: UnitTypeId,
        to: UnitTypeId,
        cost: i32,
    },
    UnitDisbanded {
        city: CityId,
        unit_type: UnitTypeId,
        cause: DisbandCause,
    },
    EmergencyUnresolved {
        city: CityId,
    },
    GoldShortfall {
        player: PlayerId,
        wanted: i32,
    },

    // Population
    CityGrew {
        city: CityId,
        size: u32,
    },
    CityCantGrow {
        city: CityId,
        needs: Option<BuildingId>,
    },
    CityFamine {
        city: CityId,
        size: u32,
    },
    CityShrank {
        city: CityId,
        size: u32,
    },
    CityDestroyed {
        city: CityId,
        player: PlayerId,
        name: String,
    },
    CityDisbanded {
        city: CityId,
        name: String,
        into: UnitTypeId,
    },
    CannotDisbandOnlyCity {
        city: CityId,
    },

    // Mood
    CelebrationStarted {
        city: CityId,
    },
    CelebrationContinues {
        city: CityId,
    },
    CelebrationEnded {
        city: CityId,
    },
    DisorderStarted {
        city: CityId,
    },
    DisorderContinues {
        city: CityId,
    },
    DisorderEnded {
        city: CityId,
    },

    // Research and government
    TechLearned {
        player: PlayerId,
        tech: TechId,
    },
    ResearchChanged {
        player: PlayerId,
        tech: TechId,
        lost_bulbs: i32,
    },
    TechGoalChanged {
        player: PlayerId,
        tech: TechId,
    },
    RevolutionStarted {
        player: PlayerId,
        turns: u32,
    },
    GovernmentChanged {
        player: PlayerId,
        government: GovernmentId,
    },
    GovernmentCollapsed {
        player: PlayerId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbandCause {
    ShieldUpkeep,
    FoodUpkeep,
    Unhappiness,
    GoldUpkeep,
}
