mod advisor;
mod city;
mod cityrefresh;
mod citytools;
pub mod cityturn;
mod cm;
mod effects;
mod entities;
mod error;
mod game;
mod government;
mod map;
pub mod mapgen;
mod pathfind;
mod player;
mod research;
mod rng;
mod rules;
mod settings;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
mod trial;
mod turn;
mod unit;
mod unittools;

pub use crate::advisor::*;
pub use crate::city::*;
pub use crate::cityrefresh::*;
pub use crate::citytools::*;
pub use crate::cityturn::{
    resolve_city_emergency, update_city_activities, update_city_activity,
};
pub use crate::cm::*;
pub use crate::effects::*;
pub use crate::entities::*;
pub use crate::error::*;
pub use crate::game::*;
pub use crate::government::*;
pub use crate::map::*;
pub use crate::mapgen::{generate_map, GeneratedMap, MapGenConfig};
pub use crate::pathfind::*;
pub use crate::player::*;
pub use crate::research::*;
pub use crate::rng::*;
pub use crate::rules::*;
pub use crate::settings::*;
pub use crate::trial::*;
pub use crate::turn::*;
pub use crate::unit::*;
pub use crate::unittools::*;
