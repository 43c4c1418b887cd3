//! Computer player: city production wants, research, taxes, purchases.
//!
//! Everything here reads and writes the shared [`statecraft_core::GameState`]
//! during a player's phase of the turn. Hypothetical changes go through the
//! core's trial guards so nothing leaks into the real game.

mod buildings;
mod config;
mod controller;
mod data;
mod domestic;
mod effects;
mod government;
mod military;
mod reqs;
mod spend;
mod taxes;
mod tech;
mod upgrade;
mod want;

pub use crate::buildings::*;
pub use crate::config::*;
pub use crate::controller::*;
pub use crate::data::*;
pub use crate::domestic::*;
pub use crate::effects::*;
pub use crate::government::*;
pub use crate::military::*;
pub use crate::reqs::*;
pub use crate::spend::*;
pub use crate::taxes::*;
pub use crate::tech::*;
pub use crate::upgrade::*;
pub use crate::want::*;
