//! Plain data shared by the simulation core, the AI and the turn runner.

mod event;
mod hex;
mod ids;
mod output;
mod target;

pub use crate::event::*;
pub use crate::hex::*;
pub use crate::ids::*;
pub use crate::output::*;
pub use crate::target::*;
