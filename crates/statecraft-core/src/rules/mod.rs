mod effect;
mod loader;
mod requirement;
mod types;

pub use effect::*;
pub use loader::*;
pub use requirement::*;
pub use types::*;
