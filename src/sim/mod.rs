/// Simulation clock for tick management.
pub mod clock;
/// Simulation loop over a grid, its event queue and its store.
pub mod engine;
/// Electrical helper formulas and grid constants.
pub mod power;
pub mod step;
pub mod types;

pub use engine::{Simulation, TickReport};
