//! Low-voltage distribution grid simulator: prosumer agents with storage and
//! generation, cluster controllers and a per-tick grid solve.

pub mod cluster;
pub mod config;
pub mod devices;
pub mod error;
pub mod event;
pub mod grid;
pub mod io;
/// Simulation clock, step processor and simulation loop.
pub mod sim;
pub mod solver;
pub mod storage;

pub use error::{Result, SimError};
