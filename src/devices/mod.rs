//! Energy devices owned by an agent.

/// Stationary battery storage.
pub mod battery;
/// Electric vehicle acting as load or supplier.
pub mod electrical_vehicle;
/// Photovoltaic array.
pub mod pv_panel;
pub mod types;
/// Domestic hot-water tank.
pub mod water_tank;
/// Small wind turbine.
pub mod wind_generator;

pub use battery::{Battery, BatteryState};
pub use electrical_vehicle::{ElectricalVehicle, ElectricalVehicleState};
pub use pv_panel::{PvPanel, PvPanelState};
pub use types::{EnergyStorage, FieldChecks, GridElement};
pub use water_tank::{WaterTank, WaterTankState};
pub use wind_generator::{WindGenerator, WindGeneratorState};
