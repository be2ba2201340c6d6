//! Per-tick electrical state of each agent, as handed to the grid solver.

use std::collections::BTreeMap;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// An active/reactive power pair (W, var).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerValue {
    pub active_power: f64,
    pub reactive_power: f64,
}

impl PowerValue {
    pub fn to_complex(self) -> Complex64 {
        Complex64::new(self.active_power, self.reactive_power)
    }
}

impl From<Complex64> for PowerValue {
    fn from(value: Complex64) -> Self {
        Self {
            active_power: value.re,
            reactive_power: value.im,
        }
    }
}

/// A resistance/reactance pair (ohm).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceValue {
    pub resistance: f64,
    pub reactance: f64,
}

impl From<Complex64> for ImpedanceValue {
    fn from(value: Complex64) -> Self {
        Self {
            resistance: value.re,
            reactance: value.im,
        }
    }
}

/// What one agent looks like to the grid after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentElectricalState {
    pub impedance: ImpedanceValue,
    pub inject_power: PowerValue,
    pub demand_power: PowerValue,
    pub battery_power: PowerValue,
}

impl AgentElectricalState {
    /// Net power drawn from the grid: demand minus injection.
    pub fn net_power(&self) -> Complex64 {
        self.demand_power.to_complex() - self.inject_power.to_complex()
    }
}

/// Electrical state of every agent, keyed by agent name.
pub type AgentsStates = BTreeMap<String, AgentElectricalState>;

/// Result of processing one agent for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub name: String,
    pub impedance: Complex64,
    pub demand_power: Complex64,
    pub inject_power: Complex64,
    pub power_from_battery: Complex64,
    /// PV power produced this tick (W).
    pub pv_power: f64,
}

impl StepOutcome {
    pub fn electrical_state(&self) -> AgentElectricalState {
        AgentElectricalState {
            impedance: self.impedance.into(),
            inject_power: self.inject_power.into(),
            demand_power: self.demand_power.into(),
            battery_power: self.power_from_battery.into(),
        }
    }
}
