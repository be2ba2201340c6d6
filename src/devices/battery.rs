use serde::{Deserialize, Serialize};

use crate::devices::types::{EnergyStorage, FieldChecks, GridElement};

/// A stationary battery attached to an agent.
///
/// The battery covers a `contribution_active`/`contribution_reactive` share of
/// the agent's rated demand, serves injection requests coming from a cluster,
/// and absorbs PV, wind and incoming-power surplus as charging current.
///
/// `status` is the stored charge in coulomb-equivalent units and always lies
/// in `[0, capacity]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Battery {
    /// Terminal voltage (V).
    pub voltage: f64,
    /// Maximum stored charge.
    pub capacity: f64,
    /// Stored charge.
    pub status: f64,
    /// Share of rated active demand served by the battery (0..=1).
    pub contribution_active: f64,
    /// Share of rated reactive demand served by the battery (0..=1).
    pub contribution_reactive: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverter_input_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverter_output_voltage: Option<f64>,
    /// Inverter efficiency (0..=1).
    pub inverter_efficiency: f64,
    /// On/off flag (0 or 1).
    pub active: u8,
}

/// Partial update for a [`Battery`]; only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatteryState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_active: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_reactive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u8>,
}

impl Battery {
    /// Applies the fields present in `state`.
    ///
    /// A new `status` is clamped into `[0, capacity]`.
    pub fn update_state(&mut self, state: &BatteryState) {
        if let Some(active) = state.active {
            self.active = active;
        }
        if let Some(status) = state.status {
            self.status = status.clamp(0.0, self.capacity.max(0.0));
        }
        if let Some(c) = state.contribution_active {
            self.contribution_active = c;
        }
        if let Some(c) = state.contribution_reactive {
            self.contribution_reactive = c;
        }
    }

    /// Range checks for the serialized form.
    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("Battery");
        checks
            .flag("active", self.active)
            .positive("voltage", self.voltage)
            .non_negative("capacity", self.capacity)
            .unit_interval("contribution_active", self.contribution_active)
            .unit_interval("contribution_reactive", self.contribution_reactive)
            .unit_interval("inverter_efficiency", self.inverter_efficiency);
        if self.status < 0.0 || self.status > self.capacity {
            checks.issue(format!(
                "status must be in [0, capacity={}], got {}",
                self.capacity, self.status
            ));
        }
        checks
    }
}

impl BatteryState {
    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("BatteryState");
        if let Some(active) = self.active {
            checks.flag("active", active);
        }
        if let Some(c) = self.contribution_active {
            checks.unit_interval("contribution_active", c);
        }
        if let Some(c) = self.contribution_reactive {
            checks.unit_interval("contribution_reactive", c);
        }
        if let Some(s) = self.status {
            checks.non_negative("status", s);
        }
        checks
    }
}

impl GridElement for Battery {
    fn active(&self) -> u8 {
        self.active
    }
}

impl EnergyStorage for Battery {
    fn voltage(&self) -> f64 {
        self.voltage
    }

    fn capacity(&self) -> f64 {
        self.capacity
    }

    fn inverter_efficiency(&self) -> f64 {
        self.inverter_efficiency
    }

    fn status(&self) -> f64 {
        self.status
    }

    fn set_status(&mut self, status: f64) {
        self.status = status;
    }
}
