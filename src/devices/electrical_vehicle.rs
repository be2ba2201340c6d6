use serde::{Deserialize, Serialize};

use crate::devices::types::{EnergyStorage, FieldChecks, GridElement};

/// An electric vehicle parked at an agent.
///
/// In supplier mode (`power_supplier == 1`) the EV battery covers a share of
/// the agent's demand like a second stationary battery. Otherwise it charges
/// at `charge_current`, adding `charge_current * voltage_rating` to demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElectricalVehicle {
    pub voltage: f64,
    pub capacity: f64,
    pub status: f64,
    #[serde(default)]
    pub consumption: f64,
    pub contribution_active: f64,
    pub contribution_reactive: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverter_input_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverter_output_voltage: Option<f64>,
    pub inverter_efficiency: f64,
    /// Charging current drawn while not in supplier mode (A).
    pub charge_current: f64,
    /// 1 = supplies the agent, 0 = charges from the agent.
    pub power_supplier: u8,
    pub active: u8,
}

/// Partial update for an [`ElectricalVehicle`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElectricalVehicleState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_active: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_reactive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_supplier: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u8>,
}

impl ElectricalVehicle {
    pub fn is_supplier(&self) -> bool {
        self.power_supplier == 1
    }

    pub fn update_state(&mut self, state: &ElectricalVehicleState) {
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
        if let Some(p) = state.power_supplier {
            self.power_supplier = p;
        }
    }

    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("ElectricalVehicle");
        checks
            .flag("active", self.active)
            .flag("power_supplier", self.power_supplier)
            .positive("voltage", self.voltage)
            .non_negative("capacity", self.capacity)
            .non_negative("charge_current", self.charge_current)
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

impl ElectricalVehicleState {
    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("ElectricalVehicleState");
        if let Some(active) = self.active {
            checks.flag("active", active);
        }
        if let Some(p) = self.power_supplier {
            checks.flag("power_supplier", p);
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

impl GridElement for ElectricalVehicle {
    fn active(&self) -> u8 {
        self.active
    }
}

impl EnergyStorage for ElectricalVehicle {
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
