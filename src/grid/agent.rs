use serde::{Deserialize, Serialize};

use crate::devices::{Battery, ElectricalVehicle, FieldChecks, PvPanel, WaterTank, WindGenerator};
use crate::error::{Result, SimError};
use crate::grid::state::State;

fn unity() -> f64 {
    1.0
}

/// A grid-connected prosumer and the devices it owns.
///
/// All five devices are always present; an uninstalled device is modelled
/// as inactive. The `name` is the key the agent is loaded under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Agent {
    #[serde(default)]
    pub name: String,
    /// Nominal voltage at the agent's connection point (V).
    pub voltage_rating: f64,
    /// Rated active demand (W).
    pub power_rating: f64,
    pub power_factor: f64,
    /// Power pushed onto the agent by network overproduction (W).
    #[serde(default)]
    pub incoming_power: f64,
    /// Active power a cluster asks this agent to inject (W).
    #[serde(default)]
    pub request_inject_power: f64,
    #[serde(default = "unity")]
    pub request_power_factor: f64,
    pub battery: Battery,
    pub pv_panel: PvPanel,
    pub wind_generator: WindGenerator,
    pub electrical_vehicle: ElectricalVehicle,
    pub water_tank: WaterTank,
}

impl Agent {
    /// Parses an agent from its JSON form, names it and range-checks it.
    ///
    /// # Errors
    ///
    /// [`SimError::Validation`] when a device is missing, a field has the
    /// wrong type or a value is out of range.
    pub fn load(name: &str, value: &serde_json::Value) -> Result<Self> {
        let mut agent: Agent = serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation(format!("Agent {name}"), e.to_string()))?;
        agent.name = name.to_string();
        agent.checks().finish()?;
        Ok(agent)
    }

    /// Applies a partial update: only fields present in `state` change.
    pub fn update_state(&mut self, state: &State) {
        if let Some(v) = state.voltage_rating {
            self.voltage_rating = v;
        }
        if let Some(p) = state.power_rating {
            self.power_rating = p;
        }
        if let Some(pf) = state.power_factor {
            self.power_factor = pf;
        }
        if let Some(p) = state.incoming_power {
            self.incoming_power = p;
        }
        if let Some(p) = state.request_inject_power {
            self.request_inject_power = p;
        }
        if let Some(pf) = state.request_power_factor {
            self.request_power_factor = pf;
        }
        if let Some(b) = &state.battery {
            self.battery.update_state(b);
        }
        if let Some(p) = &state.pv_panel {
            self.pv_panel.update_state(p);
        }
        if let Some(w) = &state.wind_generator {
            self.wind_generator.update_state(w);
        }
        if let Some(ev) = &state.electrical_vehicle {
            self.electrical_vehicle.update_state(ev);
        }
        if let Some(t) = &state.water_tank {
            self.water_tank.update_state(t);
        }
    }

    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new(format!("Agent {}", self.name));
        checks
            .positive("voltage_rating", self.voltage_rating)
            .unit_interval("power_factor", self.power_factor)
            .unit_interval("request_power_factor", self.request_power_factor)
            .nested("battery", self.battery.checks())
            .nested("pv_panel", self.pv_panel.checks())
            .nested("wind_generator", self.wind_generator.checks())
            .nested("electrical_vehicle", self.electrical_vehicle.checks())
            .nested("water_tank", self.water_tank.checks());
        checks
    }
}
