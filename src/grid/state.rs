use serde::{Deserialize, Serialize};

use crate::devices::{
    BatteryState, ElectricalVehicleState, FieldChecks, PvPanelState, WaterTankState,
    WindGeneratorState,
};
use crate::error::{Result, SimError};

/// A sparse partial update for an [`Agent`](crate::grid::Agent).
///
/// Every field is optional. Applying a `State` overwrites only the fields
/// that are present, so `State::default()` is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_inject_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_power_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_panel: Option<PvPanelState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_generator: Option<WindGeneratorState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrical_vehicle: Option<ElectricalVehicleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_tank: Option<WaterTankState>,
}

impl State {
    /// Parses and range-checks a state payload.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Validation`] on unknown keys, wrongly typed values,
    /// or out-of-range flags and fractions.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let state: State = serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation("State", e.to_string()))?;
        state.checks().finish()?;
        Ok(state)
    }

    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("State");
        if let Some(pf) = self.power_factor {
            checks.unit_interval("power_factor", pf);
        }
        if let Some(pf) = self.request_power_factor {
            checks.unit_interval("request_power_factor", pf);
        }
        if let Some(v) = self.voltage_rating {
            checks.positive("voltage_rating", v);
        }
        if let Some(b) = &self.battery {
            checks.nested("battery", b.checks());
        }
        if let Some(p) = &self.pv_panel {
            checks.nested("pv_panel", p.checks());
        }
        if let Some(w) = &self.wind_generator {
            checks.nested("wind_generator", w.checks());
        }
        if let Some(ev) = &self.electrical_vehicle {
            checks.nested("electrical_vehicle", ev.checks());
        }
        if let Some(t) = &self.water_tank {
            checks.nested("water_tank", t.checks());
        }
        checks
    }
}
