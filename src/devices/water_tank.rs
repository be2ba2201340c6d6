use serde::{Deserialize, Serialize};

use crate::devices::types::{FieldChecks, GridElement};

/// Hottest the tank is allowed to get (°C).
pub const MAX_WATER_TEMP: f64 = 60.0;

/// W to BTU/h conversion used by the heating model.
const WATT_TO_BTU_PER_HOUR: f64 = 3.412;

/// A domestic hot-water tank heated by diverted PV power or battery overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaterTank {
    pub capacity: f64,
    /// Water temperature (°C), never above [`MAX_WATER_TEMP`].
    pub temp: f64,
    pub active: u8,
}

/// Partial update for a [`WaterTank`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaterTankState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u8>,
}

impl WaterTank {
    /// Heats the water with `power` for `time_scale` units of time.
    ///
    /// `temp += power * 3.412 / (4 * capacity) * time_scale`, capped at 60 °C.
    pub fn charge(&mut self, power: f64, time_scale: f64) {
        self.temp += power * WATT_TO_BTU_PER_HOUR / (4.0 * self.capacity) * time_scale;
        if self.temp > MAX_WATER_TEMP {
            self.temp = MAX_WATER_TEMP;
        }
    }

    pub fn update_state(&mut self, state: &WaterTankState) {
        if let Some(active) = state.active {
            self.active = active;
        }
        if let Some(temp) = state.temp {
            self.temp = temp.min(MAX_WATER_TEMP);
        }
    }

    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("WaterTank");
        checks.flag("active", self.active).positive("capacity", self.capacity);
        if self.temp > MAX_WATER_TEMP {
            checks.issue(format!("temp must be <= {MAX_WATER_TEMP}, got {}", self.temp));
        }
        checks
    }
}

impl WaterTankState {
    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("WaterTankState");
        if let Some(active) = self.active {
            checks.flag("active", active);
        }
        checks
    }
}

impl GridElement for WaterTank {
    fn active(&self) -> u8 {
        self.active
    }
}
