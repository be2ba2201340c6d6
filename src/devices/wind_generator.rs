use serde::{Deserialize, Serialize};

use crate::devices::types::{FieldChecks, GridElement};

/// A small wind turbine; its whole output is routed to the battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindGenerator {
    pub power_coefficient: f64,
    /// Air density (kg/m³).
    pub air_density: f64,
    /// Swept rotor area (m²).
    pub area: f64,
    /// Wind speed (m/s).
    pub wind_speed: f64,
    pub battery_coupling_efficiency: f64,
    pub active: u8,
}

/// Partial update for a [`WindGenerator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindGeneratorState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u8>,
}

impl WindGenerator {
    /// Power extracted from the wind (W): `rho * cp * A * v^3 / 2`.
    pub fn erogate(&self) -> f64 {
        self.air_density * self.power_coefficient * self.area * self.wind_speed.powi(3) / 2.0
    }

    pub fn update_state(&mut self, state: &WindGeneratorState) {
        if let Some(active) = state.active {
            self.active = active;
        }
        if let Some(speed) = state.wind_speed {
            self.wind_speed = speed;
        }
    }

    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("WindGenerator");
        checks
            .flag("active", self.active)
            .unit_interval("battery_coupling_efficiency", self.battery_coupling_efficiency)
            .non_negative("power_coefficient", self.power_coefficient)
            .non_negative("air_density", self.air_density)
            .non_negative("area", self.area)
            .non_negative("wind_speed", self.wind_speed);
        checks
    }
}

impl WindGeneratorState {
    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("WindGeneratorState");
        if let Some(active) = self.active {
            checks.flag("active", active);
        }
        if let Some(speed) = self.wind_speed {
            checks.non_negative("wind_speed", speed);
        }
        checks
    }
}

impl GridElement for WindGenerator {
    fn active(&self) -> u8 {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turbine(wind_speed: f64) -> WindGenerator {
        WindGenerator {
            power_coefficient: 0.4,
            air_density: 1.225,
            area: 10.0,
            wind_speed,
            battery_coupling_efficiency: 1.0,
            active: 1,
        }
    }

    #[test]
    fn test_output_is_cubic_in_wind_speed() {
        let slow = turbine(2.0).erogate();
        let fast = turbine(4.0).erogate();
        assert!((fast / slow - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_value() {
        // 1.225 * 0.4 * 10 * 125 / 2
        assert!((turbine(5.0).erogate() - 306.25).abs() < 1e-9);
    }

    #[test]
    fn test_calm_produces_nothing() {
        assert_eq!(turbine(0.0).erogate(), 0.0);
    }

    #[test]
    fn test_negative_wind_speed_rejected() {
        let err = turbine(-5.0).checks().finish().unwrap_err();
        assert!(err.to_string().contains("wind_speed must be >= 0"));

        let mut backwards = turbine(5.0);
        backwards.power_coefficient = -0.4;
        assert!(backwards.checks().finish().is_err());

        let state = WindGeneratorState {
            wind_speed: Some(-1.0),
            active: None,
        };
        assert!(state.checks().finish().is_err());
    }
}
