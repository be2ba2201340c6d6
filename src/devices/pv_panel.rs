use serde::{Deserialize, Serialize};

use crate::devices::types::{FieldChecks, GridElement};

/// A photovoltaic array modelled at constant power for one tick.
///
/// Output depends only on the panel's fields:
/// `unit_area * series * parallels * efficiency * solar_irradiance`.
///
/// # Examples
///
/// ```
/// use lvgrid_sim::devices::PvPanel;
///
/// let panel = PvPanel {
///     unit_area: 1.0,
///     series: 10.0,
///     parallels: 5.0,
///     efficiency: 0.8,
///     solar_irradiance: 100.0,
///     battery_coupling_efficiency: 1.0,
///     heating_contribution: 0.0,
///     active: 1,
/// };
/// assert_eq!(panel.erogate(), 4000.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PvPanel {
    pub unit_area: f64,
    pub series: f64,
    pub parallels: f64,
    pub efficiency: f64,
    /// Irradiance on the panel (W/m²).
    pub solar_irradiance: f64,
    /// Fraction of PV power that reaches the battery as charging current.
    pub battery_coupling_efficiency: f64,
    /// Fraction of PV power diverted to the water tank when it is active.
    pub heating_contribution: f64,
    pub active: u8,
}

/// Partial update for a [`PvPanel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PvPanelState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar_irradiance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_contribution: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u8>,
}

impl PvPanel {
    /// Power produced by the array (W).
    pub fn erogate(&self) -> f64 {
        self.unit_area * self.series * self.parallels * self.efficiency * self.solar_irradiance
    }

    pub fn update_state(&mut self, state: &PvPanelState) {
        if let Some(active) = state.active {
            self.active = active;
        }
        if let Some(irradiance) = state.solar_irradiance {
            self.solar_irradiance = irradiance;
        }
        if let Some(h) = state.heating_contribution {
            self.heating_contribution = h;
        }
    }

    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("PvPanel");
        checks
            .flag("active", self.active)
            .non_negative("unit_area", self.unit_area)
            .non_negative("series", self.series)
            .non_negative("parallels", self.parallels)
            .unit_interval("efficiency", self.efficiency)
            .unit_interval("battery_coupling_efficiency", self.battery_coupling_efficiency)
            .unit_interval("heating_contribution", self.heating_contribution)
            .non_negative("solar_irradiance", self.solar_irradiance);
        checks
    }
}

impl PvPanelState {
    pub fn checks(&self) -> FieldChecks {
        let mut checks = FieldChecks::new("PvPanelState");
        if let Some(active) = self.active {
            checks.flag("active", active);
        }
        if let Some(h) = self.heating_contribution {
            checks.unit_interval("heating_contribution", h);
        }
        if let Some(i) = self.solar_irradiance {
            checks.non_negative("solar_irradiance", i);
        }
        checks
    }
}

impl GridElement for PvPanel {
    fn active(&self) -> u8 {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> PvPanel {
        PvPanel {
            unit_area: 1.0,
            series: 10.0,
            parallels: 5.0,
            efficiency: 0.8,
            solar_irradiance: 100.0,
            battery_coupling_efficiency: 1.0,
            heating_contribution: 0.5,
            active: 1,
        }
    }

    #[test]
    fn test_erogate_is_pure() {
        let p = panel();
        assert_eq!(p.erogate(), 4000.0);
        assert_eq!(p.erogate(), 4000.0);
        assert_eq!(p, panel());
    }

    #[test]
    fn test_checks_reject_negative_geometry() {
        let mut p = panel();
        p.unit_area = -1.0;
        assert!(p.checks().finish().is_err());
    }

    #[test]
    fn test_irradiance_update_changes_output() {
        let mut p = panel();
        p.update_state(&PvPanelState {
            solar_irradiance: Some(0.0),
            ..Default::default()
        });
        assert_eq!(p.erogate(), 0.0);
        assert_eq!(p.heating_contribution, 0.5);
    }
}
