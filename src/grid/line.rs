use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// A distribution line segment, fixed for the whole run.
///
/// Resistance and reactance are in ohms for the full segment. The optional
/// shunt branch is only used by the non-linear solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Line {
    #[serde(default)]
    pub name: String,
    pub resistance: f64,
    pub reactance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shunt_resistance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shunt_reactance: Option<f64>,
}

impl Line {
    pub fn new(name: impl Into<String>, resistance: f64, reactance: f64) -> Self {
        Self {
            name: name.into(),
            resistance,
            reactance,
            shunt_resistance: None,
            shunt_reactance: None,
        }
    }

    /// Parses a line from its JSON form and names it `name`.
    pub fn load(name: &str, value: &serde_json::Value) -> Result<Self> {
        let mut line: Line = serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation(format!("Line {name}"), e.to_string()))?;
        line.name = name.to_string();
        Ok(line)
    }

    /// Series impedance `R + jX`.
    pub fn impedance(&self) -> Complex64 {
        Complex64::new(self.resistance, self.reactance)
    }

    /// Shunt admittance of the whole segment, if the line carries shunt parameters.
    pub fn shunt_admittance(&self) -> Option<Complex64> {
        if self.shunt_resistance.is_none() && self.shunt_reactance.is_none() {
            return None;
        }
        let z = Complex64::new(
            self.shunt_resistance.unwrap_or(0.0),
            self.shunt_reactance.unwrap_or(0.0),
        );
        if z.norm() == 0.0 { None } else { Some(z.inv()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_without_shunt() {
        let line = Line::load("B0", &json!({"resistance": 0.1, "reactance": 0.05})).unwrap();
        assert_eq!(line.name, "B0");
        assert_eq!(line.impedance(), Complex64::new(0.1, 0.05));
        assert!(line.shunt_admittance().is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut line = Line::new("B3", 0.2, 0.04);
        line.shunt_reactance = Some(-500.0);
        let text = serde_json::to_string(&line).unwrap();
        let back: Line = serde_json::from_str(&text).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_shunt_admittance() {
        let mut line = Line::new("B1", 0.1, 0.1);
        line.shunt_reactance = Some(-2.0);
        let y = line.shunt_admittance().unwrap();
        assert!((y - Complex64::new(0.0, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn test_load_missing_reactance_fails() {
        let err = Line::load("B0", &json!({"resistance": 0.1})).unwrap_err();
        assert!(matches!(err, SimError::Validation { .. }));
    }
}
