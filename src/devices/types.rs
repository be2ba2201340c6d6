//! Common traits and checks for the devices an agent owns.

use crate::error::{Result, SimError};

/// A device that can be switched on or off through its `active` flag.
///
/// The flag is carried as an integer (`0` or `1`) to match the serialized
/// grid-element format.
pub trait GridElement {
    /// Raw activity flag.
    fn active(&self) -> u8;

    /// Returns `true` iff the device is switched on.
    fn is_active(&self) -> bool {
        self.active() == 1
    }
}

/// A battery-like store of charge that can deliver (erogate) and absorb current.
///
/// Charge is tracked in coulomb-equivalent units: `status` grows by
/// `current * time_scale` on charge and shrinks by the amps required to
/// deliver a given power on erogation. Implementors keep
/// `0 <= status <= capacity`.
pub trait EnergyStorage: GridElement {
    /// Terminal voltage used to turn power into current.
    fn voltage(&self) -> f64;

    /// Maximum stored charge.
    fn capacity(&self) -> f64;

    /// Inverter efficiency in `[0, 1]`.
    fn inverter_efficiency(&self) -> f64;

    /// Currently stored charge.
    fn status(&self) -> f64;

    /// Overwrites the stored charge.
    fn set_status(&mut self, status: f64);

    /// Tries to deliver `power` for `time_scale` units of time.
    ///
    /// Delivery is all-or-nothing: when the stored charge cannot cover the
    /// required amps the status is left untouched and `false` is returned.
    fn erogate(&mut self, power: f64, time_scale: f64) -> bool {
        let required_amps = power / self.voltage() / self.inverter_efficiency() * time_scale;
        let status = self.status();
        if status >= required_amps {
            self.set_status(status - required_amps);
            true
        } else {
            false
        }
    }

    /// Adds `current * time_scale` to the stored charge, clamping to
    /// `[0, capacity]`. A negative current never drains below empty.
    ///
    /// # Returns
    ///
    /// The overflow that did not fit (0 when everything was absorbed), so the
    /// caller can redirect it elsewhere.
    fn charge(&mut self, current: f64, time_scale: f64) -> f64 {
        let total_coulombs = current * time_scale;
        let status = self.status();
        let capacity = self.capacity();
        if status + total_coulombs <= capacity {
            self.set_status((status + total_coulombs).max(0.0));
            return 0.0;
        }
        let energy_left = total_coulombs - (capacity - status);
        self.set_status(capacity);
        energy_left
    }
}

/// Accumulates range violations for one serialized entity.
///
/// Each check records a human-readable issue; [`FieldChecks::finish`] turns
/// a non-empty list into a [`SimError::Validation`].
#[derive(Debug)]
pub struct FieldChecks {
    entity: String,
    issues: Vec<String>,
}

impl FieldChecks {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            issues: Vec::new(),
        }
    }

    /// Requires an on/off flag to be 0 or 1.
    pub fn flag(&mut self, field: &str, value: u8) -> &mut Self {
        if value > 1 {
            self.issues.push(format!("{field} must be 0 or 1, got {value}"));
        }
        self
    }

    /// Requires a fraction to lie in `[0, 1]`.
    pub fn unit_interval(&mut self, field: &str, value: f64) -> &mut Self {
        if !(0.0..=1.0).contains(&value) {
            self.issues.push(format!("{field} must be in [0, 1], got {value}"));
        }
        self
    }

    pub fn positive(&mut self, field: &str, value: f64) -> &mut Self {
        if value.is_nan() || value <= 0.0 {
            self.issues.push(format!("{field} must be > 0, got {value}"));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        if value.is_nan() || value < 0.0 {
            self.issues.push(format!("{field} must be >= 0, got {value}"));
        }
        self
    }

    /// Records a free-form issue.
    pub fn issue(&mut self, message: impl Into<String>) -> &mut Self {
        self.issues.push(message.into());
        self
    }

    /// Folds in the issues found by a nested entity, prefixing them with `field`.
    pub fn nested(&mut self, field: &str, other: FieldChecks) -> &mut Self {
        self.issues
            .extend(other.issues.into_iter().map(|i| format!("{field}.{i}")));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Fails with every recorded issue joined into one message.
    pub fn finish(self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(SimError::validation(self.entity, self.issues.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cell {
        status: f64,
    }

    impl GridElement for Cell {
        fn active(&self) -> u8 {
            1
        }
    }

    impl EnergyStorage for Cell {
        fn voltage(&self) -> f64 {
            10.0
        }
        fn capacity(&self) -> f64 {
            100.0
        }
        fn inverter_efficiency(&self) -> f64 {
            0.5
        }
        fn status(&self) -> f64 {
            self.status
        }
        fn set_status(&mut self, status: f64) {
            self.status = status;
        }
    }

    #[test]
    fn test_erogate_deducts_required_amps() {
        let mut cell = Cell { status: 50.0 };
        // 100 W / 10 V / 0.5 = 20 A over one time unit
        assert!(cell.erogate(100.0, 1.0));
        assert!((cell.status - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_erogate_refuses_without_partial_delivery() {
        let mut cell = Cell { status: 10.0 };
        assert!(!cell.erogate(100.0, 1.0));
        assert_eq!(cell.status, 10.0);
    }

    #[test]
    fn test_charge_returns_overflow() {
        let mut cell = Cell { status: 90.0 };
        let left = cell.charge(25.0, 1.0);
        assert_eq!(cell.status, 100.0);
        assert!((left - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_charge_below_capacity_has_no_overflow() {
        let mut cell = Cell { status: 10.0 };
        assert_eq!(cell.charge(5.0, 2.0), 0.0);
        assert_eq!(cell.status, 20.0);
    }

    #[test]
    fn test_negative_charge_stops_at_empty() {
        let mut cell = Cell { status: 5.0 };
        assert_eq!(cell.charge(-20.0, 1.0), 0.0);
        assert_eq!(cell.status, 0.0);
    }

    #[test]
    fn test_checks_collect_every_issue() {
        let mut checks = FieldChecks::new("Battery");
        checks.flag("active", 3).unit_interval("contribution_active", 1.5);
        assert!(!checks.is_empty());
        let err = checks.finish().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("active must be 0 or 1"));
        assert!(msg.contains("contribution_active"));
    }
}
