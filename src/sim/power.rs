//! Electrical helpers shared by the step processor and the solvers.

use num_complex::Complex64;

/// Nominal voltage at the point of common coupling (V).
pub const PCC_VOLTAGE: f64 = 230.0;

/// Length of one tick in the units the device models integrate over.
pub const TIME_SCALE: f64 = 1.0;

/// Share of incoming power lost on the way to the agent.
pub const INCOMING_LINE_LOSS: f64 = 0.05;

/// Impedance reported for an agent that draws no power.
pub const OPEN_CIRCUIT_IMPEDANCE: f64 = 1e9;

/// Reactive power for an active power `p` at power factor `pf`.
pub fn reactive_power(power_rating: f64, power_factor: f64) -> f64 {
    power_rating * power_factor.clamp(-1.0, 1.0).acos().tan()
}

/// Complex power `P + jQ`.
pub fn apparent_power(power_rating: f64, power_factor: f64) -> Complex64 {
    Complex64::new(power_rating, reactive_power(power_rating, power_factor))
}

/// Equivalent load impedance `conj(V^2 / S)`.
///
/// An agent with zero apparent power is treated as an open circuit.
///
/// # Examples
///
/// ```
/// use lvgrid_sim::sim::power::impedance;
///
/// let z = impedance(230.0, 0.0, 1.0);
/// assert_eq!(z.re, 1e9);
/// assert_eq!(z.im, 0.0);
/// ```
pub fn impedance(voltage_rating: f64, power_rating: f64, power_factor: f64) -> Complex64 {
    let s = apparent_power(power_rating, power_factor);
    if s.norm() == 0.0 {
        return Complex64::new(OPEN_CIRCUIT_IMPEDANCE, 0.0);
    }
    (Complex64::new(voltage_rating * voltage_rating, 0.0) / s).conj()
}

/// Current drawn by complex power `power` at real voltage `voltage`: `conj(S / V)`.
pub fn current_from_power(voltage: f64, power: Complex64) -> Complex64 {
    (power / voltage).conj()
}

/// Incoming power after the fixed line-loss haircut, or 0 when nothing comes in.
pub fn effective_incoming_power(incoming_power: f64) -> f64 {
    if incoming_power > 0.0 {
        incoming_power - incoming_power * INCOMING_LINE_LOSS
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_power_factor_has_no_reactive_part() {
        assert_eq!(reactive_power(1000.0, 1.0), 0.0);
    }

    #[test]
    fn test_reactive_power_at_pf_08() {
        // tan(acos(0.8)) = 0.75
        assert!((reactive_power(1000.0, 0.8) - 750.0).abs() < 1e-9);
    }

    #[test]
    fn test_resistive_impedance() {
        let z = impedance(230.0, 1190.0, 1.0);
        assert!((z.re - 230.0 * 230.0 / 1190.0).abs() < 1e-9);
        assert!(z.im.abs() < 1e-12);
    }

    #[test]
    fn test_inductive_load_has_positive_reactance() {
        let z = impedance(230.0, 1000.0, 0.8);
        assert!(z.im > 0.0);
    }

    #[test]
    fn test_current_from_power() {
        let i = current_from_power(230.0, Complex64::new(2300.0, 230.0));
        assert!((i - Complex64::new(10.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_effective_incoming_power() {
        assert_eq!(effective_incoming_power(1500.0), 1425.0);
        assert_eq!(effective_incoming_power(-3.0), 0.0);
    }
}
