//! Per-agent, per-tick power bookkeeping.
//!
//! [`process_step`] turns an agent's device states into the demand and
//! injection it presents to the grid, updating battery, EV and water-tank
//! charge along the way. The order of the stages matters: each one works on
//! the totals left by the previous one.

use num_complex::Complex64;

use crate::devices::{EnergyStorage, GridElement};
use crate::grid::Agent;
use crate::sim::power::{effective_incoming_power, impedance, reactive_power};
use crate::sim::types::StepOutcome;

/// Damping applied to the reactive share when sizing a battery draw.
pub const BATTERY_REACTIVE_DAMPING: f64 = 1e-2;

/// What [`manage_battery`] leaves behind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryOutcome {
    pub total_active_power: f64,
    pub total_power_factor: f64,
    pub demand_power: Complex64,
    pub inject_power: Complex64,
    pub power_from_battery: Complex64,
}

/// Advances one agent by one tick.
///
/// # Arguments
///
/// * `agent` - The agent; its battery, EV and water tank are mutated in place
/// * `time_scale` - Length of the tick
///
/// # Returns
///
/// The agent's equivalent impedance, demand, injection, battery output and
/// PV production for this tick.
pub fn process_step(agent: &mut Agent, time_scale: f64) -> StepOutcome {
    let pv_power = if agent.pv_panel.is_active() {
        agent.pv_panel.erogate()
    } else {
        0.0
    };
    let wind_power_to_battery = if agent.wind_generator.is_active() {
        agent.wind_generator.erogate()
    } else {
        0.0
    };

    let pv_power_to_heating = if agent.water_tank.is_active() {
        pv_power * agent.pv_panel.heating_contribution
    } else {
        0.0
    };
    if pv_power_to_heating > 0.0 {
        agent.water_tank.charge(pv_power_to_heating, time_scale);
    }
    let pv_power_to_battery = pv_power - pv_power_to_heating;

    let (total_power, request_inject_power) = manage_power(agent);
    let total_power = manage_ev(agent, total_power, time_scale);
    let battery = manage_battery(
        agent,
        total_power,
        request_inject_power,
        (pv_power_to_battery, wind_power_to_battery),
        time_scale,
    );

    StepOutcome {
        name: agent.name.clone(),
        impedance: impedance(
            agent.voltage_rating,
            battery.total_active_power,
            battery.total_power_factor,
        ),
        demand_power: battery.demand_power,
        inject_power: battery.inject_power,
        power_from_battery: battery.power_from_battery,
        pv_power,
    }
}

/// Resolves rated demand, incoming power and injection requests.
///
/// # Returns
///
/// `(total_power, request_inject_power)` as complex powers. Any incoming
/// power suppresses injection; when it also covers the rated demand the
/// agent absorbs all of it as purely active demand.
pub fn manage_power(agent: &Agent) -> (Complex64, Complex64) {
    let rated = Complex64::new(
        agent.power_rating,
        reactive_power(agent.power_rating, agent.power_factor),
    );

    if agent.incoming_power > 0.0 {
        let incoming = effective_incoming_power(agent.incoming_power);
        let total = if incoming - agent.power_rating >= 0.0 {
            Complex64::new(incoming, 0.0)
        } else {
            rated
        };
        return (total, Complex64::new(0.0, 0.0));
    }

    let request = Complex64::new(
        agent.request_inject_power,
        reactive_power(agent.request_inject_power, agent.request_power_factor),
    );
    (rated, request)
}

/// Lets the EV either cover part of the demand or charge from the grid.
pub fn manage_ev(agent: &mut Agent, total_power: Complex64, time_scale: f64) -> Complex64 {
    let mut total = total_power;
    let ev = &mut agent.electrical_vehicle;
    if !ev.is_active() {
        return total;
    }

    if ev.is_supplier() {
        let desired = Complex64::new(
            total.re * ev.contribution_active,
            total.im * ev.contribution_reactive,
        );
        if ev.erogate(desired.norm(), time_scale) {
            total -= desired;
        }
    } else {
        total.re += ev.charge_current * agent.voltage_rating;
        let current = ev.charge_current;
        ev.charge(current, time_scale);
    }
    total
}

/// Applies the battery: rated-demand sharing, injection and charging.
///
/// The share drawn from the battery is sized on the *rated* demand, not on
/// the EV-adjusted total. Charge that does not fit in the battery heats the
/// water tank, whether or not the tank is active.
pub fn manage_battery(
    agent: &mut Agent,
    total_power: Complex64,
    request_inject_power: Complex64,
    power_to_battery: (f64, f64),
    time_scale: f64,
) -> BatteryOutcome {
    let rated_active = agent.power_rating;
    let rated_reactive = reactive_power(rated_active, agent.power_factor);

    let mut total = total_power;
    let mut inject = Complex64::new(0.0, 0.0);
    let mut from_battery = Complex64::new(0.0, 0.0);

    if !agent.battery.is_active() {
        return BatteryOutcome {
            total_active_power: total.re,
            total_power_factor: power_factor_of(total),
            demand_power: total,
            inject_power: inject,
            power_from_battery: from_battery,
        };
    }

    let incoming = effective_incoming_power(agent.incoming_power);
    let power_surplus = incoming - rated_active;
    let battery = &mut agent.battery;

    if power_surplus <= 0.0 {
        let desired = Complex64::new(
            rated_active * battery.contribution_active,
            rated_reactive * battery.contribution_reactive,
        );
        let drawn = Complex64::new(desired.re, BATTERY_REACTIVE_DAMPING * desired.im).norm();
        if battery.erogate(drawn, time_scale) {
            from_battery = desired;
            total -= desired;
        }
    }

    if incoming <= 0.0 && battery.erogate(request_inject_power.norm(), time_scale) {
        inject = request_inject_power;
        from_battery += request_inject_power;
    }

    let (pv_power_to_battery, wind_power_to_battery) = power_to_battery;
    let surplus_current = if power_surplus > 0.0 {
        power_surplus / battery.voltage
    } else {
        0.0
    };
    let pv_current =
        pv_power_to_battery * agent.pv_panel.battery_coupling_efficiency / battery.voltage;
    let wind_current =
        wind_power_to_battery * agent.wind_generator.battery_coupling_efficiency / battery.voltage;
    let energy_left = battery.charge(pv_current + wind_current + surplus_current, time_scale);
    if energy_left > 0.0 {
        agent.water_tank.charge(energy_left / time_scale, time_scale);
    }

    let demand = if total.norm() != 0.0 {
        total
    } else {
        Complex64::new(0.0, 0.0)
    };
    BatteryOutcome {
        total_active_power: total.re,
        total_power_factor: power_factor_of(total),
        demand_power: demand,
        inject_power: inject,
        power_from_battery: from_battery,
    }
}

fn power_factor_of(power: Complex64) -> f64 {
    let apparent = power.norm();
    if apparent > 0.0 { power.re / apparent } else { 1.0 }
}
