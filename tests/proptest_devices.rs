//! Property-based tests for device and agent bookkeeping.
//!
//! Random charge/erogate sequences and random agents are driven through
//! the device models to check that stored charge and water temperature
//! stay inside their physical bounds.

mod common;

use common::agent_json;
use proptest::prelude::*;
use serde_json::json;

use lvgrid_sim::devices::water_tank::MAX_WATER_TEMP;
use lvgrid_sim::devices::{Battery, EnergyStorage, WaterTank};
use lvgrid_sim::grid::{Agent, State};
use lvgrid_sim::sim::power::TIME_SCALE;
use lvgrid_sim::sim::step::process_step;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum Op {
    Charge(f64),
    Erogate(f64),
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (0.0..500.0f64).prop_map(Op::Charge),
            (0.0..5000.0f64).prop_map(Op::Erogate),
        ],
        1..=max_ops,
    )
}

fn arb_battery() -> impl Strategy<Value = Battery> {
    (12.0..48.0f64, 1.0..100_000.0f64, 0.0..=1.0f64, 0.5..=1.0f64).prop_map(
        |(voltage, capacity, fill, efficiency)| Battery {
            voltage,
            capacity,
            status: capacity * fill,
            contribution_active: 0.5,
            contribution_reactive: 0.0,
            inverter_input_voltage: None,
            inverter_output_voltage: None,
            inverter_efficiency: efficiency,
            active: 1,
        },
    )
}

fn arb_agent() -> impl Strategy<Value = Agent> {
    (
        0.0..5000.0f64,
        0.0..3000.0f64,
        0.0..=1.0f64,
        0.0..=1.0f64,
        0u8..=1,
        0u8..=1,
        0u8..=1,
    )
        .prop_map(|(rating, incoming, fill, heating, pv, wind, tank)| {
            let mut body = agent_json();
            body["power_rating"] = json!(rating);
            body["incoming_power"] = json!(incoming);
            body["battery"]["active"] = json!(1);
            body["battery"]["status"] = json!(1_296_000.0 * fill);
            body["pv_panel"]["active"] = json!(pv);
            body["pv_panel"]["heating_contribution"] = json!(heating);
            body["wind_generator"]["active"] = json!(wind);
            body["water_tank"]["active"] = json!(tank);
            Agent::load("AGENT0", &body).expect("generated agent should validate")
        })
}

/// Agents drawn from wide ranges, including some out-of-range values, kept
/// only when they pass validation.
fn arb_valid_agent() -> impl Strategy<Value = Agent> {
    (
        (0.0..5000.0f64, -100.0..3000.0f64, 0.0..=1.0f64, 0.0..=1.0f64),
        (0.0..=1.0f64, 0.0..=1.0f64, 0u8..=1, 0u8..=1),
        (-1.0..20.0f64, -0.1..1.0f64, -10.0..1000.0f64),
        (-1.0..30.0f64, 0.0..=1.0f64, 0u8..=1, 0u8..=1),
    )
        .prop_filter_map(
            "agent must validate",
            |(
                (rating, incoming, battery_fill, contribution),
                (ev_fill, heating, pv, wind),
                (wind_speed, power_coefficient, irradiance),
                (charge_current, ev_contribution, ev_active, supplier),
            )| {
                let mut body = agent_json();
                body["power_rating"] = json!(rating);
                body["incoming_power"] = json!(incoming);
                body["request_inject_power"] = json!(rating / 2.0);
                body["battery"]["active"] = json!(1);
                body["battery"]["status"] = json!(1_296_000.0 * battery_fill);
                body["battery"]["contribution_active"] = json!(contribution);
                body["pv_panel"]["active"] = json!(pv);
                body["pv_panel"]["heating_contribution"] = json!(heating);
                body["pv_panel"]["solar_irradiance"] = json!(irradiance);
                body["wind_generator"]["active"] = json!(wind);
                body["wind_generator"]["wind_speed"] = json!(wind_speed);
                body["wind_generator"]["power_coefficient"] = json!(power_coefficient);
                body["electrical_vehicle"]["active"] = json!(ev_active);
                body["electrical_vehicle"]["power_supplier"] = json!(supplier);
                body["electrical_vehicle"]["status"] = json!(1_296_000.0 * ev_fill);
                body["electrical_vehicle"]["contribution_active"] = json!(ev_contribution);
                body["electrical_vehicle"]["charge_current"] = json!(charge_current);
                body["water_tank"]["active"] = json!(1);
                Agent::load("AGENT0", &body).ok()
            },
        )
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Stored charge never leaves [0, capacity].
    #[test]
    fn prop_battery_status_bounded(mut battery in arb_battery(), ops in arb_ops(40)) {
        for op in ops {
            match op {
                Op::Charge(current) => {
                    battery.charge(current, TIME_SCALE);
                }
                Op::Erogate(power) => {
                    battery.erogate(power, TIME_SCALE);
                }
            }
            prop_assert!(battery.status >= 0.0);
            prop_assert!(battery.status <= battery.capacity);
        }
    }

    /// Erogation is all-or-nothing.
    #[test]
    fn prop_failed_erogate_keeps_status(battery in arb_battery(), power in 0.0..50_000.0f64) {
        let mut after = battery.clone();
        let required = power / battery.voltage / battery.inverter_efficiency * TIME_SCALE;
        let delivered = after.erogate(power, TIME_SCALE);
        prop_assert_eq!(delivered, battery.status >= required);
        if !delivered {
            prop_assert_eq!(after.status, battery.status);
        }
    }

    /// Whatever does not fit is handed back.
    #[test]
    fn prop_charge_conserves_charge(battery in arb_battery(), current in 0.0..100_000.0f64) {
        let mut after = battery.clone();
        let left = after.charge(current, TIME_SCALE);
        prop_assert!(left >= 0.0);
        let total = battery.status + current * TIME_SCALE;
        prop_assert!((after.status + left - total).abs() <= 1e-6 * total.max(1.0));
    }

    /// Heating never pushes the tank above its cap.
    #[test]
    fn prop_water_tank_capped(
        capacity in 1.0..500.0f64,
        temp in 0.0..=60.0f64,
        powers in proptest::collection::vec(0.0..10_000.0f64, 1..20),
    ) {
        let mut tank = WaterTank { capacity, temp, active: 1 };
        for power in powers {
            let before = tank.temp;
            tank.charge(power, TIME_SCALE);
            prop_assert!(tank.temp <= MAX_WATER_TEMP);
            prop_assert!(tank.temp >= before);
        }
    }

    /// An empty state update changes nothing.
    #[test]
    fn prop_empty_state_is_identity(agent in arb_agent()) {
        let mut updated = agent.clone();
        updated.update_state(&State::default());
        prop_assert_eq!(updated, agent);
    }

    /// A full tick keeps the battery and tank in range.
    #[test]
    fn prop_step_keeps_devices_in_range(mut agent in arb_agent()) {
        for _ in 0..5 {
            let out = process_step(&mut agent, TIME_SCALE);
            prop_assert!(out.demand_power.re >= 0.0);
            prop_assert!(agent.battery.status >= 0.0);
            prop_assert!(agent.battery.status <= agent.battery.capacity);
            prop_assert!(agent.water_tank.temp <= MAX_WATER_TEMP);
        }
    }

    /// No accepted input drives either buffer outside [0, capacity].
    #[test]
    fn prop_accepted_agents_keep_buffers_in_range(mut agent in arb_valid_agent()) {
        for _ in 0..5 {
            process_step(&mut agent, TIME_SCALE);
            prop_assert!(agent.battery.status >= 0.0);
            prop_assert!(agent.battery.status <= agent.battery.capacity);
            prop_assert!(agent.electrical_vehicle.status >= 0.0);
            prop_assert!(agent.electrical_vehicle.status <= agent.electrical_vehicle.capacity);
        }
    }
}
