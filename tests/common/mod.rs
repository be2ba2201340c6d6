//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use serde_json::{Value, json};

use lvgrid_sim::cluster::ClusterSet;
use lvgrid_sim::event::InMemoryEventQueue;
use lvgrid_sim::grid::{GridElements, Topology, load_grid_elements, load_topology};
use lvgrid_sim::sim::Simulation;
use lvgrid_sim::solver::{SolverType, create_solver};
use lvgrid_sim::storage::InMemoryStorage;

/// Agent with 1 kW rated demand at unity power factor and every device
/// switched off.
///
/// Battery: 24 V, 1 296 000 capacity, full, covers half the rated demand.
pub fn agent_json() -> Value {
    json!({
        "voltage_rating": 230.0,
        "power_rating": 1000.0,
        "power_factor": 1.0,
        "incoming_power": 0.0,
        "request_inject_power": 0.0,
        "request_power_factor": 1.0,
        "battery": {
            "voltage": 24.0, "capacity": 1296000.0, "status": 1296000.0,
            "contribution_active": 0.5, "contribution_reactive": 0.0,
            "inverter_input_voltage": 24.0, "inverter_output_voltage": 230.0,
            "inverter_efficiency": 0.87, "active": 0
        },
        "pv_panel": {
            "unit_area": 1.0, "series": 10.0, "parallels": 5.0, "efficiency": 0.8,
            "solar_irradiance": 100.0, "battery_coupling_efficiency": 1.0,
            "heating_contribution": 0.0, "active": 0
        },
        "wind_generator": {
            "power_coefficient": 0.4, "air_density": 1.225, "area": 1.0,
            "wind_speed": 5.0, "battery_coupling_efficiency": 1.0, "active": 0
        },
        "electrical_vehicle": {
            "voltage": 24.0, "capacity": 1296000.0, "status": 0.0, "consumption": 0.0,
            "contribution_active": 0.0, "contribution_reactive": 0.0,
            "inverter_efficiency": 1.0, "charge_current": 3.0,
            "power_supplier": 0, "active": 0
        },
        "water_tank": {"capacity": 100.0, "temp": 20.0, "active": 0}
    })
}

/// Lines of the two-agent radial feeder.
pub fn lines_json() -> Value {
    json!({
        "B0": {"resistance": 0.05, "reactance": 0.01},
        "B1": {"resistance": 0.1, "reactance": 0.02},
        "B2": {"resistance": 0.2, "reactance": 0.04}
    })
}

/// SLACK feeds N0 over B0; N0 branches to AGENT0 on N1 (B1) and AGENT1 on N2 (B2).
pub fn topology_json() -> Value {
    json!({
        "paths": {
            "AGENT0": [{"active": 1, "path": ["B0", "B1"]}],
            "AGENT1": [{"active": 1, "path": ["B0", "B2"]}]
        },
        "nodes": {
            "SLACK": {"branches_in": [], "branches_out": ["B0"], "adjacency": [["N0", "B0"]]},
            "N0": {
                "branches_in": ["B0"], "branches_out": ["B1", "B2"],
                "adjacency": [["SLACK", "B0"], ["N1", "B1"], ["N2", "B2"]]
            },
            "N1": {"branches_in": ["B1"], "branches_out": [], "adjacency": [["N0", "B1"]], "agent": "AGENT0"},
            "N2": {"branches_in": ["B2"], "branches_out": [], "adjacency": [["N0", "B2"]], "agent": "AGENT1"}
        }
    })
}

/// The two-agent feeder with the given agent bodies.
pub fn two_agent_grid(agent0: Value, agent1: Value) -> (GridElements, Topology) {
    let elements = load_grid_elements(&json!({
        "agents": {"AGENT0": agent0, "AGENT1": agent1},
        "lines": lines_json()
    }))
    .expect("grid elements fixture should load");
    let topology = load_topology(&topology_json()).expect("topology fixture should load");
    (elements, topology)
}

/// A simulation over in-memory collaborators.
pub fn memory_simulation(
    elements: GridElements,
    topology: Topology,
    solver_type: SolverType,
    clusters: ClusterSet,
) -> Simulation<InMemoryEventQueue, InMemoryStorage> {
    let solver = create_solver(
        solver_type,
        &topology.paths,
        &topology.nodes,
        &elements.lines,
    )
    .expect("solver should build for the fixture");
    Simulation::new(
        elements,
        topology,
        clusters,
        solver,
        InMemoryEventQueue::new(),
        InMemoryStorage::new(),
    )
    .expect("simulation should start")
}

/// Asserts two floats agree to within `tol`.
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual} (tolerance {tol})"
    );
}
