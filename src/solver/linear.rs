use std::collections::BTreeMap;

use num_complex::Complex64;
use tracing::debug;

use crate::error::{Result, SimError};
use crate::grid::{Lines, Paths};
use crate::sim::power::{PCC_VOLTAGE, current_from_power};
use crate::sim::types::AgentsStates;
use crate::solver::{ComplexValue, GridSolution, GridSolver, LinearSolution, SolverType};

/// Line feeding the whole grid from the point of common coupling.
pub const ROOT_LINE: &str = "B0";

/// Radial approximation of the grid.
///
/// Line currents are first accumulated at the flat PCC voltage, each agent's
/// bus voltage is corrected by the resulting drops along its route, and the
/// currents are recomputed once with those voltages. This is a single
/// refinement, not a converged load flow.
#[derive(Debug, Clone)]
pub struct LinearSolver {
    paths: Paths,
    lines: Lines,
}

impl LinearSolver {
    /// # Errors
    ///
    /// [`SimError::Validation`] if the lines do not include [`ROOT_LINE`].
    pub fn new(paths: Paths, lines: Lines) -> Result<Self> {
        if !lines.contains_key(ROOT_LINE) {
            return Err(SimError::validation(
                "LinearSolver",
                format!("root line \"{ROOT_LINE}\" is not defined"),
            ));
        }
        Ok(Self { paths, lines })
    }

    /// Accumulates every agent's current onto the lines of its active routes.
    fn line_currents(
        &self,
        agents_states: &AgentsStates,
        voltage_of: impl Fn(&str) -> f64,
    ) -> Result<BTreeMap<&str, Complex64>> {
        let mut currents: BTreeMap<&str, Complex64> = self
            .lines
            .keys()
            .map(|name| (name.as_str(), Complex64::new(0.0, 0.0)))
            .collect();

        for (agent, state) in agents_states {
            let current = current_from_power(voltage_of(agent), state.net_power());
            for route in self.path_of(agent)?.active_routes() {
                for line in &route.path {
                    let slot = currents.get_mut(line.as_str()).ok_or_else(|| {
                        SimError::Simulation(format!("agent {agent} routes over unknown line {line}"))
                    })?;
                    *slot += current;
                }
            }
        }
        Ok(currents)
    }

    fn path_of(&self, agent: &str) -> Result<&crate::grid::Path> {
        self.paths
            .get(agent)
            .ok_or_else(|| SimError::Simulation(format!("no path for agent {agent}")))
    }

    /// Voltage at each agent's bus after the flat-voltage pass.
    fn agent_voltages(
        &self,
        agents_states: &AgentsStates,
        drops: &BTreeMap<&str, Complex64>,
    ) -> Result<BTreeMap<String, f64>> {
        let mut voltages = BTreeMap::new();
        for (agent, state) in agents_states {
            let mut voltage = PCC_VOLTAGE;
            if state.net_power().re > 0.0 {
                // With several active routes the last one wins.
                for route in self.path_of(agent)?.active_routes() {
                    let drop: Complex64 = route
                        .path
                        .iter()
                        .filter_map(|line| drops.get(line.as_str()))
                        .sum();
                    voltage = PCC_VOLTAGE - drop.re;
                }
            }
            voltages.insert(agent.clone(), voltage);
        }
        Ok(voltages)
    }
}

impl GridSolver for LinearSolver {
    fn kind(&self) -> SolverType {
        SolverType::Linear
    }

    fn solve(&self, agents_states: &AgentsStates) -> Result<GridSolution> {
        let flat = self.line_currents(agents_states, |_| PCC_VOLTAGE)?;
        let drops: BTreeMap<&str, Complex64> = flat
            .iter()
            .map(|(name, current)| (*name, self.lines[*name].impedance() * current))
            .collect();

        let voltages = self.agent_voltages(agents_states, &drops)?;
        let voltage_of = |agent: &str| voltages.get(agent).copied().unwrap_or(PCC_VOLTAGE);
        let refined = self.line_currents(agents_states, voltage_of)?;

        let mut currents: BTreeMap<String, ComplexValue> = refined
            .iter()
            .map(|(name, current)| (name.to_string(), (*current).into()))
            .collect();
        for (agent, state) in agents_states {
            let current = current_from_power(voltage_of(agent), state.net_power());
            currents.insert(agent.clone(), current.into());
        }

        let root = refined
            .get(ROOT_LINE)
            .copied()
            .unwrap_or_else(|| Complex64::new(0.0, 0.0));
        let power_from_main = root.conj() * PCC_VOLTAGE;
        let distribution_loss: f64 = refined
            .iter()
            .map(|(name, i)| (self.lines[*name].impedance() * i * i.conj()).re)
            .sum();

        debug!(
            power_from_main = power_from_main.re,
            distribution_loss, "linear grid solution"
        );

        Ok(GridSolution::Linear(LinearSolution {
            power_from_main: power_from_main.into(),
            distribution_loss: ComplexValue {
                real: distribution_loss,
                imag: 0.0,
            },
            currents,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Line, Path, Route};
    use crate::sim::types::{AgentElectricalState, PowerValue};

    fn lines() -> Lines {
        [
            Line::new("B0", 0.1, 0.01),
            Line::new("B1", 0.2, 0.02),
            Line::new("B2", 0.3, 0.03),
        ]
        .into_iter()
        .map(|l| (l.name.clone(), l))
        .collect()
    }

    fn paths() -> Paths {
        let route = |lines: &[&str]| Route {
            active: 1,
            path: lines.iter().map(|s| s.to_string()).collect(),
        };
        Paths::from([
            ("AGENT0".to_string(), Path::new(vec![route(&["B0", "B1"])])),
            ("AGENT1".to_string(), Path::new(vec![route(&["B0", "B2"])])),
        ])
    }

    fn state(demand: f64, inject: f64) -> AgentElectricalState {
        AgentElectricalState {
            demand_power: PowerValue {
                active_power: demand,
                reactive_power: 0.0,
            },
            inject_power: PowerValue {
                active_power: inject,
                reactive_power: 0.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_root_line() {
        let mut lines = lines();
        lines.remove("B0");
        assert!(LinearSolver::new(paths(), lines).is_err());
    }

    #[test]
    fn test_no_load_no_current() {
        let solver = LinearSolver::new(paths(), lines()).unwrap();
        let states = AgentsStates::from([
            ("AGENT0".to_string(), state(0.0, 0.0)),
            ("AGENT1".to_string(), state(0.0, 0.0)),
        ]);
        let solution = solver.solve(&states).unwrap();
        assert_eq!(solution.power_from_main(), Complex64::new(0.0, 0.0));
        assert_eq!(solution.distribution_loss(), 0.0);
    }

    #[test]
    fn test_root_line_carries_every_agent() {
        let solver = LinearSolver::new(paths(), lines()).unwrap();
        let states = AgentsStates::from([
            ("AGENT0".to_string(), state(1000.0, 0.0)),
            ("AGENT1".to_string(), state(1000.0, 0.0)),
        ]);
        let GridSolution::Linear(solution) = solver.solve(&states).unwrap() else {
            panic!("expected a linear solution");
        };
        let b0 = solution.currents["B0"].real;
        let b1 = solution.currents["B1"].real;
        let b2 = solution.currents["B2"].real;
        assert!((b0 - (b1 + b2)).abs() < 1e-9);
        // corrected voltages are below 230 V, so currents exceed the flat estimate
        assert!(b1 > 1000.0 / 230.0);
    }

    #[test]
    fn test_unknown_agent_path_is_an_error() {
        let solver = LinearSolver::new(paths(), lines()).unwrap();
        let states = AgentsStates::from([("GHOST".to_string(), state(10.0, 0.0))]);
        assert!(matches!(solver.solve(&states), Err(SimError::Simulation(_))));
    }
}
