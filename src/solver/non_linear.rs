//! AC power flow on the node graph, solved with Newton-Raphson in polar form.
//!
//! One bus per topology node, the `SLACK` node held at 1 p.u. and 0°, every
//! other bus a PQ bus whose injection is the hosted agent's net generation.
//! Lines are pi-models with their series R/X and, when present, the shunt
//! admittance split across both ends. Everything runs in per-unit on a
//! 1 kVA / 230 V base with dense `nalgebra` matrices, which is plenty for
//! feeder-sized grids.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::debug;

use crate::error::{Result, SimError};
use crate::grid::{Lines, Nodes};
use crate::sim::power::PCC_VOLTAGE;
use crate::sim::types::AgentsStates;
use crate::solver::{
    BusResult, ComplexValue, GridSolution, GridSolver, LineResult, NonLinearSolution, SolverType,
};

/// Name of the node connected to the external grid.
pub const SLACK_BUS: &str = "SLACK";

/// Power base (VA).
const S_BASE: f64 = 1_000.0;
/// Thermal rating used for `loading_percent` (kA).
const MAX_I_KA: f64 = 1.0;
const TOLERANCE: f64 = 1e-8;
const MAX_ITERATIONS: usize = 30;

#[derive(Debug, Clone)]
struct Branch {
    name: String,
    from: usize,
    to: usize,
    series: Complex64,
    half_shunt: Complex64,
}

/// Full AC power-flow solver.
#[derive(Debug, Clone)]
pub struct NonLinearSolver {
    bus_names: Vec<String>,
    /// Hosted agent per bus index.
    bus_agents: Vec<Option<String>>,
    slack: usize,
    branches: Vec<Branch>,
    ybus: DMatrix<Complex64>,
}

fn z_base() -> f64 {
    PCC_VOLTAGE * PCC_VOLTAGE / S_BASE
}

impl NonLinearSolver {
    /// Builds the bus admittance matrix for a fixed topology.
    ///
    /// Each line is created once, from the first node that lists it in its
    /// adjacency towards the named neighbour.
    ///
    /// # Errors
    ///
    /// [`SimError::Validation`] if there is no `SLACK` node, an adjacency
    /// entry names an unknown node or line, or a line has zero impedance.
    pub fn new(nodes: &Nodes, lines: &Lines) -> Result<Self> {
        let bus_names: Vec<String> = nodes.keys().cloned().collect();
        let index: BTreeMap<&str, usize> = bus_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let slack = *index.get(SLACK_BUS).ok_or_else(|| {
            SimError::validation("NonLinearSolver", format!("no \"{SLACK_BUS}\" node"))
        })?;
        let bus_agents = nodes.values().map(|n| n.agent.clone()).collect();

        let mut branches: Vec<Branch> = Vec::new();
        for (from_name, node) in nodes {
            for (neighbor, line_name) in &node.adjacency {
                if branches.iter().any(|b| &b.name == line_name) {
                    continue;
                }
                let to = *index.get(neighbor.as_str()).ok_or_else(|| {
                    SimError::validation(
                        "NonLinearSolver",
                        format!("node {from_name} is adjacent to unknown node {neighbor}"),
                    )
                })?;
                let line = lines.get(line_name).ok_or_else(|| {
                    SimError::validation(
                        "NonLinearSolver",
                        format!("node {from_name} uses unknown line {line_name}"),
                    )
                })?;
                let z = line.impedance() / z_base();
                if z.norm() == 0.0 {
                    return Err(SimError::validation(
                        "NonLinearSolver",
                        format!("line {line_name} has zero impedance"),
                    ));
                }
                let half_shunt = line
                    .shunt_admittance()
                    .map(|y| y * z_base() / 2.0)
                    .unwrap_or_else(|| Complex64::new(0.0, 0.0));
                branches.push(Branch {
                    name: line_name.clone(),
                    from: index[from_name.as_str()],
                    to,
                    series: z.inv(),
                    half_shunt,
                });
            }
        }

        let n = bus_names.len();
        let mut ybus = DMatrix::<Complex64>::zeros(n, n);
        for b in &branches {
            ybus[(b.from, b.from)] += b.series + b.half_shunt;
            ybus[(b.to, b.to)] += b.series + b.half_shunt;
            ybus[(b.from, b.to)] -= b.series;
            ybus[(b.to, b.from)] -= b.series;
        }

        Ok(Self {
            bus_names,
            bus_agents,
            slack,
            branches,
            ybus,
        })
    }

    /// Net complex generation per bus in per-unit.
    fn scheduled_injection(&self, agents_states: &AgentsStates) -> DVector<Complex64> {
        DVector::from_fn(self.bus_names.len(), |i, _| {
            self.bus_agents[i]
                .as_ref()
                .and_then(|agent| agents_states.get(agent))
                .map(|state| -state.net_power() / S_BASE)
                .unwrap_or_else(|| Complex64::new(0.0, 0.0))
        })
    }

    /// Runs Newton-Raphson until the PQ mismatch falls below tolerance.
    fn newton_raphson(&self, sbus: &DVector<Complex64>) -> Result<(DVector<Complex64>, usize)> {
        let n = self.bus_names.len();
        let pq: Vec<usize> = (0..n).filter(|&i| i != self.slack).collect();
        let m = pq.len();
        let mut v = DVector::from_element(n, Complex64::new(1.0, 0.0));

        for iteration in 0..=MAX_ITERATIONS {
            let ibus = &self.ybus * &v;
            let mismatch = DVector::from_fn(n, |i, _| v[i] * ibus[i].conj() - sbus[i]);
            let f = DVector::from_fn(2 * m, |k, _| {
                if k < m {
                    mismatch[pq[k]].re
                } else {
                    mismatch[pq[k - m]].im
                }
            });
            let worst = f.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
            if worst < TOLERANCE {
                return Ok((v, iteration));
            }
            if iteration == MAX_ITERATIONS {
                break;
            }

            let (ds_dvm, ds_dva) = ds_bus_dv(&self.ybus, &v);
            let jacobian = DMatrix::from_fn(2 * m, 2 * m, |r, c| {
                let (row, im_part) = if r < m { (pq[r], false) } else { (pq[r - m], true) };
                let entry = if c < m {
                    ds_dva[(row, pq[c])]
                } else {
                    ds_dvm[(row, pq[c - m])]
                };
                if im_part { entry.im } else { entry.re }
            });
            let dx = jacobian.lu().solve(&f).ok_or_else(|| {
                SimError::Simulation("power flow Jacobian is singular".to_string())
            })?;

            for (k, &bus) in pq.iter().enumerate() {
                let (vm, va) = v[bus].to_polar();
                v[bus] = Complex64::from_polar(vm - dx[m + k], va - dx[k]);
            }
        }

        Err(SimError::Simulation(format!(
            "power flow did not converge in {MAX_ITERATIONS} iterations"
        )))
    }
}

/// Partial derivatives of the bus power injections with respect to voltage
/// magnitude and angle, in complex matrix form.
fn ds_bus_dv(
    ybus: &DMatrix<Complex64>,
    v: &DVector<Complex64>,
) -> (DMatrix<Complex64>, DMatrix<Complex64>) {
    let ibus = ybus * v;
    let v_norm = v.map(|x| {
        let r = x.norm();
        if r > 0.0 { x / r } else { Complex64::new(1.0, 0.0) }
    });
    let diag_v = DMatrix::from_diagonal(v);
    let diag_i = DMatrix::from_diagonal(&ibus);
    let diag_v_norm = DMatrix::from_diagonal(&v_norm);

    let ds_dvm = &diag_v * (ybus * &diag_v_norm).conjugate() + diag_i.conjugate() * &diag_v_norm;
    let ds_dva = (&diag_v * (&diag_i - ybus * &diag_v).conjugate()) * Complex64::i();
    (ds_dvm, ds_dva)
}

impl GridSolver for NonLinearSolver {
    fn kind(&self) -> SolverType {
        SolverType::NonLinear
    }

    fn solve(&self, agents_states: &AgentsStates) -> Result<GridSolution> {
        let sbus = self.scheduled_injection(agents_states);
        let (v, iterations) = self.newton_raphson(&sbus)?;
        let ibus = &self.ybus * &v;
        let to_kw = S_BASE / 1_000.0;
        let i_base_ka = S_BASE / PCC_VOLTAGE / 1_000.0;

        let mut buses = BTreeMap::new();
        for (i, name) in self.bus_names.iter().enumerate() {
            let injected = v[i] * ibus[i].conj();
            buses.insert(
                name.clone(),
                BusResult {
                    vm_pu: v[i].norm(),
                    va_degree: v[i].arg().to_degrees(),
                    p_kw: -injected.re * to_kw,
                    q_kvar: -injected.im * to_kw,
                },
            );
        }

        let mut lines = BTreeMap::new();
        let mut loss = 0.0;
        for b in &self.branches {
            let (vf, vt) = (v[b.from], v[b.to]);
            let i_from = (vf - vt) * b.series + vf * b.half_shunt;
            let i_to = (vt - vf) * b.series + vt * b.half_shunt;
            let s_from = vf * i_from.conj();
            let s_to = vt * i_to.conj();
            let i_from_ka = i_from.norm() * i_base_ka;
            let i_to_ka = i_to.norm() * i_base_ka;
            let i_ka = i_from_ka.max(i_to_ka);
            let pl_kw = (s_from + s_to).re * to_kw;
            loss += pl_kw * 1_000.0;
            lines.insert(
                b.name.clone(),
                LineResult {
                    p_from_kw: s_from.re * to_kw,
                    q_from_kvar: s_from.im * to_kw,
                    p_to_kw: s_to.re * to_kw,
                    q_to_kvar: s_to.im * to_kw,
                    pl_kw,
                    ql_kvar: (s_from + s_to).im * to_kw,
                    i_from_ka,
                    i_to_ka,
                    i_ka,
                    loading_percent: i_ka / MAX_I_KA * 100.0,
                },
            );
        }

        let slack_injection = v[self.slack] * ibus[self.slack].conj() * S_BASE;
        debug!(
            iterations,
            power_from_main = slack_injection.re,
            distribution_loss = loss,
            "power flow converged"
        );

        Ok(GridSolution::NonLinear(NonLinearSolution {
            buses,
            lines,
            power_from_main: slack_injection.into(),
            distribution_loss: ComplexValue {
                real: loss,
                imag: 0.0,
            },
        }))
    }
}
