//! Simulation loop that drains events, steps every agent, solves the grid
//! and persists the outcome once per tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use num_complex::Complex64;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterContext, ClusterSet};
use crate::error::{Result, SimError};
use crate::event::{ClustersEvent, EventQueue, StatesEvent};
use crate::grid::{Agents, GridElements, Lines, Nodes, Paths, State, Topology};
use crate::sim::clock::Clock;
use crate::sim::power::TIME_SCALE;
use crate::sim::step::process_step;
use crate::sim::types::AgentsStates;
use crate::solver::GridSolver;
use crate::storage::{NewSimulation, SimulationId, StepId, Storage};

/// What one tick produced, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub simulation_step: u64,
    pub step_id: StepId,
    pub power_from_main: Complex64,
    pub distribution_loss: f64,
    pub total_pv_power: f64,
    /// Whether a state event was drained and fully applied this tick.
    pub states_applied: Option<bool>,
    /// Whether a cluster event was drained and applied this tick.
    pub clusters_applied: Option<bool>,
}

/// A running simulation over one grid.
///
/// Owns the agents, clusters and solver. The queue and store are the only
/// resources shared with the outside world.
pub struct Simulation<Q: EventQueue, S: Storage> {
    id: SimulationId,
    agents: Agents,
    lines: Lines,
    paths: Paths,
    nodes: Nodes,
    clusters: ClusterSet,
    solver: Box<dyn GridSolver>,
    queue: Q,
    storage: S,
    latency: Duration,
    now: u64,
}

impl<Q: EventQueue, S: Storage> Simulation<Q, S> {
    /// Creates a simulation and writes its record to the store.
    ///
    /// # Arguments
    ///
    /// * `elements` - Agents and lines
    /// * `topology` - Paths and nodes
    /// * `clusters` - Initial cluster configuration, possibly empty
    /// * `solver` - Grid solver built for this topology
    /// * `queue` - Source of state and cluster events
    /// * `storage` - Destination of steps, snapshots and the event log
    ///
    /// # Errors
    ///
    /// [`SimError::Validation`] if a cluster names an unknown agent, or any
    /// error the store raises while writing the simulation record.
    pub fn new(
        elements: GridElements,
        topology: Topology,
        clusters: ClusterSet,
        solver: Box<dyn GridSolver>,
        queue: Q,
        storage: S,
    ) -> Result<Self> {
        clusters.check_members(&elements.agents)?;

        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let initial_clusters = if clusters.is_empty() {
            None
        } else {
            Some(clusters.to_value()?)
        };
        let id = storage.write_simulation(NewSimulation {
            agents: elements.agents.clone(),
            lines: elements.lines.clone(),
            paths: topology.paths.clone(),
            nodes: topology.nodes.clone(),
            solver: solver.kind(),
            clusters: initial_clusters,
            start_time,
        })?;
        info!(simulation = %id, solver = %solver.kind(), agents = elements.agents.len(), "simulation created");

        Ok(Self {
            id,
            agents: elements.agents,
            lines: elements.lines,
            paths: topology.paths,
            nodes: topology.nodes,
            clusters,
            solver,
            queue,
            storage,
            latency: Duration::ZERO,
            now: 0,
        })
    }

    /// Sleeps for `latency` at the start of every tick.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn id(&self) -> SimulationId {
        self.id
    }

    /// The next tick to run.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn agents(&self) -> &Agents {
        &self.agents
    }

    pub fn clusters(&self) -> &ClusterSet {
        &self.clusters
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs one tick end to end.
    ///
    /// # Errors
    ///
    /// Solver, queue and store failures. Bad entries inside a state event
    /// are logged and skipped instead.
    pub fn step(&mut self) -> Result<TickReport> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        let states_applied = match self.queue.read_states()? {
            Some(event) => Some(self.apply_states(event)?),
            None => None,
        };
        let clusters_applied = match self.queue.read_clusters()? {
            Some(event) => Some(self.apply_clusters(event)?),
            None => None,
        };

        let mut ctx = ClusterContext {
            agents: &mut self.agents,
            lines: &self.lines,
            nodes: &self.nodes,
            paths: &self.paths,
        };
        self.clusters.run(&mut ctx);

        let mut agents_states = AgentsStates::new();
        let mut total_pv_power = 0.0;
        for (name, agent) in self.agents.iter_mut() {
            let outcome = process_step(agent, TIME_SCALE);
            total_pv_power += outcome.pv_power;
            agents_states.insert(name.clone(), outcome.electrical_state());
        }

        let solution = self.solver.solve(&agents_states)?;

        let step_id = self.storage.write_simulation_step(
            self.id,
            self.now,
            &solution,
            &agents_states,
            total_pv_power,
        )?;
        self.storage.write_agents(&self.agents, step_id, self.id)?;
        self.storage.finalize_simulation_step(step_id)?;

        let report = TickReport {
            simulation_step: self.now,
            step_id,
            power_from_main: solution.power_from_main(),
            distribution_loss: solution.distribution_loss(),
            total_pv_power,
            states_applied,
            clusters_applied,
        };
        debug!(
            step = self.now,
            power_from_main = %report.power_from_main,
            loss = report.distribution_loss,
            pv = total_pv_power,
            "tick done"
        );
        self.now += 1;
        Ok(report)
    }

    /// Runs ticks until `steps` are done (`0` = no limit) or `cancel` is set.
    ///
    /// # Returns
    ///
    /// The simulation time reached, counting ticks from earlier runs.
    ///
    /// # Errors
    ///
    /// The first tick failure, after logging it. The loop does not retry.
    pub fn run(&mut self, steps: usize, cancel: Option<&AtomicBool>) -> Result<usize> {
        info!(simulation = %self.id, steps, "simulation started");
        let mut clock = Clock::from_budget(steps);
        let mut failure: Option<SimError> = None;

        clock.run(|step| {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                info!(step, "simulation cancelled");
                return false;
            }
            match self.step() {
                Ok(_) => true,
                Err(e) => {
                    error!(simulation = %self.id, step, error = %e, "tick failed, stopping simulation");
                    failure = Some(e);
                    false
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        let completed = self.now as usize;
        info!(simulation = %self.id, completed, "simulation stopped");
        Ok(completed)
    }

    /// Applies every agent's partial state; failing agents are skipped.
    ///
    /// Returns whether every entry applied. The event is logged either way.
    fn apply_states(&mut self, event: StatesEvent) -> Result<bool> {
        let mut all_applied = true;
        for (name, value) in &event.states {
            let Some(agent) = self.agents.get_mut(name) else {
                warn!(agent = %name, step = self.now, "state for unknown agent");
                all_applied = false;
                continue;
            };
            match State::from_value(value) {
                Ok(state) => agent.update_state(&state),
                Err(e) => {
                    warn!(agent = %name, step = self.now, error = %e, "state not applied");
                    all_applied = false;
                }
            }
        }
        self.storage
            .write_states(&event.states, self.id, self.now, all_applied)?;
        Ok(all_applied)
    }

    /// Resets injection requests and replaces the cluster set.
    ///
    /// An invalid payload keeps the current clusters and is logged as not
    /// applied.
    fn apply_clusters(&mut self, event: ClustersEvent) -> Result<bool> {
        for agent in self.agents.values_mut() {
            agent.request_inject_power = 0.0;
            agent.request_power_factor = 1.0;
        }
        let applied = match ClusterSet::from_map(&event.clusters) {
            Ok(clusters) => {
                info!(step = self.now, clusters = clusters.len(), "cluster configuration replaced");
                self.clusters = clusters;
                true
            }
            Err(e) => {
                warn!(step = self.now, error = %e, "cluster configuration rejected");
                false
            }
        };
        self.storage
            .write_clusters(&event.clusters, self.id, self.now, applied)?;
        Ok(applied)
    }
}
