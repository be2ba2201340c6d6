//! Persistence of simulations, their steps, agent snapshots and the event
//! audit log.
//!
//! Steps are written with `valid = false` and flipped once the agents
//! snapshot for that step is in place, so readers can skip a step whose
//! tick was interrupted half-way.

pub mod jsonl;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use jsonl::JsonlStorage;
pub use memory::InMemoryStorage;

use crate::error::Result;
use crate::grid::{Agent, Agents, Lines, Nodes, Paths};
use crate::sim::types::AgentsStates;
use crate::solver::{GridSolution, SolverType};

/// Identifier of a stored simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(pub u64);

/// Identifier of a stored simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u64);

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to create a simulation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSimulation {
    pub agents: Agents,
    pub lines: Lines,
    pub paths: Paths,
    pub nodes: Nodes,
    pub solver: SolverType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Value>,
    /// Seconds since the Unix epoch.
    pub start_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub id: SimulationId,
    #[serde(flatten)]
    pub simulation: NewSimulation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStepRecord {
    pub id: StepId,
    pub simulation_id: SimulationId,
    pub simulation_step: u64,
    pub simulation_result: GridSolution,
    pub agents_states: AgentsStates,
    pub total_pv_power: f64,
    pub valid: bool,
}

/// Snapshot of every agent after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsRecord {
    pub simulation_id: SimulationId,
    pub simulation_step_id: StepId,
    pub agents: BTreeMap<String, Agent>,
}

/// A state event as received, with whether it was fully applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatesRecord {
    pub simulation_id: SimulationId,
    pub simulation_step: u64,
    pub is_applied: bool,
    pub states: BTreeMap<String, Value>,
}

/// A cluster event as received, with whether it was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClustersRecord {
    pub simulation_id: SimulationId,
    pub simulation_step: u64,
    pub is_applied: bool,
    pub clusters: BTreeMap<String, Value>,
}

/// Selects audit-log records; `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventFilter {
    pub simulation_id: Option<SimulationId>,
    pub simulation_step: Option<u64>,
    pub is_applied: Option<bool>,
}

impl EventFilter {
    pub fn for_simulation(simulation_id: SimulationId) -> Self {
        Self {
            simulation_id: Some(simulation_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, simulation_id: SimulationId, step: u64, is_applied: bool) -> bool {
        self.simulation_id.is_none_or(|id| id == simulation_id)
            && self.simulation_step.is_none_or(|s| s == step)
            && self.is_applied.is_none_or(|a| a == is_applied)
    }
}

/// The persistent store behind a simulation.
pub trait Storage {
    fn write_simulation(&self, simulation: NewSimulation) -> Result<SimulationId>;

    fn read_simulation(&self, simulation_id: SimulationId) -> Result<Option<SimulationRecord>>;

    /// Stores one tick's solver output, not yet finalized.
    fn write_simulation_step(
        &self,
        simulation_id: SimulationId,
        simulation_step: u64,
        simulation_result: &GridSolution,
        agents_states: &AgentsStates,
        total_pv_power: f64,
    ) -> Result<StepId>;

    /// Marks a step as complete.
    fn finalize_simulation_step(&self, step_id: StepId) -> Result<()>;

    /// Steps of one simulation in step order, optionally only finalized ones.
    fn read_simulation_steps(
        &self,
        simulation_id: SimulationId,
        valid_only: bool,
    ) -> Result<Vec<SimulationStepRecord>>;

    fn write_agents(
        &self,
        agents: &Agents,
        simulation_step_id: StepId,
        simulation_id: SimulationId,
    ) -> Result<()>;

    fn read_agents(&self, simulation_step_id: StepId) -> Result<Option<AgentsRecord>>;

    fn write_states(
        &self,
        states: &BTreeMap<String, Value>,
        simulation_id: SimulationId,
        simulation_step: u64,
        is_applied: bool,
    ) -> Result<()>;

    fn read_states(&self, filter: &EventFilter) -> Result<Vec<StatesRecord>>;

    fn write_clusters(
        &self,
        clusters: &BTreeMap<String, Value>,
        simulation_id: SimulationId,
        simulation_step: u64,
        is_applied: bool,
    ) -> Result<()>;

    fn read_clusters(&self, filter: &EventFilter) -> Result<Vec<ClustersRecord>>;

    /// The most recent applied cluster configuration of a simulation.
    fn last_applied_clusters(&self, simulation_id: SimulationId) -> Result<Option<ClustersRecord>> {
        let filter = EventFilter {
            is_applied: Some(true),
            ..EventFilter::for_simulation(simulation_id)
        };
        Ok(self
            .read_clusters(&filter)?
            .into_iter()
            .max_by_key(|r| r.simulation_step))
    }

    /// Removes a simulation and everything recorded under it.
    fn clear_simulation(&self, simulation_id: SimulationId) -> Result<()>;

    /// Removes every record.
    fn clear_all(&self) -> Result<()>;
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn write_simulation(&self, simulation: NewSimulation) -> Result<SimulationId> {
        (**self).write_simulation(simulation)
    }

    fn read_simulation(&self, simulation_id: SimulationId) -> Result<Option<SimulationRecord>> {
        (**self).read_simulation(simulation_id)
    }

    fn write_simulation_step(
        &self,
        simulation_id: SimulationId,
        simulation_step: u64,
        simulation_result: &GridSolution,
        agents_states: &AgentsStates,
        total_pv_power: f64,
    ) -> Result<StepId> {
        (**self).write_simulation_step(
            simulation_id,
            simulation_step,
            simulation_result,
            agents_states,
            total_pv_power,
        )
    }

    fn finalize_simulation_step(&self, step_id: StepId) -> Result<()> {
        (**self).finalize_simulation_step(step_id)
    }

    fn read_simulation_steps(
        &self,
        simulation_id: SimulationId,
        valid_only: bool,
    ) -> Result<Vec<SimulationStepRecord>> {
        (**self).read_simulation_steps(simulation_id, valid_only)
    }

    fn write_agents(
        &self,
        agents: &Agents,
        simulation_step_id: StepId,
        simulation_id: SimulationId,
    ) -> Result<()> {
        (**self).write_agents(agents, simulation_step_id, simulation_id)
    }

    fn read_agents(&self, simulation_step_id: StepId) -> Result<Option<AgentsRecord>> {
        (**self).read_agents(simulation_step_id)
    }

    fn write_states(
        &self,
        states: &BTreeMap<String, Value>,
        simulation_id: SimulationId,
        simulation_step: u64,
        is_applied: bool,
    ) -> Result<()> {
        (**self).write_states(states, simulation_id, simulation_step, is_applied)
    }

    fn read_states(&self, filter: &EventFilter) -> Result<Vec<StatesRecord>> {
        (**self).read_states(filter)
    }

    fn write_clusters(
        &self,
        clusters: &BTreeMap<String, Value>,
        simulation_id: SimulationId,
        simulation_step: u64,
        is_applied: bool,
    ) -> Result<()> {
        (**self).write_clusters(clusters, simulation_id, simulation_step, is_applied)
    }

    fn read_clusters(&self, filter: &EventFilter) -> Result<Vec<ClustersRecord>> {
        (**self).read_clusters(filter)
    }

    fn clear_simulation(&self, simulation_id: SimulationId) -> Result<()> {
        (**self).clear_simulation(simulation_id)
    }

    fn clear_all(&self) -> Result<()> {
        (**self).clear_all()
    }
}
