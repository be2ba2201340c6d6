use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::{Result, SimError};
use crate::grid::Agents;
use crate::sim::types::AgentsStates;
use crate::solver::GridSolution;
use crate::storage::{
    AgentsRecord, ClustersRecord, EventFilter, NewSimulation, SimulationId, SimulationRecord,
    SimulationStepRecord, StatesRecord, StepId, Storage,
};

/// The record tables shared by the in-memory and JSON-lines stores.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) next_id: u64,
    pub(crate) simulations: BTreeMap<SimulationId, SimulationRecord>,
    pub(crate) steps: BTreeMap<StepId, SimulationStepRecord>,
    pub(crate) agents: BTreeMap<StepId, AgentsRecord>,
    pub(crate) states: Vec<StatesRecord>,
    pub(crate) clusters: Vec<ClustersRecord>,
}

impl Tables {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Keeps generated ids above every id already loaded.
    pub(crate) fn observe_id(&mut self, id: u64) {
        self.next_id = self.next_id.max(id);
    }

    pub(crate) fn insert_simulation(&mut self, simulation: NewSimulation) -> SimulationRecord {
        let record = SimulationRecord {
            id: SimulationId(self.next()),
            simulation,
        };
        self.simulations.insert(record.id, record.clone());
        record
    }

    pub(crate) fn insert_step(
        &mut self,
        simulation_id: SimulationId,
        simulation_step: u64,
        simulation_result: &GridSolution,
        agents_states: &AgentsStates,
        total_pv_power: f64,
    ) -> SimulationStepRecord {
        let record = SimulationStepRecord {
            id: StepId(self.next()),
            simulation_id,
            simulation_step,
            simulation_result: simulation_result.clone(),
            agents_states: agents_states.clone(),
            total_pv_power,
            valid: false,
        };
        self.steps.insert(record.id, record.clone());
        record
    }

    pub(crate) fn finalize(&mut self, step_id: StepId) -> Result<()> {
        let step = self
            .steps
            .get_mut(&step_id)
            .ok_or_else(|| SimError::Storage(format!("no simulation step {step_id}")))?;
        step.valid = true;
        Ok(())
    }

    pub(crate) fn steps_of(&self, simulation_id: SimulationId, valid_only: bool) -> Vec<SimulationStepRecord> {
        let mut steps: Vec<_> = self
            .steps
            .values()
            .filter(|s| s.simulation_id == simulation_id && (s.valid || !valid_only))
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.simulation_step, s.id));
        steps
    }

    pub(crate) fn insert_agents(
        &mut self,
        agents: &Agents,
        simulation_step_id: StepId,
        simulation_id: SimulationId,
    ) -> AgentsRecord {
        let record = AgentsRecord {
            simulation_id,
            simulation_step_id,
            agents: agents.clone(),
        };
        self.agents.insert(simulation_step_id, record.clone());
        record
    }

    pub(crate) fn states_matching(&self, filter: &EventFilter) -> Vec<StatesRecord> {
        self.states
            .iter()
            .filter(|r| filter.matches(r.simulation_id, r.simulation_step, r.is_applied))
            .cloned()
            .collect()
    }

    pub(crate) fn clusters_matching(&self, filter: &EventFilter) -> Vec<ClustersRecord> {
        self.clusters
            .iter()
            .filter(|r| filter.matches(r.simulation_id, r.simulation_step, r.is_applied))
            .cloned()
            .collect()
    }

    pub(crate) fn remove_simulation(&mut self, simulation_id: SimulationId) {
        self.simulations.remove(&simulation_id);
        self.steps.retain(|_, s| s.simulation_id != simulation_id);
        self.agents.retain(|_, a| a.simulation_id != simulation_id);
        self.states.retain(|r| r.simulation_id != simulation_id);
        self.clusters.retain(|r| r.simulation_id != simulation_id);
    }

    pub(crate) fn clear(&mut self) {
        let next_id = self.next_id;
        *self = Tables {
            next_id,
            ..Tables::default()
        };
    }
}

/// Process-local store; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| SimError::Storage("in-memory store lock poisoned".to_string()))
    }
}

impl Storage for InMemoryStorage {
    fn write_simulation(&self, simulation: NewSimulation) -> Result<SimulationId> {
        Ok(self.lock()?.insert_simulation(simulation).id)
    }

    fn read_simulation(&self, simulation_id: SimulationId) -> Result<Option<SimulationRecord>> {
        Ok(self.lock()?.simulations.get(&simulation_id).cloned())
    }

    fn write_simulation_step(
        &self,
        simulation_id: SimulationId,
        simulation_step: u64,
        simulation_result: &GridSolution,
        agents_states: &AgentsStates,
        total_pv_power: f64,
    ) -> Result<StepId> {
        Ok(self
            .lock()?
            .insert_step(
                simulation_id,
                simulation_step,
                simulation_result,
                agents_states,
                total_pv_power,
            )
            .id)
    }

    fn finalize_simulation_step(&self, step_id: StepId) -> Result<()> {
        self.lock()?.finalize(step_id)
    }

    fn read_simulation_steps(
        &self,
        simulation_id: SimulationId,
        valid_only: bool,
    ) -> Result<Vec<SimulationStepRecord>> {
        Ok(self.lock()?.steps_of(simulation_id, valid_only))
    }

    fn write_agents(
        &self,
        agents: &Agents,
        simulation_step_id: StepId,
        simulation_id: SimulationId,
    ) -> Result<()> {
        self.lock()?
            .insert_agents(agents, simulation_step_id, simulation_id);
        Ok(())
    }

    fn read_agents(&self, simulation_step_id: StepId) -> Result<Option<AgentsRecord>> {
        Ok(self.lock()?.agents.get(&simulation_step_id).cloned())
    }

    fn write_states(
        &self,
        states: &BTreeMap<String, Value>,
        simulation_id: SimulationId,
        simulation_step: u64,
        is_applied: bool,
    ) -> Result<()> {
        self.lock()?.states.push(StatesRecord {
            simulation_id,
            simulation_step,
            is_applied,
            states: states.clone(),
        });
        Ok(())
    }

    fn read_states(&self, filter: &EventFilter) -> Result<Vec<StatesRecord>> {
        Ok(self.lock()?.states_matching(filter))
    }

    fn write_clusters(
        &self,
        clusters: &BTreeMap<String, Value>,
        simulation_id: SimulationId,
        simulation_step: u64,
        is_applied: bool,
    ) -> Result<()> {
        self.lock()?.clusters.push(ClustersRecord {
            simulation_id,
            simulation_step,
            is_applied,
            clusters: clusters.clone(),
        });
        Ok(())
    }

    fn read_clusters(&self, filter: &EventFilter) -> Result<Vec<ClustersRecord>> {
        Ok(self.lock()?.clusters_matching(filter))
    }

    fn clear_simulation(&self, simulation_id: SimulationId) -> Result<()> {
        self.lock()?.remove_simulation(simulation_id);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
