use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, SimError};
use crate::grid::Agents;
use crate::sim::types::AgentsStates;
use crate::solver::GridSolution;
use crate::storage::memory::Tables;
use crate::storage::{
    AgentsRecord, ClustersRecord, EventFilter, NewSimulation, SimulationId, SimulationRecord,
    SimulationStepRecord, StatesRecord, StepId, Storage,
};

const SIMULATIONS: &str = "simulations.jsonl";
const STEPS: &str = "simulation_steps.jsonl";
const FINALIZED: &str = "finalized_steps.jsonl";
const AGENTS: &str = "agents.jsonl";
const STATES: &str = "states.jsonl";
const CLUSTERS: &str = "clusters.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct Finalized {
    id: StepId,
}

/// Append-only JSON-lines store in a directory, one file per record kind.
///
/// Existing files are replayed on open, so a later process can query what
/// an earlier run wrote. Finalizing a step appends to a separate file
/// instead of rewriting the step. Clearing rewrites the files.
#[derive(Debug)]
pub struct JsonlStorage {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

/// Replays one file.
///
/// A last record that does not parse is a write torn by a killed process:
/// it is logged and cut off so later appends start on a clean line. A bad
/// record anywhere else is corruption and fails the open.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)?;
    let mut records = Vec::new();
    let mut offset = 0;
    for line in bytes.split_inclusive(|b| *b == b'\n') {
        let start = offset;
        offset += line.len();
        if line.trim_ascii().is_empty() {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(record) => records.push(record),
            Err(e) if bytes[offset..].trim_ascii().is_empty() => {
                warn!(file = %path.display(), error = %e, "dropping torn last record");
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(start as u64)?;
                return Ok(records);
            }
            Err(e) => {
                return Err(SimError::Storage(format!(
                    "corrupt record in {}: {e}",
                    path.display()
                )));
            }
        }
    }
    if bytes.last().is_some_and(|b| *b != b'\n') {
        // complete last record without its newline
        OpenOptions::new().append(true).open(path)?.write_all(b"\n")?;
    }
    Ok(records)
}

impl JsonlStorage {
    /// Opens the store at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// I/O failures, or [`SimError::Storage`] if a record other than the
    /// last one in a file does not parse.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut tables = Tables::default();
        for record in read_lines::<SimulationRecord>(&dir.join(SIMULATIONS))? {
            tables.observe_id(record.id.0);
            tables.simulations.insert(record.id, record);
        }
        for record in read_lines::<SimulationStepRecord>(&dir.join(STEPS))? {
            tables.observe_id(record.id.0);
            tables.steps.insert(record.id, record);
        }
        for Finalized { id } in read_lines::<Finalized>(&dir.join(FINALIZED))? {
            if let Some(step) = tables.steps.get_mut(&id) {
                step.valid = true;
            }
        }
        for record in read_lines::<AgentsRecord>(&dir.join(AGENTS))? {
            tables.agents.insert(record.simulation_step_id, record);
        }
        tables.states = read_lines(&dir.join(STATES))?;
        tables.clusters = read_lines(&dir.join(CLUSTERS))?;

        Ok(Self {
            dir,
            tables: Mutex::new(tables),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| SimError::Storage("jsonl store lock poisoned".to_string()))
    }

    fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer(&mut w, record)?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }

    fn rewrite<'a, T: Serialize + 'a>(
        &self,
        file: &str,
        records: impl IntoIterator<Item = &'a T>,
    ) -> Result<()> {
        let tmp = self.dir.join(format!("{file}.tmp"));
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            for record in records {
                serde_json::to_writer(&mut w, record)?;
                w.write_all(b"\n")?;
            }
            w.flush()?;
        }
        fs::rename(tmp, self.dir.join(file))?;
        Ok(())
    }

    /// Rewrites every file from the in-memory tables.
    fn rewrite_all(&self, tables: &Tables) -> Result<()> {
        self.rewrite(SIMULATIONS, tables.simulations.values())?;
        self.rewrite(STEPS, tables.steps.values())?;
        let finalized: Vec<Finalized> = tables
            .steps
            .values()
            .filter(|s| s.valid)
            .map(|s| Finalized { id: s.id })
            .collect();
        self.rewrite(FINALIZED, finalized.iter())?;
        self.rewrite(AGENTS, tables.agents.values())?;
        self.rewrite(STATES, tables.states.iter())?;
        self.rewrite(CLUSTERS, tables.clusters.iter())
    }
}

impl Storage for JsonlStorage {
    fn write_simulation(&self, simulation: NewSimulation) -> Result<SimulationId> {
        let mut tables = self.lock()?;
        let record = tables.insert_simulation(simulation);
        self.append(SIMULATIONS, &record)?;
        Ok(record.id)
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
        let mut tables = self.lock()?;
        let record = tables.insert_step(
            simulation_id,
            simulation_step,
            simulation_result,
            agents_states,
            total_pv_power,
        );
        self.append(STEPS, &record)?;
        Ok(record.id)
    }

    fn finalize_simulation_step(&self, step_id: StepId) -> Result<()> {
        let mut tables = self.lock()?;
        tables.finalize(step_id)?;
        self.append(FINALIZED, &Finalized { id: step_id })
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
        let mut tables = self.lock()?;
        let record = tables.insert_agents(agents, simulation_step_id, simulation_id);
        self.append(AGENTS, &record)
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
        let record = StatesRecord {
            simulation_id,
            simulation_step,
            is_applied,
            states: states.clone(),
        };
        let mut tables = self.lock()?;
        self.append(STATES, &record)?;
        tables.states.push(record);
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
        let record = ClustersRecord {
            simulation_id,
            simulation_step,
            is_applied,
            clusters: clusters.clone(),
        };
        let mut tables = self.lock()?;
        self.append(CLUSTERS, &record)?;
        tables.clusters.push(record);
        Ok(())
    }

    fn read_clusters(&self, filter: &EventFilter) -> Result<Vec<ClustersRecord>> {
        Ok(self.lock()?.clusters_matching(filter))
    }

    fn clear_simulation(&self, simulation_id: SimulationId) -> Result<()> {
        let mut tables = self.lock()?;
        tables.remove_simulation(simulation_id);
        self.rewrite_all(&tables)
    }

    fn clear_all(&self) -> Result<()> {
        let mut tables = self.lock()?;
        tables.clear();
        self.rewrite_all(&tables)
    }
}
