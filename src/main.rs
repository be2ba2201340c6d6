//! Low-voltage grid simulator entry point: CLI wiring and config-driven
//! construction of the simulation and its collaborators.

mod cli;

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lvgrid_sim::cluster::ClusterSet;
use lvgrid_sim::config::{Config, QueueBackend, StorageBackend};
use lvgrid_sim::event::{
    ClustersEvent, EventQueue, InMemoryEventQueue, SpoolEventQueue, StatesEvent,
};
use lvgrid_sim::grid::{load_grid_elements, load_topology, read_json, validate_consistency};
use lvgrid_sim::io::export::export_csv;
use lvgrid_sim::sim::Simulation;
use lvgrid_sim::solver::create_solver;
use lvgrid_sim::storage::{InMemoryStorage, JsonlStorage, Storage};
use lvgrid_sim::{Result, SimError};

use cli::{Cli, Command};

fn open_queue(cfg: &Config) -> Result<Box<dyn EventQueue>> {
    Ok(match (cfg.queue.backend, &cfg.queue.path) {
        (QueueBackend::Spool, Some(path)) => Box::new(SpoolEventQueue::open(path)?),
        _ => Box::new(InMemoryEventQueue::new()),
    })
}

fn open_storage(cfg: &Config) -> Result<Box<dyn Storage>> {
    Ok(match (cfg.storage.backend, &cfg.storage.path) {
        (StorageBackend::Jsonl, Some(path)) => Box::new(JsonlStorage::open(path)?),
        _ => Box::new(InMemoryStorage::new()),
    })
}

/// Loads the grid described by `cfg` and runs it to completion.
fn run_simulation(cfg: &Config, telemetry_out: Option<&Path>) -> Result<()> {
    cfg.check_files()?;
    let elements = load_grid_elements(&read_json(&cfg.grid_elements)?)?;
    let topology = load_topology(&read_json(&cfg.topology)?)?;
    validate_consistency(&elements, &topology)?;

    let clusters = match cfg.clusters_file() {
        Some(path) => ClusterSet::from_value(&read_json(path)?)?,
        None => ClusterSet::new(),
    };
    let solver = create_solver(
        cfg.solver_type,
        &topology.paths,
        &topology.nodes,
        &elements.lines,
    )?;

    let mut simulation = Simulation::new(
        elements,
        topology,
        clusters,
        solver,
        open_queue(cfg)?,
        open_storage(cfg)?,
    )?
    .with_latency(cfg.latency());

    let outcome = simulation.run(cfg.simulation_steps, None);

    // completed steps are exported even when the loop aborted
    if let Some(path) = telemetry_out {
        let steps = simulation
            .storage()
            .read_simulation_steps(simulation.id(), true)?;
        export_csv(&steps, path)?;
        info!(path = %path.display(), steps = steps.len(), "telemetry written");
    }

    outcome.map(|_| ())
}

fn read_payload(path: &Path) -> Result<BTreeMap<String, Value>> {
    serde_json::from_value(read_json(path)?)
        .map_err(|e| SimError::validation(path.display().to_string(), e.to_string()))
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Run {
            config,
            steps,
            solver,
            telemetry_out,
        } => {
            let mut cfg = match Config::from_file(&config) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            };
            if let Some(steps) = steps {
                cfg.simulation_steps = steps;
            }
            if let Some(solver) = solver {
                cfg.solver_type = solver;
            }

            let errors = cfg.validate();
            if !errors.is_empty() {
                for e in &errors {
                    eprintln!("{e}");
                }
                process::exit(1);
            }
            run_simulation(&cfg, telemetry_out.as_deref())
        }
        Command::SubmitStates { queue, file } => read_payload(&file).and_then(|states| {
            SpoolEventQueue::open(queue)?.write_states(StatesEvent { states })
        }),
        Command::SubmitClusters { queue, file } => read_payload(&file).and_then(|clusters| {
            SpoolEventQueue::open(queue)?.write_clusters(ClustersEvent { clusters })
        }),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
