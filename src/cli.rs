use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lvgrid_sim::solver::SolverType;

#[derive(Parser, Debug)]
#[command(author, version, about = "Low-voltage grid simulator", long_about = None)]
pub struct Cli {
    /// Log level filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation from a configuration file
    Run {
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured tick budget (0 = until interrupted)
        #[arg(long)]
        steps: Option<usize>,
        /// Override the configured solver
        #[arg(long, value_parser = parse_solver)]
        solver: Option<SolverType>,
        /// Write per-step telemetry as CSV
        #[arg(long)]
        telemetry_out: Option<PathBuf>,
    },
    /// Queue a state event for a running simulation
    SubmitStates {
        /// Spool queue directory of the running simulation
        #[arg(long)]
        queue: PathBuf,
        /// JSON file holding `{agent_name: partial_state}`
        file: PathBuf,
    },
    /// Queue a cluster configuration for a running simulation
    SubmitClusters {
        /// Spool queue directory of the running simulation
        #[arg(long)]
        queue: PathBuf,
        /// JSON file holding `{cluster_name: cluster}`
        file: PathBuf,
    },
}

fn parse_solver(s: &str) -> Result<SolverType, String> {
    s.parse().map_err(|e: lvgrid_sim::SimError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "lvgrid-sim",
            "run",
            "--config",
            "sim.toml",
            "--steps",
            "12",
            "--solver",
            "non_linear",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                config,
                steps,
                solver,
                telemetry_out,
            } => {
                assert_eq!(config, PathBuf::from("sim.toml"));
                assert_eq!(steps, Some(12));
                assert_eq!(solver, Some(SolverType::NonLinear));
                assert!(telemetry_out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_bad_solver_rejected() {
        let result = Cli::try_parse_from([
            "lvgrid-sim",
            "run",
            "--config",
            "sim.toml",
            "--solver",
            "newton",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_submit_states() {
        let cli = Cli::try_parse_from([
            "lvgrid-sim",
            "--log-level",
            "debug",
            "submit-states",
            "--queue",
            "spool",
            "states.json",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::SubmitStates { .. }));
    }
}
