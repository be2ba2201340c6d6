//! Run configuration: grid files, tick budget, solver and the connection
//! parameters of the event queue and the store.
//!
//! Loaded from TOML or JSON, chosen by file extension.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result as SimResult, SimError};
use crate::solver::SolverType;

/// Top-level run configuration.
///
/// `topology` and `grid_elements` are required; every other field has a
/// default. Relative paths are resolved by the caller, usually against the
/// working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the topology document (paths and nodes).
    pub topology: PathBuf,
    /// Path to the grid-elements document (agents and lines).
    pub grid_elements: PathBuf,
    /// Tick budget; `0` runs until cancelled.
    #[serde(default = "default_simulation_steps")]
    pub simulation_steps: usize,
    /// Artificial delay per tick, in milliseconds.
    #[serde(default)]
    pub latency: u64,
    #[serde(default)]
    pub solver_type: SolverType,
    /// Optional initial cluster configuration. An empty path means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<PathBuf>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_simulation_steps() -> usize {
    100
}

/// Which store backs a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    /// JSON-lines files in a directory.
    Jsonl,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory of the `jsonl` backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Which event queue feeds a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    #[default]
    Memory,
    /// Spool directory shared with external producers.
    Spool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// Root directory of the `spool` backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"storage.path"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Minimal configuration with every default.
    pub fn new(topology: impl Into<PathBuf>, grid_elements: impl Into<PathBuf>) -> Self {
        Self {
            topology: topology.into(),
            grid_elements: grid_elements.into(),
            simulation_steps: default_simulation_steps(),
            latency: 0,
            solver_type: SolverType::default(),
            clusters: None,
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
        }
    }

    /// Reads a configuration file, as JSON when the extension is `.json`
    /// and as TOML otherwise.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the JSON is invalid or contains unknown fields.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError {
            field: "json".to_string(),
            message: e.to_string(),
        })
    }

    /// The initial cluster file, if one is configured.
    pub fn clusters_file(&self) -> Option<&Path> {
        self.clusters
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn latency(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.latency)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. File existence is
    /// checked separately by [`Config::check_files`].
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.topology.as_os_str().is_empty() {
            errors.push(ConfigError {
                field: "topology".into(),
                message: "must not be empty".into(),
            });
        }
        if self.grid_elements.as_os_str().is_empty() {
            errors.push(ConfigError {
                field: "grid_elements".into(),
                message: "must not be empty".into(),
            });
        }
        if self.solver_type == SolverType::Custom {
            errors.push(ConfigError {
                field: "solver_type".into(),
                message: "\"custom\" needs a solver supplied through the library".into(),
            });
        }
        if self.storage.backend == StorageBackend::Jsonl && self.storage.path.is_none() {
            errors.push(ConfigError {
                field: "storage.path".into(),
                message: "required by the jsonl backend".into(),
            });
        }
        if self.queue.backend == QueueBackend::Spool && self.queue.path.is_none() {
            errors.push(ConfigError {
                field: "queue.path".into(),
                message: "required by the spool backend".into(),
            });
        }

        errors
    }

    /// Checks that every referenced input file exists.
    ///
    /// # Errors
    ///
    /// [`SimError::FilePathNotFound`] for the first missing file.
    pub fn check_files(&self) -> SimResult<()> {
        let files = [
            Some(self.topology.as_path()),
            Some(self.grid_elements.as_path()),
            self.clusters_file(),
        ];
        for path in files.into_iter().flatten() {
            if !path.is_file() {
                return Err(SimError::FilePathNotFound {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let cfg = Config::from_toml_str(
            r#"
topology = "topology.json"
grid_elements = "grid_elements.json"
"#,
        )
        .unwrap();
        assert_eq!(cfg.simulation_steps, 100);
        assert_eq!(cfg.latency, 0);
        assert_eq!(cfg.solver_type, SolverType::Linear);
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert!(cfg.clusters_file().is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_full_toml_parses() {
        let cfg = Config::from_toml_str(
            r#"
topology = "t.json"
grid_elements = "g.json"
simulation_steps = 0
latency = 250
solver_type = "non_linear"
clusters = "clusters.json"

[storage]
backend = "jsonl"
path = "out/store"

[queue]
backend = "spool"
path = "out/queue"
"#,
        )
        .unwrap();
        assert_eq!(cfg.simulation_steps, 0);
        assert_eq!(cfg.latency().as_millis(), 250);
        assert_eq!(cfg.solver_type, SolverType::NonLinear);
        assert_eq!(cfg.clusters_file(), Some(Path::new("clusters.json")));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_json_config_with_empty_clusters() {
        let cfg = Config::from_json_str(
            r#"{"topology": "t.json", "grid_elements": "g.json",
                "simulation_steps": 5, "solver_type": "linear", "clusters": ""}"#,
        )
        .unwrap();
        assert_eq!(cfg.simulation_steps, 5);
        assert!(cfg.clusters_file().is_none());
    }

    #[test]
    fn test_missing_required_field() {
        assert!(Config::from_toml_str("topology = \"t.json\"").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml_str(
            r#"
topology = "t.json"
grid_elements = "g.json"
redis_port = 6379
"#,
        )
        .unwrap_err();
        assert_eq!(err.field, "toml");
    }

    #[test]
    fn test_unknown_solver_rejected() {
        let result = Config::from_json_str(
            r#"{"topology": "t.json", "grid_elements": "g.json", "solver_type": "newton"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_catches_missing_backend_paths() {
        let mut cfg = Config::new("t.json", "g.json");
        cfg.storage.backend = StorageBackend::Jsonl;
        cfg.queue.backend = QueueBackend::Spool;
        cfg.solver_type = SolverType::Custom;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "storage.path"));
        assert!(errors.iter().any(|e| e.field == "queue.path"));
        assert!(errors.iter().any(|e| e.field == "solver_type"));
    }

    #[test]
    fn test_check_files_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let topology = dir.path().join("topology.json");
        fs::write(&topology, "{}").unwrap();
        let cfg = Config::new(&topology, dir.path().join("missing.json"));
        match cfg.check_files() {
            Err(SimError::FilePathNotFound { path }) => {
                assert!(path.ends_with("missing.json"));
            }
            other => panic!("expected a missing file, got {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let mut cfg = Config::new("t.json", "g.json");
        cfg.clusters = Some(PathBuf::from("c.json"));
        cfg.queue.backend = QueueBackend::Spool;
        cfg.queue.path = Some(PathBuf::from("q"));
        let text = serde_json::to_string(&cfg).unwrap();
        assert_eq!(Config::from_json_str(&text).unwrap(), cfg);
    }
}
