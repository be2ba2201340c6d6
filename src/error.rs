//! Error taxonomy shared by the grid model, the simulation loop and its collaborators.

use std::path::PathBuf;

/// Errors raised while loading, validating or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Input JSON is malformed, incomplete, or has out-of-range fields.
    #[error("{entity} is not valid: {detail}")]
    Validation { entity: String, detail: String },

    /// A configuration, topology or grid-elements file does not exist.
    #[error("could not find file '{}'", path.display())]
    FilePathNotFound { path: PathBuf },

    /// A fault in the simulation logic itself (bad topology reference, solver divergence, ...).
    #[error("simulation error: {0}")]
    Simulation(String),

    /// A cluster references a controller name that has no policy.
    #[error("unknown cluster controller \"{name}\"")]
    UnknownController { name: String },

    /// The persistent store rejected or failed an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// The event queue rejected or failed an operation.
    #[error("event queue error: {0}")]
    Queue(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl SimError {
    /// Builds a [`SimError::Validation`] for the named entity.
    pub fn validation(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            entity: entity.into(),
            detail: detail.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = SimError> = std::result::Result<T, E>;
