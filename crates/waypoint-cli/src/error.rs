//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;
use waypoint_core::MigrationError;

/// Errors reported by the `waypoint` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Plan definition could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plan definition is not valid JSON.
    #[error("invalid plan definition {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Marker database could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    /// No marker is stored for the plan.
    #[error("no state stored for plan {0}")]
    NoMarker(String),

    /// Plan error.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
