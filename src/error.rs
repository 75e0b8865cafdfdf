//! Error taxonomy for tag store operations.
//!
//! Library code returns [`StoreError`]; the binary and configuration loading
//! wrap it in `anyhow` at the edges.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, updating or querying a tag database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Directory creation, deletion or sidecar I/O failed.
    #[error("filesystem error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The indexer or search tool exited unsuccessfully or wrote to stderr.
    #[error("`{command}` failed: {message}")]
    ExternalProcess { command: String, message: String },

    /// An explicitly requested external tool is missing or the config is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A line of the library sidecar could not be parsed.
    #[error("malformed library registry record at line {line_number}: {line:?}")]
    MalformedRegistryRecord { line_number: usize, line: String },

    /// The user answered no to a removal prompt.
    #[error("removal of {} was not confirmed", path.display())]
    UserDeclinedConfirmation { path: PathBuf },

    /// The update worker thread could not be started.
    #[error("failed to start update worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A job was submitted after the update worker shut down.
    #[error("update scheduler has been shut down")]
    SchedulerStopped,
}

impl StoreError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
