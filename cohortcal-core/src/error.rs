//! Error types for cohortcal.

use std::path::PathBuf;

use thiserror::Error;

use crate::event::EventId;

/// Errors raised by the event store.
///
/// Business-rule violations (`Duplicate`, `*NotFound`, `*Exists`) are
/// recoverable by the caller. `Storage` and `Io` mean the storage layer itself
/// failed and are never retried by the core.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("An event already starts at {start} for cohort {cohort}")]
    Duplicate { cohort: String, start: String },

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Invalid event id: {0}")]
    InvalidEventId(String),

    #[error("Room already exists: {0}")]
    RoomExists(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Cohort already exists: {0}")]
    CohortExists(String),

    #[error("Cohort not found: {0}")]
    CohortNotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True when the storage layer failed, as opposed to a rejected request.
    pub fn is_storage(&self) -> bool {
        matches!(self, StoreError::Storage(_) | StoreError::Io(_))
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while producing or serving an export.
///
/// `NoEvents` is not a failure: the partition legitimately has nothing to
/// export. Every other variant leaves the cache record untouched so the next
/// request retries.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No events to export")]
    NoEvents,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Export generation error: {0}")]
    Generation(String),

    #[error("Could not publish {}: {source}", path.display())]
    Publish {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cache record error: {0}")]
    Sidecar(String),
}

/// Result type alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Unknown timezone: {0}")]
    Timezone(String),

    #[error("Invalid bind address: {0}")]
    Bind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
