//! Sidecar records: the version and settings a published file was
//! generated with.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::publish::write_atomic;
use crate::error::{ExportError, ExportResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    /// `ExportSettings::fingerprint` of the settings the file was rendered
    /// with. Records written without one never match.
    #[serde(default)]
    pub settings: String,
}

impl CacheRecord {
    /// True if the file this record describes can be served as-is.
    pub fn matches(&self, version: u64, settings: &str) -> bool {
        self.version == version && self.settings == settings
    }
}

/// Read a sidecar record. A missing or unreadable record reads as `None`,
/// which makes the entry stale and triggers a regeneration.
pub fn read(path: &Path) -> ExportResult<Option<CacheRecord>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ExportError::Sidecar(format!(
                "{}: {}",
                path.display(),
                e
            )));
        }
    };

    match serde_json::from_str(&raw) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt cache record");
            Ok(None)
        }
    }
}

/// Write a sidecar record. Must only be called after the file it describes
/// has been published.
pub fn write(path: &Path, record: &CacheRecord) -> ExportResult<()> {
    let json = serde_json::to_string(record)
        .map_err(|e| ExportError::Sidecar(format!("{}: {}", path.display(), e)))?;
    write_atomic(path, json.as_bytes())
}

pub fn remove(path: &Path) -> ExportResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ExportError::Sidecar(format!("{}: {}", path.display(), e))),
    }
}
