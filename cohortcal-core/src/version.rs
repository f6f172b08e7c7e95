//! Monotonic mutation counters.
//!
//! One global counter covers the whole event table; one counter per cohort
//! covers that cohort's rows. Every committed insert or delete on `events`
//! bumps both the global counter and the affected cohort's counter, inside
//! the mutation's own transaction.

use std::fmt;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::cohort::CohortId;

/// Key of the global event counter.
pub const GLOBAL_KEY: &str = "events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionKey {
    /// Counts every event mutation.
    Global,
    /// Counts mutations of one cohort's events.
    Cohort(CohortId),
}

impl VersionKey {
    pub fn as_key(&self) -> String {
        match self {
            VersionKey::Global => GLOBAL_KEY.to_string(),
            VersionKey::Cohort(id) => format!("{}:cohort:{}", GLOBAL_KEY, id),
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// Bump the counters touched by a mutation of `cohort`'s events and return
/// the new global version.
///
/// Must be called on the transaction that performs the mutation.
pub(crate) fn bump(conn: &Connection, cohort: CohortId) -> rusqlite::Result<u64> {
    let now = Utc::now().to_rfc3339();

    for key in [VersionKey::Global, VersionKey::Cohort(cohort)] {
        conn.execute(
            "INSERT INTO versions (key, version, last_modified) VALUES (?1, 1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                version = version + 1,
                last_modified = excluded.last_modified",
            params![key.as_key(), now],
        )?;
    }

    read(conn, &VersionKey::Global)
}

/// Read a counter. A key that was never bumped reads as 0.
pub(crate) fn read(conn: &Connection, key: &VersionKey) -> rusqlite::Result<u64> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM versions WHERE key = ?1",
            params![key.as_key()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.map_or(0, |v| v.max(0) as u64))
}
