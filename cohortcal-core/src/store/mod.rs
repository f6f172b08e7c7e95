//! SQLite-backed event store.
//!
//! The store owns the `events`, `rooms`, `cohorts` and `versions` tables.
//! Each operation opens its own connection, so an `EventStore` is cheap to
//! clone and share across threads, and several processes may use the same
//! database file at once.

mod cohorts;
mod events;
mod query;
mod rooms;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use crate::cohort::Cohort;
use crate::error::StoreResult;
use crate::event::Event;
use crate::room::Room;
use crate::time::DEFAULT_TIMEZONE;
use crate::version::{self, VersionKey};

pub use query::EventQuery;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Consistent read of one version key together with the rows it covers.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub events: Vec<Event>,
    pub rooms: Vec<Room>,
    pub cohorts: Vec<Cohort>,
}

#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
    /// Zone stored wall-clock times are read in; inserts must exist there.
    timezone: Tz,
}

impl EventStore {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = EventStore {
            path,
            timezone: DEFAULT_TIMEZONE,
        };
        let mut conn = store.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::apply_migrations(&mut conn)?;

        debug!(path = %store.path.display(), "event store opened");
        Ok(store)
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Current value of the global counter.
    pub fn current_version(&self) -> StoreResult<u64> {
        self.version(&VersionKey::Global)
    }

    pub fn version(&self, key: &VersionKey) -> StoreResult<u64> {
        let conn = self.connect()?;
        Ok(version::read(&conn, key)?)
    }

    /// Read the version of `key` and the events matching `query` from one
    /// database snapshot, so the rows are exactly those the version describes.
    pub fn snapshot(&self, key: &VersionKey, query: &EventQuery) -> StoreResult<Snapshot> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let version = version::read(&tx, key)?;
        let events = events::select(&tx, query)?;
        let rooms = rooms::select_all(&tx)?;
        let cohorts = cohorts::select_all(&tx)?;
        tx.commit()?;

        Ok(Snapshot {
            version,
            events,
            rooms,
            cohorts,
        })
    }
}
