//! Core of the cohortcal schedule service.
//!
//! This crate provides everything shared by cohortcal-server and the CLI:
//! - `store` for events, rooms and cohorts in SQLite, with per-cohort
//!   start-time uniqueness and version counters bumped on every mutation
//! - `export` for iCalendar and CSV documents
//! - `cache` for versioned, lock-protected export files
//! - `registry` for enumerating the partitions exports are served for

pub mod cache;
pub mod cohort;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod partition;
pub mod registry;
pub mod room;
pub mod store;
pub mod time;
pub mod version;

pub use cache::{CachedExport, EntryState, ExportCache, ExportOutcome};
pub use cohort::{Cohort, CohortId};
pub use crate::config::CohortcalConfig;
pub use error::{ConfigError, ExportError, StoreError};
pub use event::{Event, EventId, NewEvent, UserId};
pub use export::{ExportFormat, ExportSettings};
pub use partition::Partition;
pub use registry::{PartitionRegistry, RegisteredPartition};
pub use room::{NewRoom, Room, RoomId};
pub use store::{EventQuery, EventStore, Snapshot};
pub use version::VersionKey;
