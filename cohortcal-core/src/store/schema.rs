//! Schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
        CREATE TABLE IF NOT EXISTS rooms (
            room_id INTEGER PRIMARY KEY AUTOINCREMENT,
            location TEXT NOT NULL UNIQUE,
            capacity INTEGER NOT NULL,
            kind TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS cohorts (
            cohort_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS events (
            event_id INTEGER PRIMARY KEY AUTOINCREMENT,
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            subject TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            note TEXT NOT NULL DEFAULT '',
            room_id INTEGER,
            owner_id INTEGER,
            cohort_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS events_cohort_start
            ON events (cohort_id, starts_at);

        CREATE INDEX IF NOT EXISTS events_starts_at ON events (starts_at);

        CREATE TABLE IF NOT EXISTS versions (
            key TEXT PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0,
            last_modified TEXT NOT NULL
        );

        INSERT OR IGNORE INTO versions (key, version, last_modified)
            VALUES ('events', 0, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'));
    ",
}];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Apply pending migrations. Safe to race from several processes: the
/// version is re-read under an immediate (write-locking) transaction.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let latest = latest_version();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current: u32 = tx.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    if current > latest {
        return Err(StoreError::InvalidData(format!(
            "database schema version {} is newer than supported {}",
            current, latest
        )));
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(version = migration.version, "applied schema migration");
    }

    tx.commit()?;
    Ok(())
}
