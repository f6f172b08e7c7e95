use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::info;

use super::EventStore;
use crate::cohort::{Cohort, CohortId};
use crate::error::{StoreError, StoreResult};

impl EventStore {
    pub fn insert_cohort(&self, name: &str) -> StoreResult<Cohort> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidData("cohort name is empty".into()));
        }

        let conn = self.connect()?;
        let inserted = conn.execute("INSERT INTO cohorts (name) VALUES (?1)", params![name]);
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::CohortExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let cohort = Cohort {
            id: CohortId(conn.last_insert_rowid()),
            name: name.to_string(),
        };
        info!(cohort_id = %cohort.id, name, "cohort added");
        Ok(cohort)
    }

    pub fn cohort_by_name(&self, name: &str) -> StoreResult<Option<Cohort>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT cohort_id, name FROM cohorts WHERE name = ?1",
                params![name.trim()],
                cohort_from_row,
            )
            .optional()?)
    }

    pub fn cohort(&self, id: CohortId) -> StoreResult<Option<Cohort>> {
        let conn = self.connect()?;
        find_by_id(&conn, id)
    }

    /// Every cohort, ordered by name.
    pub fn list_cohorts(&self) -> StoreResult<Vec<Cohort>> {
        let conn = self.connect()?;
        select_all(&conn)
    }
}

pub(super) fn select_all(conn: &Connection) -> StoreResult<Vec<Cohort>> {
    let mut stmt = conn.prepare("SELECT cohort_id, name FROM cohorts ORDER BY name")?;
    let cohorts = stmt
        .query_map([], cohort_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cohorts)
}

pub(super) fn find_by_id(conn: &Connection, id: CohortId) -> StoreResult<Option<Cohort>> {
    Ok(conn
        .query_row(
            "SELECT cohort_id, name FROM cohorts WHERE cohort_id = ?1",
            params![id.0],
            cohort_from_row,
        )
        .optional()?)
}

fn cohort_from_row(row: &Row) -> rusqlite::Result<Cohort> {
    Ok(Cohort {
        id: CohortId(row.get(0)?),
        name: row.get(1)?,
    })
}
