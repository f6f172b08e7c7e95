use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info};

use super::{EventQuery, EventStore, cohorts, rooms};
use crate::cohort::CohortId;
use crate::error::{StoreError, StoreResult};
use crate::event::{Event, EventId, NewEvent, UserId};
use crate::room::RoomId;
use crate::time::{STORAGE_FORMAT, format_wall_clock, truncate};
use crate::version;

const SELECT_EVENTS: &str = "SELECT event_id, starts_at, ends_at, subject, category, note,
        room_id, owner_id, cohort_id, created_at
    FROM events";

impl EventStore {
    /// Insert an event and bump the affected version counters.
    ///
    /// Fails with `Duplicate` if the cohort already has an event starting at
    /// the same wall-clock time, and with `InvalidData` for times the store's
    /// timezone skips. The check, the insert and the version bump commit
    /// together or not at all.
    pub fn insert_event(&self, event: &NewEvent) -> StoreResult<Event> {
        event.validate_in(&self.timezone)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let cohort = cohorts::find_by_id(&tx, event.cohort_id)?
            .ok_or_else(|| StoreError::CohortNotFound(event.cohort_id.to_string()))?;
        if let Some(room_id) = event.room_id {
            if rooms::find_by_id(&tx, room_id)?.is_none() {
                return Err(StoreError::RoomNotFound(room_id.to_string()));
            }
        }

        let start = format_wall_clock(&event.start);
        let duplicate = || StoreError::Duplicate {
            cohort: cohort.name.clone(),
            start: start.clone(),
        };

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE cohort_id = ?1 AND starts_at = ?2)",
            params![event.cohort_id.0, start],
            |row| row.get(0),
        )?;
        if taken {
            return Err(duplicate());
        }

        let created_at = Utc::now();
        let inserted = tx.execute(
            "INSERT INTO events
                (starts_at, ends_at, subject, category, note, room_id, owner_id, cohort_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                start,
                format_wall_clock(&event.end),
                event.subject,
                event.category,
                event.note,
                event.room_id.map(|r| r.0),
                event.owner_id.map(|u| u.0),
                event.cohort_id.0,
                created_at.to_rfc3339(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(duplicate());
            }
            Err(e) => return Err(e.into()),
        }

        let id = EventId(tx.last_insert_rowid());
        let version = version::bump(&tx, event.cohort_id)?;
        tx.commit()?;

        info!(event_id = %id, cohort = %cohort.name, start = %start, version, "event inserted");

        Ok(Event {
            id,
            start: truncate(event.start),
            end: truncate(event.end),
            subject: event.subject.clone(),
            category: event.category.clone(),
            note: event.note.clone(),
            room_id: event.room_id,
            owner_id: event.owner_id,
            cohort_id: event.cohort_id,
            created_at,
        })
    }

    /// Delete an event by id and bump the affected version counters.
    /// Returns the removed row.
    pub fn delete_event(&self, id: EventId) -> StoreResult<Event> {
        if id.0 <= 0 {
            return Err(StoreError::InvalidEventId(id.to_string()));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let event = find_by_id(&tx, id)?.ok_or(StoreError::EventNotFound(id))?;
        tx.execute("DELETE FROM events WHERE event_id = ?1", params![id.0])?;
        let version = version::bump(&tx, event.cohort_id)?;
        tx.commit()?;

        info!(event_id = %id, cohort_id = %event.cohort_id, version, "event deleted");
        Ok(event)
    }

    pub fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        let conn = self.connect()?;
        find_by_id(&conn, id)
    }

    /// Live events matching `query`, ordered by start time then id.
    pub fn query_events(&self, query: &EventQuery) -> StoreResult<Vec<Event>> {
        let conn = self.connect()?;
        select(&conn, query)
    }
}

pub(super) fn select(conn: &Connection, query: &EventQuery) -> StoreResult<Vec<Event>> {
    let Some((where_sql, binds)) = query.where_clause() else {
        debug!("event query has an empty membership list; skipping");
        return Ok(Vec::new());
    };

    let sql = format!("{}{} ORDER BY starts_at, event_id", SELECT_EVENTS, where_sql);
    let mut stmt = conn.prepare(&sql)?;
    let events = stmt
        .query_map(params_from_iter(binds), event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

fn find_by_id(conn: &Connection, id: EventId) -> StoreResult<Option<Event>> {
    let sql = format!("{} WHERE event_id = ?1", SELECT_EVENTS);
    Ok(conn
        .query_row(&sql, params![id.0], event_from_row)
        .optional()?)
}

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: EventId(row.get(0)?),
        start: wall_clock_column(row, 1)?,
        end: wall_clock_column(row, 2)?,
        subject: row.get(3)?,
        category: row.get(4)?,
        note: row.get(5)?,
        room_id: row.get::<_, Option<i64>>(6)?.map(RoomId),
        owner_id: row.get::<_, Option<i64>>(7)?.map(UserId),
        cohort_id: CohortId(row.get(8)?),
        created_at: instant_column(row, 9)?,
    })
}

fn wall_clock_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, STORAGE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn instant_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
