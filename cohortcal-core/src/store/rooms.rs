use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::info;

use super::EventStore;
use crate::error::{StoreError, StoreResult};
use crate::room::{NewRoom, Room, RoomId};

impl EventStore {
    pub fn insert_room(&self, room: &NewRoom) -> StoreResult<Room> {
        room.validate()?;
        let conn = self.connect()?;

        let location = room.location.trim();
        let inserted = conn.execute(
            "INSERT INTO rooms (location, capacity, kind) VALUES (?1, ?2, ?3)",
            params![location, room.capacity, room.kind],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::RoomExists(location.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = RoomId(conn.last_insert_rowid());
        info!(room_id = %id, location, "room added");
        Ok(Room {
            id,
            location: location.to_string(),
            capacity: room.capacity,
            kind: room.kind.clone(),
        })
    }

    /// Remove a room by its location.
    ///
    /// Events referencing the room keep their `room_id`; exports render the
    /// missing room as an empty location.
    pub fn delete_room(&self, location: &str) -> StoreResult<Room> {
        let conn = self.connect()?;
        let room = find_by_location(&conn, location)?
            .ok_or_else(|| StoreError::RoomNotFound(location.to_string()))?;

        conn.execute("DELETE FROM rooms WHERE room_id = ?1", params![room.id.0])?;
        info!(room_id = %room.id, location, "room removed");
        Ok(room)
    }

    pub fn room_by_location(&self, location: &str) -> StoreResult<Option<Room>> {
        let conn = self.connect()?;
        find_by_location(&conn, location)
    }

    pub fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let conn = self.connect()?;
        select_all(&conn)
    }
}

pub(super) fn select_all(conn: &Connection) -> StoreResult<Vec<Room>> {
    let mut stmt =
        conn.prepare("SELECT room_id, location, capacity, kind FROM rooms ORDER BY location")?;
    let rooms = stmt
        .query_map([], room_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rooms)
}

pub(super) fn find_by_id(conn: &Connection, id: RoomId) -> StoreResult<Option<Room>> {
    Ok(conn
        .query_row(
            "SELECT room_id, location, capacity, kind FROM rooms WHERE room_id = ?1",
            params![id.0],
            room_from_row,
        )
        .optional()?)
}

fn find_by_location(conn: &Connection, location: &str) -> StoreResult<Option<Room>> {
    Ok(conn
        .query_row(
            "SELECT room_id, location, capacity, kind FROM rooms WHERE location = ?1",
            params![location.trim()],
            room_from_row,
        )
        .optional()?)
}

fn room_from_row(row: &Row) -> rusqlite::Result<Room> {
    Ok(Room {
        id: RoomId(row.get(0)?),
        location: row.get(1)?,
        capacity: row.get(2)?,
        kind: row.get(3)?,
    })
}
