//! Rooms that events take place in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Unique display name, e.g. "2Z34"
    pub location: String,
    pub capacity: u32,
    /// Free-form category, e.g. "CM", "TP", "Exams"
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoom {
    pub location: String,
    pub capacity: u32,
    #[serde(default)]
    pub kind: String,
}

impl NewRoom {
    pub fn new(location: impl Into<String>, capacity: u32, kind: impl Into<String>) -> Self {
        NewRoom {
            location: location.into(),
            capacity,
            kind: kind.into(),
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.location.trim().is_empty() {
            return Err(StoreError::InvalidData("room location is empty".into()));
        }
        if self.capacity == 0 {
            return Err(StoreError::InvalidData(format!(
                "room {} must have a capacity greater than 0",
                self.location
            )));
        }
        Ok(())
    }
}
