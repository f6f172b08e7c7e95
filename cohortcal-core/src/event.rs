//! Scheduled events (lectures, exams, ...).

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::cohort::CohortId;
use crate::error::{StoreError, StoreResult};
use crate::room::RoomId;
use crate::time::{exists_in, to_utc};

/// Domain part of exported calendar UIDs (`<id>@cohortcal`).
pub const UID_DOMAIN: &str = "cohortcal";

/// Store-assigned event identity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl EventId {
    /// Parse an id from either a bare number (`42`) or an exported calendar
    /// UID (`42@cohortcal`).
    pub fn from_uid(uid: &str) -> StoreResult<Self> {
        let local = uid.split('@').next().unwrap_or_default().trim();
        let id: i64 = local
            .parse()
            .map_err(|_| StoreError::InvalidEventId(uid.to_string()))?;

        if id <= 0 {
            return Err(StoreError::InvalidEventId(uid.to_string()));
        }
        Ok(EventId(id))
    }

    pub fn uid(&self) -> String {
        format!("{}@{}", self.0, UID_DOMAIN)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the person running the event. Accounts live outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live event row.
///
/// `start` and `end` are wall-clock times in the schedule's home timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub subject: String,
    pub category: String,
    pub note: String,
    pub room_id: Option<RoomId>,
    pub owner_id: Option<UserId>,
    pub cohort_id: CohortId,
    /// When the row was inserted. Used as the export's DTSTAMP.
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn uid(&self) -> String {
        self.id.uid()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.subject)
        } else {
            write!(f, "{} - {}", self.subject, self.category)
        }
    }
}

/// An event waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub subject: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    pub cohort_id: CohortId,
}

impl NewEvent {
    pub fn new(
        cohort_id: CohortId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        subject: impl Into<String>,
    ) -> Self {
        NewEvent {
            start,
            end,
            subject: subject.into(),
            category: String::new(),
            note: String::new(),
            room_id: None,
            owner_id: None,
            cohort_id,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.subject.trim().is_empty() {
            return Err(StoreError::InvalidData("event subject is empty".into()));
        }
        if self.end < self.start {
            return Err(StoreError::InvalidData(format!(
                "event ends ({}) before it starts ({})",
                self.end, self.start
            )));
        }
        Ok(())
    }

    /// `validate`, plus checks that need the schedule's timezone: both ends
    /// must exist as local times in `tz`, and the event must not run
    /// backwards once converted to UTC.
    pub fn validate_in(&self, tz: &Tz) -> StoreResult<()> {
        self.validate()?;

        for (label, time) in [("start", &self.start), ("end", &self.end)] {
            if !exists_in(time, tz) {
                return Err(StoreError::InvalidData(format!(
                    "event {} {} does not exist in {} (skipped by a daylight saving change)",
                    label,
                    time,
                    tz.name()
                )));
            }
        }
        if to_utc(&self.end, tz) < to_utc(&self.start, tz) {
            return Err(StoreError::InvalidData(format!(
                "event ends ({}) before it starts ({}) in {}",
                self.end,
                self.start,
                tz.name()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_wall_clock;

    #[test]
    fn test_from_uid_accepts_bare_and_qualified_ids() {
        assert_eq!(EventId::from_uid("42").unwrap(), EventId(42));
        assert_eq!(EventId::from_uid("42@cohortcal").unwrap(), EventId(42));
        assert_eq!(EventId::from_uid("7@elsewhere").unwrap(), EventId(7));
    }

    #[test]
    fn test_from_uid_rejects_non_positive_and_garbage() {
        assert!(matches!(
            EventId::from_uid("0"),
            Err(StoreError::InvalidEventId(_))
        ));
        assert!(matches!(
            EventId::from_uid("-3@cohortcal"),
            Err(StoreError::InvalidEventId(_))
        ));
        assert!(matches!(
            EventId::from_uid("abc"),
            Err(StoreError::InvalidEventId(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let event = NewEvent::new(
            CohortId(1),
            parse_wall_clock("2025-01-10T10:00").unwrap(),
            parse_wall_clock("2025-01-10T08:00").unwrap(),
            "Maths",
        );
        assert!(matches!(event.validate(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_validate_rejects_blank_subject() {
        let event = NewEvent::new(
            CohortId(1),
            parse_wall_clock("2025-01-10T08:00").unwrap(),
            parse_wall_clock("2025-01-10T10:00").unwrap(),
            "  ",
        );
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_validate_in_rejects_times_skipped_by_dst() {
        let tz = chrono_tz::Europe::Paris;
        let at = |s: &str| parse_wall_clock(s).unwrap();

        let in_gap = NewEvent::new(CohortId(1), at("2025-03-30T02:30"), at("2025-03-30T03:15"), "Maths");
        assert!(in_gap.validate().is_ok());
        assert!(matches!(in_gap.validate_in(&tz), Err(StoreError::InvalidData(_))));

        let ends_in_gap = NewEvent::new(CohortId(1), at("2025-03-30T01:30"), at("2025-03-30T02:15"), "Maths");
        assert!(ends_in_gap.validate_in(&tz).is_err());

        let after_gap = NewEvent::new(CohortId(1), at("2025-03-30T03:00"), at("2025-03-30T04:00"), "Maths");
        assert!(after_gap.validate_in(&tz).is_ok());
        assert!(in_gap.validate_in(&chrono_tz::UTC).is_ok());
    }

    #[test]
    fn test_display_joins_subject_and_category() {
        let mut event = Event {
            id: EventId(1),
            start: parse_wall_clock("2025-01-10T08:00").unwrap(),
            end: parse_wall_clock("2025-01-10T10:00").unwrap(),
            subject: "Maths".to_string(),
            category: "CM".to_string(),
            note: String::new(),
            room_id: None,
            owner_id: None,
            cohort_id: CohortId(1),
            created_at: Utc::now(),
        };
        assert_eq!(event.to_string(), "Maths - CM");

        event.category.clear();
        assert_eq!(event.to_string(), "Maths");
        assert_eq!(event.uid(), "1@cohortcal");
    }
}
