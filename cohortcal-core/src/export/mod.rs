//! Export document generation.
//!
//! Generation is a pure function of the rows it is given: no store access,
//! no file I/O. The cache decides when to call it and what to do with the
//! bytes.

mod csv;
mod ics;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cohort::{Cohort, CohortId};
use crate::error::{ExportError, ExportResult};
use crate::event::Event;
use crate::room::{Room, RoomId};
use crate::time::{DEFAULT_TIMEZONE, to_utc};

pub const DEFAULT_PRODUCT_ID: &str = "-//cohortcal//schedule export//EN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Ics,
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Ics, ExportFormat::Csv];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Ics => "ics",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Ics => "text/calendar; charset=utf-8",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ics" | "ical" | "icalendar" => Ok(ExportFormat::Ics),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unknown export format '{}'. Expected ics or csv", other)),
        }
    }
}

/// Settings shared by every generated document.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Zone the stored wall-clock times are interpreted in.
    pub timezone: Tz,
    pub product_id: String,
}

impl ExportSettings {
    /// Identifies the settings a document was rendered with, so a cached file
    /// is not served after the timezone or product id changes.
    pub fn fingerprint(&self) -> String {
        format!("{};{}", self.timezone.name(), self.product_id)
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            timezone: DEFAULT_TIMEZONE,
            product_id: DEFAULT_PRODUCT_ID.to_string(),
        }
    }
}

/// Display names for the references an event carries.
///
/// A reference that no longer resolves renders as an empty string.
pub struct Names<'a> {
    rooms: HashMap<RoomId, &'a str>,
    cohorts: HashMap<CohortId, &'a str>,
}

impl<'a> Names<'a> {
    pub fn new(rooms: &'a [Room], cohorts: &'a [Cohort]) -> Self {
        Names {
            rooms: rooms.iter().map(|r| (r.id, r.location.as_str())).collect(),
            cohorts: cohorts.iter().map(|c| (c.id, c.name.as_str())).collect(),
        }
    }

    pub fn room(&self, id: Option<RoomId>) -> &'a str {
        id.and_then(|id| self.rooms.get(&id).copied())
            .unwrap_or_default()
    }

    pub fn cohort(&self, id: CohortId) -> &'a str {
        self.cohorts.get(&id).copied().unwrap_or_default()
    }
}

/// Serialize `events` in the given format.
///
/// Returns `ExportError::NoEvents` for an empty input so callers can treat
/// "nothing to export" separately from a failure.
pub fn generate(
    format: ExportFormat,
    calendar_name: &str,
    events: &[Event],
    names: &Names,
    settings: &ExportSettings,
) -> ExportResult<Vec<u8>> {
    if events.is_empty() {
        return Err(ExportError::NoEvents);
    }

    let document = match format {
        ExportFormat::Ics => ics::generate_ics(calendar_name, events, names, settings),
        ExportFormat::Csv => csv::generate_csv(events, names, &settings.timezone),
    };
    Ok(document.into_bytes())
}

/// UTC start and end of `event`. An end that lands before the start (a row
/// stored before its times were validated against `tz`) is clamped to the
/// start so the rest of the partition still exports.
fn instants(event: &Event, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = to_utc(&event.start, tz);
    let end = to_utc(&event.end, tz);
    if end < start {
        warn!(event_id = %event.id, start = %event.start, end = %event.end, "event ends before it starts, exporting it as instantaneous");
        return (start, start);
    }
    (start, end)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};

    use crate::cohort::{Cohort, CohortId};
    use crate::event::{Event, EventId, UserId};
    use crate::room::{Room, RoomId};
    use crate::time::parse_wall_clock;

    pub fn room() -> Room {
        Room {
            id: RoomId(1),
            location: "2Z34".to_string(),
            capacity: 40,
            kind: "CM".to_string(),
        }
    }

    pub fn cohort() -> Cohort {
        Cohort {
            id: CohortId(1),
            name: "M1 E3A".to_string(),
        }
    }

    pub fn event(id: i64, start: &str, end: &str) -> Event {
        Event {
            id: EventId(id),
            start: parse_wall_clock(start).unwrap(),
            end: parse_wall_clock(end).unwrap(),
            subject: "Maths".to_string(),
            category: "CM".to_string(),
            note: String::new(),
            room_id: Some(RoomId(1)),
            owner_id: Some(UserId(7)),
            cohort_id: CohortId(1),
            created_at: DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }
}
