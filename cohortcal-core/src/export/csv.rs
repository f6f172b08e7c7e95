//! Tabular export (RFC 4180).

use chrono_tz::Tz;

use super::{Names, instants};
use crate::event::Event;

const HEADER: [&str; 9] = [
    "event_id", "start", "end", "subject", "category", "note", "room", "owner", "cohort",
];

/// One row per event. Times are RFC 3339 instants in UTC.
pub(super) fn generate_csv(events: &[Event], names: &Names, tz: &Tz) -> String {
    let mut out = String::new();
    push_record(&mut out, HEADER.iter().map(|h| h.to_string()));

    for event in events {
        let owner = event.owner_id.map(|o| o.to_string()).unwrap_or_default();
        let (start, end) = instants(event, tz);
        push_record(
            &mut out,
            [
                event.id.to_string(),
                start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                end.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                event.subject.clone(),
                event.category.clone(),
                event.note.clone(),
                names.room(event.room_id).to_string(),
                owner,
                names.cohort(event.cohort_id).to_string(),
            ],
        );
    }

    out
}

fn push_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(&field));
    }
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
