//! iCalendar document generation.

use icalendar::{Calendar, Component, EventLike, Property};

use super::{ExportSettings, Names, instants};
use crate::event::Event;
use crate::time::format_ics_utc;

pub(super) fn generate_ics(
    calendar_name: &str,
    events: &[Event],
    names: &Names,
    settings: &ExportSettings,
) -> String {
    let mut cal = Calendar::new();

    // X-WR-CALNAME - Human-readable calendar name (de facto standard)
    cal.append_property(Property::new("X-WR-CALNAME", calendar_name));

    for event in events {
        let (start, end) = instants(event, &settings.timezone);

        let mut ics_event = icalendar::Event::new();
        ics_event.uid(&event.uid());
        ics_event.summary(&event.to_string());

        // Fixed DTSTAMP keeps regenerated documents byte-identical
        ics_event.add_property("DTSTAMP", format_ics_utc(&event.created_at));
        ics_event.add_property("DTSTART", format_ics_utc(&start));
        ics_event.add_property("DTEND", format_ics_utc(&end));

        let room = names.room(event.room_id);
        if !room.is_empty() {
            ics_event.location(room);
        }
        ics_event.description(&description(event, room, names.cohort(event.cohort_id)));

        cal.push(ics_event.done());
    }

    let cal = cal.done();
    strip_ics_bloat(&cal.to_string(), &settings.product_id)
}

fn description(event: &Event, room: &str, cohort: &str) -> String {
    let owner = event.owner_id.map(|o| o.to_string()).unwrap_or_default();
    let mut text = format!("Room: {}, Owner: {}, Cohort: {}", room, owner, cohort);
    if !event.note.is_empty() {
        text.push('\n');
        text.push_str(&event.note);
    }
    text
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with our own
/// - Remove CALSCALE:GREGORIAN (it's the default)
fn strip_ics_bloat(ics: &str, product_id: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(product_id);
            result.push_str("\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}
