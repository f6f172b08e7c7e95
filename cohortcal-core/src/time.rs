//! Wall-clock timestamps and timezone normalization.
//!
//! Events are stored as local wall-clock times (no offset) in the schedule's
//! home timezone. Exports convert them to absolute UTC instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Zone wall-clock times are read in unless configured otherwise.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Paris;

/// Canonical storage form. Uniqueness checks compare these strings exactly.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a wall-clock timestamp such as `2025-01-10T08:00` or `2025-01-10 08:00:00`.
pub fn parse_wall_clock(s: &str) -> Result<NaiveDateTime, String> {
    let trimmed = s.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(truncate)
        .ok_or_else(|| {
            format!(
                "Invalid date/time '{}'. Expected YYYY-MM-DDTHH:MM[:SS]",
                s
            )
        })
}

/// Format a wall-clock timestamp in the canonical storage form.
pub fn format_wall_clock(dt: &NaiveDateTime) -> String {
    truncate(*dt).format(STORAGE_FORMAT).to_string()
}

/// Drop sub-second precision.
pub fn truncate(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Interpret a wall-clock time in `tz` and return the UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times inside
/// a DST gap are read with the offset in force before the gap, which moves
/// them forward by the gap length.
pub fn to_utc(dt: &NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(dt) {
        LocalResult::Single(local) => local.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let before_gap = tz.offset_from_utc_datetime(&(*dt - Duration::days(1)));
            let offset_secs = i64::from(before_gap.fix().local_minus_utc());
            (*dt - Duration::seconds(offset_secs)).and_utc()
        }
    }
}

/// False for wall-clock times skipped by a DST transition in `tz`
/// (e.g. 02:30 on the last Sunday of March in Europe/Paris).
pub fn exists_in(dt: &NaiveDateTime, tz: &Tz) -> bool {
    !matches!(tz.from_local_datetime(dt), LocalResult::None)
}

/// Format a UTC instant as an iCalendar DATE-TIME with the `Z` suffix.
pub fn format_ics_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
