use anyhow::{Context, Result, anyhow};
use chrono::{Duration, NaiveDateTime};
use owo_colors::OwoColorize;

use cohortcal_core::time::parse_wall_clock;
use cohortcal_core::{NewEvent, UserId};

use super::resolve_cohort;
use crate::App;

pub struct AddArgs {
    pub subject: String,
    pub cohort: String,
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub category: String,
    pub room: Option<String>,
    pub note: String,
    pub owner: Option<i64>,
}

pub fn run(app: &App, args: AddArgs) -> Result<()> {
    let cohort = resolve_cohort(&app.store, &args.cohort)?;
    let start = parse_wall_clock(&args.start).map_err(|e| anyhow!(e))?;
    let end = resolve_end(start, args.end.as_deref(), args.duration.as_deref())?;

    let mut event = NewEvent::new(cohort.id, start, end, args.subject)
        .with_category(args.category)
        .with_note(args.note);

    if let Some(location) = &args.room {
        let Some(room) = app.store.room_by_location(location)? else {
            let available: Vec<_> = app
                .store
                .list_rooms()?
                .into_iter()
                .map(|r| r.location)
                .collect();
            anyhow::bail!(
                "Room '{}' not found. Available: {}",
                location,
                available.join(", ")
            );
        };
        event = event.with_room(room.id);
    }
    if let Some(owner) = args.owner {
        event = event.with_owner(UserId(owner));
    }

    let created = app.store.insert_event(&event)?;

    println!(
        "{} {} {}",
        "Added".green(),
        created,
        format!(
            "({} {}-{}, {})",
            created.start.format("%a %b %-d"),
            created.start.format("%H:%M"),
            created.end.format("%H:%M"),
            cohort.name
        )
        .dimmed()
    );
    println!("  {}", created.uid().dimmed());

    Ok(())
}

/// End time from `--end`, from `--duration`, or one hour after the start.
fn resolve_end(
    start: NaiveDateTime,
    end: Option<&str>,
    duration: Option<&str>,
) -> Result<NaiveDateTime> {
    if let Some(end) = end {
        return parse_wall_clock(end).map_err(|e| anyhow!(e));
    }
    let duration = match duration {
        Some(input) => parse_duration(input)?,
        None => Duration::hours(1),
    };
    start
        .checked_add_signed(duration)
        .context("End time out of range")
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_dur = humantime::parse_duration(input).map_err(|e| anyhow!("{}", e))?;
    Duration::from_std(std_dur).context("Duration too large")
}
