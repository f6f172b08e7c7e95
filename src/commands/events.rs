use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use owo_colors::OwoColorize;
use serde_json::json;

use cohortcal_core::time::parse_wall_clock;
use cohortcal_core::{CohortId, EventQuery};

use super::resolve_cohort;
use crate::App;

/// Command-line filters, as typed by the user.
pub struct Filter {
    pub cohort: Option<String>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

pub fn run(app: &App, filter: Filter, as_json: bool) -> Result<()> {
    let query = build_query(app, &filter)?;
    let events = app.store.query_events(&query)?;

    let cohort_names: HashMap<CohortId, String> = app
        .store
        .list_cohorts()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let room_names: HashMap<_, _> = app
        .store
        .list_rooms()?
        .into_iter()
        .map(|r| (r.id, r.location))
        .collect();

    if as_json {
        let rows: Vec<_> = events
            .iter()
            .map(|event| {
                json!({
                    "uid": event.uid(),
                    "start": event.start,
                    "end": event.end,
                    "subject": event.subject,
                    "category": event.category,
                    "note": event.note,
                    "room": event.room_id.and_then(|id| room_names.get(&id)),
                    "owner": event.owner_id,
                    "cohort": cohort_names.get(&event.cohort_id),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    let mut current_date: Option<String> = None;

    for event in &events {
        let date_label = format_date_label(event.start.date(), today);

        if current_date.as_ref() != Some(&date_label) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", date_label.bold());
            current_date = Some(date_label);
        }

        let cohort = cohort_names
            .get(&event.cohort_id)
            .map(String::as_str)
            .unwrap_or_default();
        let room = event
            .room_id
            .and_then(|id| room_names.get(&id))
            .map(|location| format!(" @ {}", location))
            .unwrap_or_default();

        println!(
            "  {} {}{} {} {}",
            format_time(&event.start),
            event,
            room,
            format!("[{}]", cohort).dimmed(),
            event.uid().dimmed()
        );
    }

    Ok(())
}

fn build_query(app: &App, filter: &Filter) -> Result<EventQuery> {
    let mut query = EventQuery::all();

    if let Some(names) = &filter.cohort {
        let ids = split_list(names)
            .map(|name| resolve_cohort(&app.store, name).map(|c| c.id))
            .collect::<Result<Vec<_>>>()?;
        query = query.in_cohorts(ids);
    }
    if let Some(subjects) = &filter.subject {
        query = query.with_subjects(split_list(subjects));
    }

    let from = filter.from.as_deref().map(parse_time).transpose()?;
    let to = filter.to.as_deref().map(parse_time).transpose()?;
    Ok(query.between(from, to))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_time(s: &str) -> Result<NaiveDateTime> {
    parse_wall_clock(s).map_err(|e| anyhow!(e))
}

/// "Today", "Tomorrow", or e.g. "Wed Feb 25"
fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

fn format_time(start: &NaiveDateTime) -> String {
    format!("{:>7}", start.format("%H:%M"))
}
