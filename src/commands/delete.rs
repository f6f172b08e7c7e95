use anyhow::Result;
use owo_colors::OwoColorize;

use cohortcal_core::EventId;

use crate::App;

pub fn run(app: &App, uid: &str) -> Result<()> {
    let id = EventId::from_uid(uid)?;
    let event = app.store.delete_event(id)?;

    println!(
        "{} {} {}",
        "Deleted".yellow(),
        event,
        format!("({})", event.start.format("%a %b %-d %H:%M")).dimmed()
    );
    Ok(())
}
