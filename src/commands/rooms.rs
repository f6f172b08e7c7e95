use anyhow::Result;
use owo_colors::OwoColorize;

use cohortcal_core::NewRoom;

use crate::App;

pub fn list(app: &App) -> Result<()> {
    let rooms = app.store.list_rooms()?;

    if rooms.is_empty() {
        println!("{}", "No rooms yet".dimmed());
        return Ok(());
    }

    for room in rooms {
        let kind = if room.kind.is_empty() {
            String::new()
        } else {
            format!("[{}]", room.kind)
        };
        println!("  {:<8} {:>4} seats {}", room.location, room.capacity, kind.dimmed());
    }

    Ok(())
}

pub fn add(app: &App, location: String, capacity: u32, kind: String) -> Result<()> {
    let room = app.store.insert_room(&NewRoom::new(location, capacity, kind))?;
    println!("{} {}", "Added room".green(), room.location);
    Ok(())
}

pub fn remove(app: &App, location: &str) -> Result<()> {
    let room = app.store.delete_room(location)?;
    println!("{} {}", "Removed room".yellow(), room.location);
    Ok(())
}
