use anyhow::Result;
use owo_colors::OwoColorize;

use cohortcal_core::{Partition, VersionKey};

use crate::App;

pub fn list(app: &App) -> Result<()> {
    let cohorts = app.store.list_cohorts()?;

    if cohorts.is_empty() {
        println!("{}", "No cohorts yet".dimmed());
        return Ok(());
    }

    for cohort in cohorts {
        let version = app.store.version(&VersionKey::Cohort(cohort.id))?;
        let slug = Partition::Cohort(cohort.clone()).slug();
        println!(
            "  {} {}",
            cohort.name,
            format!("[{}, v{}]", slug, version).dimmed()
        );
    }

    Ok(())
}

pub fn add(app: &App, name: &str) -> Result<()> {
    let cohort = app.store.insert_cohort(name)?;
    println!("{} {}", "Added cohort".green(), cohort.name);
    Ok(())
}
