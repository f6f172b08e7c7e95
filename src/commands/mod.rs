pub mod add;
pub mod cohorts;
pub mod config;
pub mod delete;
pub mod events;
pub mod export;
pub mod rooms;

use anyhow::Result;
use cohortcal_core::{Cohort, EventStore};

/// Find a cohort by name, listing the available ones if it does not exist.
pub fn resolve_cohort(store: &EventStore, name: &str) -> Result<Cohort> {
    if let Some(cohort) = store.cohort_by_name(name)? {
        return Ok(cohort);
    }

    let available: Vec<_> = store.list_cohorts()?.into_iter().map(|c| c.name).collect();
    if available.is_empty() {
        anyhow::bail!(
            "Cohort '{}' not found. No cohorts exist yet.\n\n\
            Add one with:\n  \
            cohortcal cohorts add \"{}\"",
            name,
            name
        );
    }
    anyhow::bail!(
        "Cohort '{}' not found. Available: {}",
        name,
        available.join(", ")
    );
}
