use anyhow::{Context, Result};

use cohortcal_core::{CohortcalConfig, EventStore, ExportCache};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: EventStore,
    pub cache: ExportCache,
}

impl AppState {
    pub fn new(config: &CohortcalConfig) -> Result<Self> {
        let database = config.database_path();
        let store = EventStore::open(&database)
            .with_context(|| format!("Failed to open database {}", database.display()))?
            .with_timezone(config.tz()?);

        let cache = ExportCache::new(store.clone(), config.cache_path(), config.export_settings()?)
            .context("Failed to prepare export cache")?;

        Ok(AppState { store, cache })
    }
}
