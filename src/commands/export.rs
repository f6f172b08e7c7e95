use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use cohortcal_core::{ExportFormat, ExportOutcome, Partition};

use super::resolve_cohort;
use crate::App;

pub fn run(
    app: &App,
    cohort: Option<&str>,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let partition = match cohort {
        Some(name) => Partition::Cohort(resolve_cohort(&app.store, name)?),
        None => Partition::All,
    };

    let export = match app.cache()?.get_export(&partition, format)? {
        ExportOutcome::Served(export) => export,
        ExportOutcome::NoContent => {
            eprintln!("{}", "No events to export".dimmed());
            return Ok(());
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &export.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} {}",
                "Exported".green(),
                partition,
                format!("to {} (version {})", path.display(), export.version).dimmed()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&export.bytes)?;
            stdout.flush()?;
        }
    }

    tracing::debug!(
        partition = %partition,
        version = export.version,
        regenerated = export.regenerated,
        "export written"
    );
    Ok(())
}
