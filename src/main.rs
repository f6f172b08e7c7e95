mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cohortcal_core::{CohortcalConfig, EventStore, ExportCache, ExportFormat};

#[derive(Parser)]
#[command(name = "cohortcal")]
#[command(about = "Manage cohort schedules and produce their calendar exports")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ~/.config/cohortcal/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration and paths
    Config,
    /// List cohorts, or add one
    Cohorts {
        #[command(subcommand)]
        action: Option<CohortAction>,
    },
    /// List rooms, or add/remove one
    Rooms {
        #[command(subcommand)]
        action: Option<RoomAction>,
    },
    /// List events, grouped by day
    Events {
        /// Only events of these cohorts (comma separated names)
        #[arg(short, long)]
        cohort: Option<String>,

        /// Only events with these subjects (comma separated)
        #[arg(short, long)]
        subject: Option<String>,

        /// Only events starting at or after this time (e.g. "2025-01-10T08:00")
        #[arg(long)]
        from: Option<String>,

        /// Only events starting at or before this time
        #[arg(long)]
        to: Option<String>,

        /// Print JSON instead of the day-by-day listing
        #[arg(long)]
        json: bool,
    },
    /// Add an event
    Add {
        subject: String,

        /// Cohort name
        #[arg(short, long)]
        cohort: String,

        /// Start date/time (e.g. "2025-01-10T08:00")
        #[arg(short, long)]
        start: String,

        /// End date/time
        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        /// Duration instead of an end time (e.g. "2h", "90m")
        #[arg(short, long)]
        duration: Option<String>,

        /// Category, e.g. "CM", "TD", "TP"
        #[arg(long, default_value = "")]
        category: String,

        /// Room location
        #[arg(short, long)]
        room: Option<String>,

        #[arg(long, default_value = "")]
        note: String,

        /// Owner user id
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Delete an event by id or calendar UID (e.g. "42@cohortcal")
    Delete { uid: String },
    /// Write an export to a file or stdout
    Export {
        /// Cohort name (default: every event)
        #[arg(short, long)]
        cohort: Option<String>,

        #[arg(short, long, default_value = "ics")]
        format: ExportFormat,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CohortAction {
    /// Add a cohort
    Add { name: String },
}

#[derive(Subcommand)]
enum RoomAction {
    /// Add a room
    Add {
        location: String,

        #[arg(short, long)]
        capacity: u32,

        /// Room category, e.g. "CM", "TP", "Exams"
        #[arg(short, long, default_value = "")]
        kind: String,
    },
    /// Remove a room by location
    Remove { location: String },
}

/// Everything a command may need, opened from the loaded config.
pub struct App {
    pub config: CohortcalConfig,
    pub config_path: PathBuf,
    pub store: EventStore,
}

impl App {
    fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => CohortcalConfig::config_path()?,
        };
        let config = CohortcalConfig::load_from(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        let database = config.database_path();
        let store = EventStore::open(&database)
            .with_context(|| format!("Failed to open database {}", database.display()))?
            .with_timezone(config.tz()?);

        Ok(App {
            config,
            config_path,
            store,
        })
    }

    pub fn cache(&self) -> Result<ExportCache> {
        Ok(ExportCache::new(
            self.store.clone(),
            self.config.cache_path(),
            self.config.export_settings()?,
        )?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::load(cli.config)?;

    match cli.command {
        Commands::Config => commands::config::run(&app),
        Commands::Cohorts { action } => match action {
            None => commands::cohorts::list(&app),
            Some(CohortAction::Add { name }) => commands::cohorts::add(&app, &name),
        },
        Commands::Rooms { action } => match action {
            None => commands::rooms::list(&app),
            Some(RoomAction::Add {
                location,
                capacity,
                kind,
            }) => commands::rooms::add(&app, location, capacity, kind),
            Some(RoomAction::Remove { location }) => commands::rooms::remove(&app, &location),
        },
        Commands::Events {
            cohort,
            subject,
            from,
            to,
            json,
        } => commands::events::run(
            &app,
            commands::events::Filter {
                cohort,
                subject,
                from,
                to,
            },
            json,
        ),
        Commands::Add {
            subject,
            cohort,
            start,
            end,
            duration,
            category,
            room,
            note,
            owner,
        } => commands::add::run(
            &app,
            commands::add::AddArgs {
                subject,
                cohort,
                start,
                end,
                duration,
                category,
                room,
                note,
                owner,
            },
        ),
        Commands::Delete { uid } => commands::delete::run(&app, &uid),
        Commands::Export {
            cohort,
            format,
            output,
        } => commands::export::run(&app, cohort.as_deref(), format, output.as_deref()),
    }
}
