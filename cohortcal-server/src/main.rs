mod routes;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cohortcal_core::{CohortcalConfig, PartitionRegistry};

use crate::state::AppState;

const DEFAULT_LOG_FILTER: &str = "cohortcal=info,cohortcal_core=info,cohortcal_server=info,tower_http=info";

#[derive(Parser)]
#[command(name = "cohortcal-server")]
#[command(about = "Serve cohort schedules and cached calendar exports over HTTP", long_about = None)]
#[command(version)]
struct Args {
    /// Config file to use instead of ~/.config/cohortcal/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CohortcalConfig::load_from(path),
        None => CohortcalConfig::load(),
    }
    .context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let state = AppState::new(&config)?;

    // Routes are wired once per partition known at startup
    let partitions = PartitionRegistry::new(state.store.clone())
        .partitions()
        .context("Failed to enumerate cohorts")?;
    for registered in &partitions {
        info!(partition = %registered.partition, slug = %registered.slug, "serving exports");
    }

    let app = routes::app(state, &partitions)
        .layer(cors(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_addr()?;
    info!("cohortcal-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
