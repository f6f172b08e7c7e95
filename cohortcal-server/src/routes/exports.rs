//! Cached calendar exports, one route per partition and format

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use cohortcal_core::{ExportFormat, ExportOutcome, Partition, RegisteredPartition};

use crate::routes::calendars::export_path;
use crate::routes::{AppError, blocking};
use crate::state::AppState;

/// Header carrying the store version the served document was generated at
pub const VERSION_HEADER: &str = "x-cohortcal-version";

pub fn router(partitions: &[RegisteredPartition]) -> Router<AppState> {
    let mut router = Router::new();

    for registered in partitions {
        for format in ExportFormat::ALL {
            let partition = registered.partition.clone();
            let filename = format!("{}.{}", registered.slug, format.extension());
            router = router.route(
                &export_path(format, &registered.slug),
                get(move |State(state): State<AppState>| {
                    serve_export(state, partition, format, filename)
                }),
            );
        }
    }

    router
}

async fn serve_export(
    state: AppState,
    partition: Partition,
    format: ExportFormat,
    filename: String,
) -> Result<Response, AppError> {
    let outcome = blocking(move || Ok(state.cache.get_export(&partition, format)?)).await?;

    let export = match outcome {
        ExportOutcome::Served(export) => export,
        ExportOutcome::NoContent => {
            debug!(filename = %filename, "no events to export");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(export.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static(VERSION_HEADER),
                HeaderValue::from(export.version),
            ),
        ],
        Body::from(export.bytes),
    )
        .into_response())
}
