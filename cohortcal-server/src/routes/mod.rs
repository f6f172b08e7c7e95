pub mod calendars;
pub mod events;
pub mod exports;
pub mod rooms;
pub mod status;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use cohortcal_core::{ExportError, RegisteredPartition, StoreError};

use crate::state::AppState;

/// Build the full router. Export routes are created for `partitions` only;
/// cohorts added later are served after a restart.
pub fn app(state: AppState, partitions: &[RegisteredPartition]) -> Router {
    Router::new()
        .merge(status::router())
        .merge(calendars::router(partitions))
        .merge(rooms::router())
        .merge(events::router())
        .merge(exports::router(partitions))
        .with_state(state)
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned by handlers, mapped to HTTP statuses
pub enum AppError {
    Store(StoreError),
    Export(ExportError),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Store(e) | AppError::Export(ExportError::Store(e)) => match e {
                StoreError::Duplicate { .. }
                | StoreError::RoomExists(_)
                | StoreError::CohortExists(_) => StatusCode::CONFLICT,
                StoreError::EventNotFound(_)
                | StoreError::RoomNotFound(_)
                | StoreError::CohortNotFound(_) => StatusCode::NOT_FOUND,
                StoreError::InvalidEventId(_) | StoreError::InvalidData(_) => {
                    StatusCode::BAD_REQUEST
                }
                StoreError::Storage(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Export(ExportError::NoEvents) => StatusCode::NO_CONTENT,
            AppError::Export(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Store(e) => e.to_string(),
            AppError::Export(e) => e.to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(e) => format!("{:#}", e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let message = self.message();
        if status.is_server_error() {
            error!(status = %status, error = %message, "request failed");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::Export(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.into())
    }
}

/// Run store and cache work on the blocking pool.
///
/// The task runs to completion even if the request is dropped, so a
/// regeneration is never abandoned halfway.
pub async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
