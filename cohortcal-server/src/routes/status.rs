//! Liveness and store version endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::routes::{AppError, blocking};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status/healthcheck", get(healthcheck))
        .route("/version", get(version))
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}

async fn healthcheck() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Serialize)]
pub struct VersionInfo {
    pub version: u64,
}

/// GET /version - Current global event version
async fn version(State(state): State<AppState>) -> Result<Json<VersionInfo>, AppError> {
    let version = blocking(move || Ok(state.store.current_version()?)).await?;
    Ok(Json(VersionInfo { version }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{json, send, test_app};

    #[tokio::test]
    async fn test_healthcheck_and_version() {
        let app = test_app(&[]);

        let (status, _, body) = send(&app.router, "GET", "/status/healthcheck", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");

        let (status, _, body) = send(&app.router, "GET", "/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["version"], 0);
    }
}
