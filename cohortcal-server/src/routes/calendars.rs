//! Calendar listing

use axum::{Json, Router, routing::get};
use serde::Serialize;

use cohortcal_core::{ExportFormat, RegisteredPartition};

use crate::state::AppState;

/// Calendar info returned by API
#[derive(Serialize, Clone)]
pub struct CalendarInfo {
    pub name: String,
    pub slug: String,
    pub ics: String,
    pub csv: String,
}

pub fn router(partitions: &[RegisteredPartition]) -> Router<AppState> {
    let calendars: Vec<CalendarInfo> = partitions
        .iter()
        .map(|registered| CalendarInfo {
            name: registered.partition.calendar_name().to_string(),
            slug: registered.slug.clone(),
            ics: export_path(ExportFormat::Ics, &registered.slug),
            csv: export_path(ExportFormat::Csv, &registered.slug),
        })
        .collect();

    // GET /calendars - Calendars served by this instance
    Router::new().route("/calendars", get(move || async move { Json(calendars) }))
}

pub fn export_path(format: ExportFormat, slug: &str) -> String {
    format!("/{}/{}", format.extension(), slug)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{json, send, test_app};

    #[tokio::test]
    async fn test_lists_partitions_wired_at_startup() {
        let app = test_app(&["M1 E3A"]);
        // added after wiring: not served until restart
        app.store.insert_cohort("PSEE").unwrap();

        let (status, _, body) = send(&app.router, "GET", "/calendars", None).await;
        assert_eq!(status, StatusCode::OK);

        let calendars = json(&body);
        let slugs: Vec<_> = calendars
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["slug"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(slugs, ["all", "m1-e3a"]);
        assert_eq!(calendars[1]["ics"], "/ics/m1-e3a");
        assert_eq!(calendars[1]["name"], "M1 E3A");
    }
}
