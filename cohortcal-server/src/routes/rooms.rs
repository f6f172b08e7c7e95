//! Room endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};

use cohortcal_core::{NewRoom, Room};

use crate::routes::{AppError, blocking};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{location}", delete(delete_room))
}

/// GET /rooms - List rooms by location
async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, AppError> {
    let rooms = blocking(move || Ok(state.store.list_rooms()?)).await?;
    Ok(Json(rooms))
}

/// POST /rooms - Add a room
async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<NewRoom>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let room = blocking(move || Ok(state.store.insert_room(&req)?)).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// DELETE /rooms/:location - Remove a room
async fn delete_room(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> Result<Json<Room>, AppError> {
    let room = blocking(move || Ok(state.store.delete_room(&location)?)).await?;
    Ok(Json(room))
}
