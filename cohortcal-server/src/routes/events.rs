//! Event endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use cohortcal_core::time::parse_wall_clock;
use cohortcal_core::{
    Event, EventId, EventQuery, EventStore, NewEvent, StoreError, UserId,
};

use crate::routes::{AppError, blocking};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{uid}", delete(delete_event))
}

/// Event as returned by the API, with the UID used in calendar exports
#[derive(Serialize)]
pub struct EventResponse {
    pub uid: String,
    #[serde(flatten)]
    pub event: Event,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        EventResponse {
            uid: event.uid(),
            event,
        }
    }
}

/// Query string filters for GET /events.
///
/// List-valued filters are comma separated. A filter given with an empty
/// value (`?room=`) matches nothing.
#[derive(Deserialize, Default)]
pub struct EventFilter {
    pub cohort: Option<String>,
    pub room: Option<String>,
    pub owner: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub start: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_time(value: &str) -> Result<NaiveDateTime, AppError> {
    parse_wall_clock(value).map_err(AppError::BadRequest)
}

impl EventFilter {
    /// Resolve names to ids. Unknown cohort or room names are dropped from
    /// their list, so a filter naming only unknown values matches nothing.
    fn to_query(&self, store: &EventStore) -> Result<EventQuery, AppError> {
        let mut query = EventQuery::all();

        if let Some(names) = &self.cohort {
            let mut ids = Vec::new();
            for name in split_list(names) {
                if let Some(cohort) = store.cohort_by_name(&name)? {
                    ids.push(cohort.id);
                }
            }
            query = query.in_cohorts(ids);
        }

        if let Some(locations) = &self.room {
            let mut ids = Vec::new();
            for location in split_list(locations) {
                if let Some(room) = store.room_by_location(&location)? {
                    ids.push(room.id);
                }
            }
            query = query.in_rooms(ids);
        }

        if let Some(owners) = &self.owner {
            let ids = split_list(owners)
                .iter()
                .map(|id| {
                    id.parse()
                        .map(UserId)
                        .map_err(|_| AppError::BadRequest(format!("Invalid owner id: {}", id)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            query = query.owned_by(ids);
        }

        if let Some(subjects) = &self.subject {
            query = query.with_subjects(split_list(subjects));
        }
        if let Some(categories) = &self.category {
            query = query.with_categories(split_list(categories));
        }

        if let Some(starts) = &self.start {
            let starts = split_list(starts)
                .iter()
                .map(|s| parse_time(s))
                .collect::<Result<Vec<_>, _>>()?;
            query = query.starting_at(starts);
        }

        let from = self.from.as_deref().map(parse_time).transpose()?;
        let to = self.to.as_deref().map(parse_time).transpose()?;
        Ok(query.between(from, to))
    }
}

/// GET /events - List events matching the filters
async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = blocking(move || {
        let query = filter.to_query(&state.store)?;
        Ok(state.store.query_events(&query)?)
    })
    .await?;

    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// Request body for creating an event
#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub start: String,
    pub end: String,
    pub subject: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub note: String,
    /// Room location, e.g. "2Z34"
    pub room: Option<String>,
    pub owner: Option<i64>,
    /// Cohort name
    pub cohort: String,
}

/// POST /events - Create a new event
async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let start = parse_time(&req.start)?;
    let end = parse_time(&req.end)?;

    let event = blocking(move || {
        let store = &state.store;
        let cohort = store
            .cohort_by_name(&req.cohort)?
            .ok_or_else(|| StoreError::CohortNotFound(req.cohort.clone()))?;

        let mut event = NewEvent::new(cohort.id, start, end, req.subject)
            .with_category(req.category)
            .with_note(req.note);
        if let Some(location) = &req.room {
            let room = store
                .room_by_location(location)?
                .ok_or_else(|| StoreError::RoomNotFound(location.clone()))?;
            event = event.with_room(room.id);
        }
        if let Some(owner) = req.owner {
            event = event.with_owner(UserId(owner));
        }

        Ok(store.insert_event(&event)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(event.into())))
}

/// DELETE /events/:uid - Delete an event by id or calendar UID
async fn delete_event(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let id = EventId::from_uid(&uid)?;
    let event = blocking(move || Ok(state.store.delete_event(id)?)).await?;
    Ok(Json(event.into()))
}
