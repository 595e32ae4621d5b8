use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use timeedit_core::{CalendarEvent, prelude::*};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub schedule: Arc<ScheduleCache>,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    source: String,
    refreshed_at: NaiveDateTime,
    stale: bool,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Lesson lines for one day; `lessons` is null when the day is empty
#[derive(Serialize)]
struct LessonsResponse {
    date: NaiveDate,
    lessons: Option<Vec<String>>,
}

#[derive(Serialize)]
struct PurgeResponse {
    events: usize,
    refreshed_at: NaiveDateTime,
}

#[derive(Deserialize)]
struct RemindersQuery {
    lead_minutes: Option<i64>,
}

pub fn create_app(schedule: Arc<ScheduleCache>) -> Router {
    let state = AppState { schedule };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/today", get(today_handler))
        .route("/lessons", get(lessons_handler))
        .route("/next", get(next_handler))
        .route("/tomorrow", get(tomorrow_handler))
        .route("/reminders", get(reminders_handler))
        .route("/purge", post(purge_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Service description
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "TimeEdit Schedule Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "today": "/today",
            "lessons": "/lessons",
            "next": "/next",
            "tomorrow": "/tomorrow",
            "reminders": "/reminders",
            "purge": "POST /purge"
        }
    }))
}

/// Health check, including cache age
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        source: state.schedule.source_url().to_string(),
        refreshed_at: state.schedule.refreshed_at().await,
        stale: state.schedule.is_stale().await,
    })
}

/// Today's events
async fn today_handler(State(state): State<AppState>) -> Result<Json<Vec<CalendarEvent>>, AppError> {
    Ok(Json(state.schedule.todays_events().await?))
}

/// Today's lessons as display lines
async fn lessons_handler(State(state): State<AppState>) -> Result<Json<LessonsResponse>, AppError> {
    let lessons = state.schedule.todays_lessons().await?;
    Ok(Json(LessonsResponse {
        date: state.schedule.clock().today(),
        lessons,
    }))
}

/// The next lesson, or null
async fn next_handler(
    State(state): State<AppState>,
) -> Result<Json<Option<CalendarEvent>>, AppError> {
    Ok(Json(state.schedule.next_lesson().await?))
}

async fn tomorrow_handler(
    State(state): State<AppState>,
) -> Result<Json<LessonsResponse>, AppError> {
    let lessons = state.schedule.tomorrows_lessons().await?;
    Ok(Json(LessonsResponse {
        date: state.schedule.clock().today() + TimeDelta::days(1),
        lessons,
    }))
}

async fn reminders_handler(
    Query(params): Query<RemindersQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let lead = reminder_lead(params.lead_minutes.unwrap_or(60))?;
    Ok(Json(state.schedule.todays_reminders(lead).await?))
}

/// Force a reload of the feed
async fn purge_handler(State(state): State<AppState>) -> Result<Json<PurgeResponse>, AppError> {
    let events = state.schedule.purge().await?;
    Ok(Json(PurgeResponse {
        events,
        refreshed_at: state.schedule.refreshed_at().await,
    }))
}

/// Application error type
#[derive(Debug)]
struct AppError(timeedit_core::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self.0 {
            timeedit_core::Error::FeedUnavailable { .. } => {
                (StatusCode::BAD_GATEWAY, "feed unavailable")
            }
            timeedit_core::Error::Config(_) => (StatusCode::BAD_REQUEST, "configuration error"),
            timeedit_core::Error::TimezoneAdjustment(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "timezone adjustment failed")
            }
        };

        tracing::warn!("{}: {}", error_message, self.0);

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<timeedit_core::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
