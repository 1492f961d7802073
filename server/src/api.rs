//! Ingest API
//!
//! HTTP surface through which the protocol client pushes raw events and
//! registers outgoing polls.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::pipeline::Pipeline;
use crate::polls::{PollRecord, PollStore};
use crate::protocol::RawEvent;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub polls: Arc<PollStore>,
}

impl AppState {
    #[must_use]
    pub const fn new(pipeline: Pipeline, polls: Arc<PollStore>) -> Self {
        Self { pipeline, polls }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Server is shutting down")]
    ShuttingDown,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN"),
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Create the ingest router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(ingest_event))
        .route("/polls/{id}", get(get_poll).put(put_poll))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    polls: usize,
    in_flight: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        polls: state.polls.len().await,
        in_flight: state.pipeline.in_flight(),
    })
}

/// Accept a raw event; routing and delivery happen on a worker task.
async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<RawEvent>,
) -> Result<StatusCode, ApiError> {
    if state.pipeline.submit(event) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::ShuttingDown)
    }
}

async fn get_poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PollRecord>, ApiError> {
    state
        .polls
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("poll {id}")))
}

/// Register an outgoing poll so votes on it can be decrypted.
async fn put_poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<PollRecord>,
) -> Result<StatusCode, ApiError> {
    if record.options.is_empty() {
        return Err(ApiError::Validation("poll needs at least one option".into()));
    }
    if record.enc_key.is_empty() {
        return Err(ApiError::Validation("enc_key must not be empty".into()));
    }

    info!(poll_id = %id, options = record.options.len(), "Registering poll");
    state.polls.put(id, record).await;
    Ok(StatusCode::NO_CONTENT)
}
