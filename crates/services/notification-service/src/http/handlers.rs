//! Health and notification handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;

use common::AppResult;

use super::state::AppState;
use crate::jobs::{JobStatus, PassReport};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ServiceHealth>,
}

/// Service health with optional error message.
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Create health routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Create notification routes.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_notifications))
        .route("/status", get(notification_status))
}

/// Health check endpoint - verifies database connectivity when configured.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match &state.database {
        Some(db) => Some(match db.ping().await {
            Ok(()) => ServiceHealth {
                status: "healthy".to_string(),
                error: None,
            },
            Err(e) => ServiceHealth {
                status: "unhealthy".to_string(),
                error: Some(e.to_string()),
            },
        }),
        None => None,
    };

    let all_healthy = database
        .as_ref()
        .map_or(true, |health| health.status == "healthy");

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        database,
    };

    if all_healthy {
        (StatusCode::OK, Json(response)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response()
    }
}

/// Run one notification pass now.
pub async fn run_notifications(State(state): State<AppState>) -> AppResult<Json<PassReport>> {
    let report = state.job.run_pass(Utc::now()).await?;
    Ok(Json(report))
}

/// Report when the last pass ran and how many retries are queued.
pub async fn notification_status(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.job.status())
}
