pub mod leases;
pub mod metrics;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::AppState;

/// Error response - {"error": "message"}
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse::new(self.message)),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// Healthcheck endpoint - always 200, reports whether the last read succeeded
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let watch = state.watch_state.read().await;
    let status = match (&watch.snapshot, watch.consecutive_failures) {
        (Some(_), 0) => "ok",
        (None, 0) => "starting",
        _ => "degraded",
    };

    Json(serde_json::json!({
        "status": status,
        "service": "lease-exporter",
        "lease_path": state.config.lease_path,
        "parse_policy": state.config.parse_policy,
        "leases": watch.snapshot.as_ref().map(|s| s.database.len()),
        "active_leases": watch.snapshot.as_ref().map(|s| s.database.active().count()),
        "consecutive_failures": watch.consecutive_failures,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
