use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dhcp::SkippedBlock;
use crate::models::Lease;
use crate::AppState;

use super::ApiError;

/// Current lease table as last parsed
#[derive(Debug, Serialize)]
pub struct LeasesResponse {
    pub leases: Vec<Lease>,
    pub skipped: Vec<SkippedBlock>,
    pub parsed_at: DateTime<Utc>,
    pub consecutive_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Get the last successfully parsed lease table.
/// A failed re-read keeps serving the previous table; the failure is reported alongside it.
pub async fn list_leases(State(state): State<Arc<AppState>>) -> Result<Json<LeasesResponse>, ApiError> {
    let watch = state.watch_state.read().await;
    let snapshot = match &watch.snapshot {
        Some(snapshot) => snapshot.clone(),
        None => {
            let reason = watch.last_error.as_deref().unwrap_or("lease database not parsed yet");
            return Err(ApiError::service_unavailable(reason));
        }
    };

    Ok(Json(LeasesResponse {
        leases: snapshot.database.leases.clone(),
        skipped: snapshot.database.skipped.clone(),
        parsed_at: snapshot.parsed_at,
        consecutive_failures: watch.consecutive_failures,
        last_error: watch.last_error.clone(),
    }))
}
