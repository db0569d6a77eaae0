use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::AppState;

use super::ApiError;

/// Prometheus scrape endpoint
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.publisher.render()?;
    Ok(([(header::CONTENT_TYPE, state.publisher.content_type())], body).into_response())
}
