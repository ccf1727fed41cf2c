//! Scrape handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tracing::debug;

use crate::ApiState;

pub const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics — render every registered collector.
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = state.registry.render().await;
    debug!(bytes = body.len(), "scrape served");
    (StatusCode::OK, [(CONTENT_TYPE, CONTENT_TYPE_TEXT)], body)
}
