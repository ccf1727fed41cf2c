//! sqlgauge-api — HTTP surface of the exporter.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus text exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use sqlgauge_metrics::Registry;

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
}

/// Build the exporter router.
pub fn build_router(registry: Registry) -> Router {
    let state = ApiState {
        registry: Arc::new(registry),
    };

    Router::new()
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
