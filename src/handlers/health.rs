//! Health check endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!("hostmon ", env!("CARGO_PKG_VERSION"), " - see /doc for endpoints");

/// Handler for the /health endpoint.
///
/// Never triggers a pass; it reports on what the cache already holds.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let has_snapshot = state.cache.snapshot().await.is_some();
    let last_error = state.cache.last_error().await;
    let age = state.cache.age().await;

    let (status, message) = match (&last_error, has_snapshot) {
        (None, true) => (StatusCode::OK, "OK".to_string()),
        (None, false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "No snapshot collected yet".to_string(),
        ),
        (Some(e), _) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Last collection pass failed: {}", e),
        ),
    };

    let age_line = match age {
        Some(age) => format!("snapshot age (s):  {:.3}", age.as_secs_f64()),
        None => "snapshot age (s):  -".to_string(),
    };
    let ttl_line = format!("cache ttl (ms):    {}", state.config.cache_ttl().as_millis());

    let table = state.cache.stats().render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}{age_line}\n{ttl_line}\n\n{FOOTER_TEXT}\n"),
    )
}
