//! Metrics endpoint handler for Prometheus scraping.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    CollectionFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let body = match self {
            MetricsError::CollectionFailed => "Error collecting stats",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let result = state.cache.get().await;
    let stats = state.cache.stats();
    state.pass_duration.set(stats.last_pass_seconds());

    let snapshot = match result {
        Ok(snapshot) => {
            state.pass_success.set(1.0);
            snapshot
        }
        Err(e) => {
            state.pass_success.set(0.0);
            error!("Failed to serve /metrics: {}", e);
            return Err(MetricsError::CollectionFailed);
        }
    };

    state.metrics.observe(&snapshot);
    state.processes_reported.set(snapshot.processes.len() as f64);
    state.scrape_duration.set(start.elapsed().as_secs_f64());

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&state.registry.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return Err(MetricsError::EncodingFailed);
    }

    debug!(
        "Metrics request completed: {} processes, {} bytes, {:.3}ms",
        snapshot.processes.len(),
        buffer.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
