//! JSON snapshot endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Handler for the /stats endpoint.
#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /stats request");

    match state.cache.get().await {
        Ok(snapshot) => Json(snapshot.as_ref()).into_response(),
        Err(e) => {
            error!("Failed to serve /stats: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error collecting stats").into_response()
        }
    }
}
