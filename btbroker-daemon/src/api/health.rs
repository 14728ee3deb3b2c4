use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::AppState;

pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.tokens.ping() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not ready",
                    "error": "database connection failed",
                })),
            )
        }
    }
}
