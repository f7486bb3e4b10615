use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::models::AppState;
use crate::services::toggle_server;

/// HTTP trigger for the toggle. No request body is expected; everything the
/// handler needs comes from the validated configuration in state.
pub async fn toggle_trigger(State(state): State<AppState>) -> impl IntoResponse {
    match toggle_server(&state).await {
        Ok(outcome) => {
            tracing::info!(message = %outcome.message, "toggle completed");
            (StatusCode::OK, outcome.message)
        }
        Err(e) => {
            tracing::error!(%e, "toggle failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Toggle failed: {}", e))
        }
    }
}
