use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::models::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::toggle_trigger).post(handlers::toggle_trigger),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
