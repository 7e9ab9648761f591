use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{handle_request, FilterState};

pub fn create_filter_router(state: Arc<FilterState>, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
