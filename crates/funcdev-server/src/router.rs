//! Router and middleware stack.

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::{AppState, dispatch};

/// Preflight results stay cached this long in the browser.
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Build the complete service: one fallback handler behind trace, timeout,
/// and CORS layers.
///
/// Routing happens inside the fallback against the live table, never in
/// axum's own route tree, so table swaps need no router rebuild.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors_layer()),
        )
        .with_state(state)
}

/// Wide-open CORS: this is a local development server and browsers on any
/// origin must be able to call it.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(CORS_MAX_AGE)
}
