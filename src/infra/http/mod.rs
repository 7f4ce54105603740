pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::convert::ConvertService;

/// Read-only state shared by all request handlers.
#[derive(Clone)]
pub struct HttpState {
    pub converter: Arc<ConvertService>,
}

pub fn build_router(state: HttpState) -> Router {
    // Validated at config load to fit usize.
    let body_limit = state.converter.max_payload_bytes() as usize;

    Router::new()
        .route("/convert", post(handlers::convert))
        .route("/health", get(handlers::health))
        .route("/", get(handlers::index))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}
