pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::any};

use crate::application::dispatch::Dispatcher;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Any-verb routes; the dispatcher decides what a verb means per
/// object. The request-context layer runs outermost so every log line
/// carries the id.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/{object}", any(handlers::dispatch))
        .route("/{object}/{identity}", any(handlers::dispatch))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
