pub mod v1;

use axum::{
    body::Body, extract::DefaultBodyLimit, middleware as axum_middleware, response::Response,
    routing::get, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::health;
use crate::middleware::{cors_layer, logging_middleware};
use crate::AppState;

/// Create the main router with global middleware applied
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.body_limit_mb * 1024 * 1024;

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", v1::create_routes(&state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(logging_middleware))
                .layer(cors_layer(&state.config.cors))
                // Convert the body-limit response body back to axum's `Body` so
                // `Cors` (which requires `ResBody: Default`) can wrap it.
                .map_response(|res: Response<_>| res.map(Body::new))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .with_state(state)
}
