use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let database = match shared::database::health_check(&state.db).await {
        Ok(()) => "up",
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            "down"
        }
    };
    let cache = state.cache.stats().await;

    let status = if database == "up" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "catalog-api",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.server.environment.as_str(),
            "database": database,
            "cache": { "entries": cache.size },
        })),
    )
}
