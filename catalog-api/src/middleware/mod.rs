pub mod auth;
pub mod cache;
pub mod cors;
pub mod logging;

pub use auth::{require_auth, AuthUser};
pub use cache::{cache_response, invalidate_catalog, CachePolicy, ResponseCache};
pub use cors::cors_layer;
pub use logging::logging_middleware;
