//! Shared utilities and types for the catalog admin backend

// Re-export common dependencies
pub use chrono;
pub use serde;
pub use serde_json;
pub use uuid;

pub mod database;
pub mod observability;
pub mod types;

pub use types::common::{LeadStatus, PageMeta, PageRequest, Role};
