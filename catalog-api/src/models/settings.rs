use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Singleton row capping the number of dashboard accounts
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLimit {
    pub id: Uuid,
    pub max_role: i32,
}

/// Singleton site-active flag
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActiveStatus {
    pub id: Uuid,
    pub status: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserLimitRequest {
    pub max_role: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateActiveStatusRequest {
    pub status: bool,
}
