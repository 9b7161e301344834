use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::lead::Comment;
use crate::models::{ApiError, ApiResult};

const COMMENT_SELECT: &str = "SELECT c.id, c.message, c.lead_id, c.user_id, u.name AS author_name,
        c.created_at, c.updated_at
     FROM comments c
     LEFT JOIN users u ON u.id = c.user_id";

fn message_text(message: &str) -> ApiResult<&str> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    Ok(message)
}

/// Internal notes attached to leads
#[derive(Clone)]
pub struct CommentService {
    pool: PgPool,
}

impl CommentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, lead_id: Uuid, author: Uuid, message: &str) -> ApiResult<Comment> {
        let message = message_text(message)?;

        let lead_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM leads WHERE id = $1)")
            .bind(lead_id)
            .fetch_one(&self.pool)
            .await?;
        if !lead_exists {
            return Err(ApiError::not_found("Lead not found"));
        }

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO comments (message, lead_id, user_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(message)
        .bind(lead_id)
        .bind(author)
        .fetch_one(&self.pool)
        .await?;

        info!(comment_id = %id, lead_id = %lead_id, "Comment added");
        self.get(id).await
    }

    /// Comments on one lead, oldest first
    pub async fn for_lead(&self, lead_id: Uuid) -> ApiResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.lead_id = $1 ORDER BY c.created_at ASC",
            COMMENT_SELECT
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!("{} WHERE c.id = $1", COMMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Comment not found"))
    }

    pub async fn update(&self, id: Uuid, message: &str) -> ApiResult<Comment> {
        let message = message_text(message)?;

        let result = sqlx::query("UPDATE comments SET message = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(message)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Comment not found"));
        }

        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Comment not found"));
        }

        info!(comment_id = %id, "Comment deleted");
        Ok(())
    }
}
