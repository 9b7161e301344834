use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::lead::{Comment, CreateCommentRequest, UpdateCommentRequest};
use crate::models::{ApiResponse, ApiResult};
use crate::AppState;

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment = state
        .comments
        .create(req.lead_id, user.id, &req.message)
        .await?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

pub async fn lead_comments(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Value>> {
    let comments = state.comments.for_lead(lead_id).await?;
    Ok(ApiResponse::ok(
        json!({ "comments": comments }),
        "Comments fetched successfully",
    ))
}

pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment = state.comments.get(id).await?;
    Ok(ApiResponse::ok(comment, "Comment fetched successfully"))
}

pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment = state.comments.update(id, &req.message).await?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    state.comments.delete(id).await?;
    Ok(ApiResponse::message("Comment deleted successfully"))
}
