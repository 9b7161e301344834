use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::auth::{with_auth_cookies, without_auth_cookies, AuthUser, REFRESH_COOKIE};
use crate::models::settings::{ActiveStatus, UpdateActiveStatusRequest, UpdateUserLimitRequest, UserLimit};
use crate::models::user::{
    ChangePasswordRequest, CreateRoleRequest, LoginRequest, RegisterRequest, UpdateUserRequest,
    UserProfile,
};
use crate::models::{ApiError, ApiResponse, ApiResult};
use crate::AppState;

/// Whether the storefront is switched on
pub async fn active_status(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse<bool>> {
    let status = state.users.active_status().await?;
    Ok(ApiResponse::ok(status, "Active status fetched successfully"))
}

pub async fn update_active_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateActiveStatusRequest>,
) -> ApiResult<ApiResponse<ActiveStatus>> {
    user.require_admin()?;
    let status = state.users.set_active_status(req.status).await?;
    Ok(ApiResponse::ok(status, "Active status updated successfully"))
}

/// Create the first administrator account
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    let user = state.users.register(req).await?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<String>)> {
    let (_, tokens) = state.users.login(req).await?;
    let jar = with_auth_cookies(jar, &tokens, &state.config);

    Ok((
        jar,
        ApiResponse::ok(tokens.access_token, "User logged in successfully"),
    ))
}

/// Rotate the token pair using the refresh cookie
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<String>)> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let (_, tokens) = state.users.refresh(&token).await?;
    let jar = with_auth_cookies(jar, &tokens, &state.config);

    Ok((jar, ApiResponse::ok(tokens.access_token, "Access token refreshed")))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    state.users.logout(user.id).await?;
    Ok((without_auth_cookies(jar), ApiResponse::message("User logged out")))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    let profile = state.users.profile(user.id).await?;

    Ok(ApiResponse::ok(
        json!({
            "id": profile.id,
            "name": profile.name,
            "email": profile.email,
            "role": profile.role,
        }),
        "User fetched successfully",
    ))
}

pub async fn check_auth(user: AuthUser) -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "user": user.claims }), "User is authenticated")
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    user.require_admin()?;
    let created = state.users.create_member(req).await?;
    Ok(ApiResponse::created(created, "User created successfully"))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Vec<UserProfile>>> {
    let users = state.users.list_members().await?;
    Ok(ApiResponse::ok(users, "Users fetched successfully"))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    user.require_admin()?;
    let updated = state.users.update_member(id, req).await?;
    Ok(ApiResponse::ok(updated, "User updated successfully"))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    user.require_admin()?;
    state.users.delete_member(id, user.id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}

pub async fn user_limit(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<UserLimit>> {
    let limit = state.users.user_limit().await?;
    Ok(ApiResponse::ok(limit, "User limit fetched successfully"))
}

pub async fn update_user_limit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserLimitRequest>,
) -> ApiResult<ApiResponse<UserLimit>> {
    user.require_admin()?;
    let limit = state.users.update_user_limit(id, req.max_role).await?;
    Ok(ApiResponse::ok(limit, "User limit updated successfully"))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    state.users.change_password(user.id, req).await?;
    Ok(ApiResponse::message("Password changed successfully"))
}
