use shared::Role;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::auth::AuthService;
use crate::models::category::UNCATEGORIZED;
use crate::models::settings::{ActiveStatus, UserLimit};
use crate::models::user::{
    ChangePasswordRequest, CreateRoleRequest, LoginRequest, RegisterRequest, TokenPair,
    UpdateUserRequest, User, UserProfile,
};
use crate::models::{ApiError, ApiResult};
use crate::utils::validation::{normalize_email, validate_password};

const USER_COLUMNS: &str =
    "id, name, email, password, role, refresh_token, created_at, updated_at";

/// Seat limit applied when the singleton row is first created
pub const DEFAULT_MAX_ROLE: i32 = 6;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Account management, authentication and the site-wide settings rows
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(pool: PgPool, auth: Arc<AuthService>) -> Self {
        Self { pool, auth }
    }

    /// Create the settings singletons and the fallback category when missing
    pub async fn ensure_defaults(&self) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_defaults_in(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn ensure_defaults_in(tx: &mut Transaction<'_, Postgres>) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO user_limits (max_role)
             SELECT $1 WHERE NOT EXISTS (SELECT 1 FROM user_limits)",
        )
        .bind(DEFAULT_MAX_ROLE)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO active_status (status)
             SELECT TRUE WHERE NOT EXISTS (SELECT 1 FROM active_status)",
        )
        .execute(&mut **tx)
        .await?;

        sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(UNCATEGORIZED)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> ApiResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    async fn insert_user(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name.trim())
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&mut **tx)
        .await?;

        Ok(user)
    }

    /// Bootstrap the first account. Later registrations go through `create_member`.
    pub async fn register(&self, request: RegisterRequest) -> ApiResult<UserProfile> {
        request.validate()?;
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;
        let password_hash = self.auth.hash_password(&request.password).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(ApiError::forbidden(
                "Registration is closed. Ask an administrator for an account.",
            ));
        }

        let user = Self::insert_user(&mut tx, &request.name, &email, &password_hash, Role::Admin)
            .await?;
        Self::ensure_defaults_in(&mut tx).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "Administrator account registered");
        Ok(user.into())
    }

    async fn store_refresh_token(&self, user_id: Uuid, token: Option<&str>) -> ApiResult<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn login(&self, request: LoginRequest) -> ApiResult<(UserProfile, TokenPair)> {
        let email = normalize_email(&request.email)
            .map_err(|_| ApiError::unauthorized(INVALID_CREDENTIALS))?;

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

        if !self
            .auth
            .verify_password(&request.password, &user.password)
            .await?
        {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }

        let tokens = self.auth.issue_tokens(&user)?;
        self.store_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;

        info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok((user.into(), tokens))
    }

    /// Rotate both tokens; the presented refresh token must be the stored one
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<(UserProfile, TokenPair)> {
        let claims = self.auth.validate_refresh_token(refresh_token)?;
        let user = self
            .find_by_id(claims.user_id()?)
            .await
            .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            return Err(ApiError::unauthorized("Refresh token is expired or used"));
        }

        let tokens = self.auth.issue_tokens(&user)?;
        self.store_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;

        Ok((user.into(), tokens))
    }

    pub async fn logout(&self, user_id: Uuid) -> ApiResult<()> {
        self.store_refresh_token(user_id, None).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> ApiResult<UserProfile> {
        Ok(self.find_by_id(user_id).await?.into())
    }

    /// Create a dashboard account while seats remain under the configured limit
    pub async fn create_member(&self, request: CreateRoleRequest) -> ApiResult<UserProfile> {
        request.validate()?;
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;
        let password_hash = self.auth.hash_password(&request.password).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let max_role: i32 = sqlx::query_scalar("SELECT max_role FROM user_limits LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(DEFAULT_MAX_ROLE);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;

        if count >= i64::from(max_role) {
            return Err(ApiError::bad_request(format!(
                "Cannot create more than {} users.",
                max_role - 1
            )));
        }

        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
        if taken {
            return Err(ApiError::Conflict("User with this email already exists".into()));
        }

        let user =
            Self::insert_user(&mut tx, &request.name, &email, &password_hash, request.role).await?;
        tx.commit().await?;

        info!(user_id = %user.id, role = %user.role, "Dashboard user created");
        Ok(user.into())
    }

    /// Everyone except administrators, newest first
    pub async fn list_members(&self) -> ApiResult<Vec<UserProfile>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE role <> 'Admin' ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    pub async fn update_member(&self, id: Uuid, request: UpdateUserRequest) -> ApiResult<UserProfile> {
        request.validate()?;
        let existing = self.find_by_id(id).await?;

        let email = match request.email.as_deref() {
            Some(raw) => {
                let email = normalize_email(raw)?;
                if email != existing.email && self.find_by_email(&email).await?.is_some() {
                    return Err(ApiError::Conflict("Email is already in use".into()));
                }
                Some(email)
            }
            None => None,
        };

        let password_hash = match request.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(self.auth.hash_password(password).await?)
            }
            None => None,
        };

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password = COALESCE($4, password),
                role = COALESCE($5, role),
                refresh_token = CASE WHEN $4 IS NULL THEN refresh_token ELSE NULL END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(email)
        .bind(password_hash)
        .bind(request.role)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id = %id, "Dashboard user updated");
        Ok(user.into())
    }

    pub async fn delete_member(&self, id: Uuid, acting_user: Uuid) -> ApiResult<()> {
        if id == acting_user {
            return Err(ApiError::bad_request("You cannot delete your own account"));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("User not found"));
        }

        info!(user_id = %id, deleted_by = %acting_user, "Dashboard user deleted");
        Ok(())
    }

    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> ApiResult<()> {
        let user = self.find_by_id(user_id).await?;

        if !self
            .auth
            .verify_password(&request.current_password, &user.password)
            .await?
        {
            return Err(ApiError::unauthorized("Current password is incorrect"));
        }

        validate_password(&request.new_password)?;
        let hash = self.auth.hash_password(&request.new_password).await?;

        sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(hash)
            .execute(&self.pool)
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn user_limit(&self) -> ApiResult<UserLimit> {
        sqlx::query_as::<_, UserLimit>("SELECT id, max_role FROM user_limits LIMIT 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("User limit not found"))
    }

    pub async fn update_user_limit(&self, id: Uuid, max_role: i32) -> ApiResult<UserLimit> {
        if max_role < 1 {
            return Err(ApiError::bad_request("maxRole must be at least 1"));
        }

        sqlx::query_as::<_, UserLimit>(
            "UPDATE user_limits SET max_role = $2 WHERE id = $1 RETURNING id, max_role",
        )
        .bind(id)
        .bind(max_role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User limit not found"))
    }

    /// Site-active flag; a missing row reads as inactive
    pub async fn active_status(&self) -> ApiResult<bool> {
        let status: Option<bool> = sqlx::query_scalar("SELECT status FROM active_status LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(status.unwrap_or(false))
    }

    pub async fn set_active_status(&self, status: bool) -> ApiResult<ActiveStatus> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, ActiveStatus>(
            "UPDATE active_status SET status = $1
             WHERE id = (SELECT id FROM active_status LIMIT 1)
             RETURNING id, status",
        )
        .bind(status)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match updated {
            Some(row) => row,
            None => {
                sqlx::query_as::<_, ActiveStatus>(
                    "INSERT INTO active_status (status) VALUES ($1) RETURNING id, status",
                )
                .bind(status)
                .fetch_one(&mut *tx)
                .await?
            }
        };
        tx.commit().await?;

        info!(status, "Site active status changed");
        Ok(row)
    }
}
