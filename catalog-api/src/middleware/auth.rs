use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use shared::Role;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::user::TokenPair;
use crate::models::{ApiError, ApiResult};
use crate::services::auth::Claims;
use crate::AppState;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Authenticated dashboard user, taken from the access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub claims: Claims,
}

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> ApiResult<()> {
        if allowed.contains(&self.claims.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "You do not have permission to perform this action",
            ))
        }
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        self.require_role(&[Role::Admin])
    }
}

/// Access token from the `accessToken` cookie, falling back to `Authorization: Bearer`
pub fn access_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Validate the request's access token
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let token = access_token_from_headers(headers)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state.auth.validate_access_token(&token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        ApiError::from(e)
    })?;
    let id = claims.user_id()?;

    Ok(AuthUser { id, claims })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Already validated by `require_auth`
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        authenticate(state, &parts.headers)
    }
}

/// Reject unauthenticated requests before they reach inner layers such as the response cache
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn auth_cookie(name: &'static str, value: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(config.auth.cookie_max_age_days))
        .build()
}

/// Attach both token cookies
pub fn with_auth_cookies(jar: CookieJar, tokens: &TokenPair, config: &AppConfig) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, tokens.access_token.clone(), config))
        .add(auth_cookie(REFRESH_COOKIE, tokens.refresh_token.clone(), config))
}

/// Expire both token cookies
pub fn without_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((ACCESS_COOKIE, "")).path("/"))
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(access_token_from_headers(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(access_token_from_headers(&headers).as_deref(), Some("abc.def"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(access_token_from_headers(&headers).is_none());
    }

    #[test]
    fn test_auth_cookie_attributes() {
        let mut config = AppConfig::default();
        let cookie = auth_cookie(ACCESS_COOKIE, "tok".into(), &config);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));

        config.server.environment = crate::config::Environment::Production;
        let cookie = auth_cookie(REFRESH_COOKIE, "tok".into(), &config);
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_role_guard() {
        let claims = Claims {
            sub: Uuid::nil().to_string(),
            name: "x".into(),
            email: "x@example.com".into(),
            role: Role::Sales,
            exp: 0,
            iat: 0,
            token_type: "access".into(),
        };
        let user = AuthUser { id: Uuid::nil(), claims };

        assert!(user.require_role(&[Role::Sales, Role::Manager]).is_ok());
        assert!(matches!(user.require_admin(), Err(ApiError::Forbidden(_))));
    }
}
