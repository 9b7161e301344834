use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::Role;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::user::{TokenPair, User};
use crate::models::{ApiError, ApiResult};

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String, // User ID
    pub name: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access" or "refresh"
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Invalid or malformed token")]
    Invalid,
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token type")]
    WrongType,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Password hashing and JWT issuance
pub struct AuthService {
    config: AuthConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let access_secret = config.access_token_secret.as_bytes();
        let refresh_secret = config.refresh_token_secret.as_bytes();

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Hash a password with bcrypt on the blocking pool
    pub async fn hash_password(&self, password: &str) -> ApiResult<String> {
        let password = password.to_string();
        let cost = self.config.bcrypt_cost;

        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hash)
    }

    /// Verify a password against a hash. Malformed hashes count as a mismatch.
    pub async fn verify_password(&self, password: &str, hash: &str) -> ApiResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();

        let matches = tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &hash).unwrap_or(false)
        })
        .await?;

        Ok(matches)
    }

    fn claims_for(&self, user: &User, token_type: &str, lifetime: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        }
    }

    /// Generate an access token
    pub fn generate_access_token(&self, user: &User) -> ApiResult<String> {
        let claims = self.claims_for(
            user,
            ACCESS_TOKEN,
            Duration::minutes(self.config.access_token_expiry_minutes),
        );

        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Generate a refresh token
    pub fn generate_refresh_token(&self, user: &User) -> ApiResult<String> {
        let claims = self.claims_for(
            user,
            REFRESH_TOKEN,
            Duration::days(self.config.refresh_token_expiry_days),
        );

        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate refresh token: {}", e)))
    }

    pub fn issue_tokens(&self, user: &User) -> ApiResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user)?,
            refresh_token: self.generate_refresh_token(user)?,
        })
    }

    fn decode_with(&self, token: &str, key: &DecodingKey, expected: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }

        Ok(claims)
    }

    /// Validate an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_with(token, &self.access_decoding, ACCESS_TOKEN)
    }

    /// Validate a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_with(token, &self.refresh_decoding, REFRESH_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            bcrypt_cost: 4,
            ..Default::default()
        })
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password: String::new(),
            role: Role::Manager,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let auth = service();
        let user = user();
        let token = auth.generate_access_token(&user).unwrap();

        let claims = auth.validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.token_type, ACCESS_TOKEN);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let auth = service();
        let pair = auth.issue_tokens(&user()).unwrap();

        // Signed with a different secret
        assert_eq!(
            auth.validate_access_token(&pair.refresh_token),
            Err(TokenError::Invalid)
        );
        assert!(auth.validate_refresh_token(&pair.refresh_token).is_ok());
        assert!(auth.validate_refresh_token(&pair.access_token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let auth = AuthService::new(AuthConfig {
            access_token_expiry_minutes: -10,
            ..Default::default()
        });
        let token = auth.generate_access_token(&user()).unwrap();
        assert_eq!(auth.validate_access_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_token() {
        assert_eq!(
            service().validate_access_token("not.a.jwt"),
            Err(TokenError::Invalid)
        );
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let auth = service();
        let hash = auth.hash_password("s3cretpass").await.unwrap();

        assert!(auth.verify_password("s3cretpass", &hash).await.unwrap());
        assert!(!auth.verify_password("wrongpass1", &hash).await.unwrap());
        assert!(!auth.verify_password("s3cretpass", "not-a-hash").await.unwrap());
    }
}
