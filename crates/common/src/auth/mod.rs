//! Authentication utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - Caller context extraction from a bearer token or the token cookie

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const NO_TOKEN_MESSAGE: &str = "Unauthorized - no token provided";
pub const INVALID_TOKEN_MESSAGE: &str = "Unauthorized - invalid token";

/// Authenticated caller, available to handlers that need an identity
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Caller ID (JWT subject)
    pub user_id: Uuid,

    /// Request ID for tracing
    pub request_id: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (caller ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
    token_cookie: String,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
            token_cookie: "token".to_string(),
        }
    }

    /// Name of the cookie consulted when there is no Authorization header
    pub fn with_token_cookie(mut self, name: impl Into<String>) -> Self {
        self.token_cookie = name.into();
        self
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AppError::Unauthorized {
                    message: INVALID_TOKEN_MESSAGE.to_string(),
                }
            })
    }

    /// Resolve the caller from request headers
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid> {
        let token = extract_token(headers, &self.token_cookie).ok_or_else(|| {
            AppError::Unauthorized {
                message: NO_TOKEN_MESSAGE.to_string(),
            }
        })?;

        let claims = self.validate_token(token)?;

        Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: INVALID_TOKEN_MESSAGE.to_string(),
        })
    }
}

/// Extract bearer token from Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Find the named cookie in a Cookie header value
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Bearer token first, then the token cookie
fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer)
    {
        return Some(token);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| extract_cookie(cookies, cookie_name))
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let jwt = Arc::<JwtManager>::from_ref(state);
        let user_id = jwt.authenticate(&parts.headers)?;

        Ok(AuthContext {
            user_id,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_extract_cookie() {
        assert_eq!(extract_cookie("theme=dark; token=abc", "token"), Some("abc"));
        assert_eq!(extract_cookie("token=abc", "token"), Some("abc"));
        assert_eq!(extract_cookie("mytoken=abc", "token"), None);
        assert_eq!(extract_cookie("token=", "token"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager.generate_token(user_id).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = JwtManager::new("secret_a", 3600);
        let verifier = JwtManager::new("secret_b", 3600);
        let token = issuer.generate_token(Uuid::new_v4()).unwrap();

        let err = verifier.validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[test]
    fn test_authenticate_reads_cookie_when_no_header() {
        let manager = JwtManager::new("test_secret", 3600).with_token_cookie("sid");
        let user_id = Uuid::new_v4();
        let token = manager.generate_token(user_id).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("lang=en; sid={}", token)).unwrap(),
        );

        assert_eq!(manager.authenticate(&headers).unwrap(), user_id);
    }

    #[test]
    fn test_authenticate_without_token() {
        let manager = JwtManager::new("test_secret", 3600);
        match manager.authenticate(&HeaderMap::new()) {
            Err(AppError::Unauthorized { message }) => assert_eq!(message, NO_TOKEN_MESSAGE),
            other => panic!("expected unauthorized, got {:?}", other),
        }
    }
}
