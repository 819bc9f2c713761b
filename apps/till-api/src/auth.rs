//! JWT authentication module.
//!
//! Validates HS256 bearer tokens and puts the caller's [`AuthContext`] into
//! the request extensions. Every domain route runs behind [`require_auth`].

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Role allowed to resolve withdrawals and record treasury movements.
pub const ROLE_TREASURY: &str = "treasury";
/// Role allowed to do everything.
pub const ROLE_ADMIN: &str = "admin";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub tenant_id: String,

    #[serde(default)]
    pub roles: Vec<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Validates bearer tokens.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        JwtValidator {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.key, &self.validation)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        let claims = token_data.claims;
        if claims.sub.trim().is_empty() || claims.tenant_id.trim().is_empty() {
            return Err(ApiError::unauthorized("Token is missing subject or tenant"));
        }
        Ok(claims)
    }
}

/// Authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

impl AuthContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// FORBIDDEN unless the caller holds `treasury` or `admin`.
    pub fn require_treasury(&self) -> Result<(), ApiError> {
        if self.has_role(ROLE_TREASURY) || self.has_role(ROLE_ADMIN) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Treasury role required"))
        }
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        AuthContext {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            roles: claims.roles,
        }
    }
}

/// Middleware: 401 unless a valid bearer token is present.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let claims = state.jwt.validate_token(token)?;
    debug!(user_id = %claims.sub, tenant_id = %claims.tenant_id, "Authenticated request");

    req.extensions_mut().insert(AuthContext::from(claims));
    Ok(next.run(req).await)
}

/// Extract bearer token from the authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, exp_offset: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: "user-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            roles: vec![ROLE_TREASURY.to_string()],
            iat: now.timestamp(),
            exp: (now + exp_offset).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_roundtrip() {
        let validator = JwtValidator::new("test-secret");
        let claims = validator
            .validate_token(&mint("test-secret", Duration::minutes(10)))
            .unwrap();

        let ctx = AuthContext::from(claims);
        assert_eq!(ctx.user_id, "user-1");
        assert_eq!(ctx.tenant_id, "tenant-1");
        assert!(ctx.require_treasury().is_ok());
    }

    #[test]
    fn test_wrong_secret_and_expired_rejected() {
        let validator = JwtValidator::new("test-secret");
        assert!(validator
            .validate_token(&mint("other-secret", Duration::minutes(10)))
            .is_err());
        assert!(validator
            .validate_token(&mint("test-secret", Duration::minutes(-10)))
            .is_err());
    }

    #[test]
    fn test_treasury_role_required() {
        let ctx = AuthContext {
            user_id: "u".to_string(),
            tenant_id: "t".to_string(),
            roles: vec!["cashier".to_string()],
        };
        let err = ctx.require_treasury().unwrap_err();
        assert_eq!(err.code, "FORBIDDEN");

        let admin = AuthContext {
            roles: vec![ROLE_ADMIN.to_string()],
            ..ctx
        };
        assert!(admin.require_treasury().is_ok());
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));
    }
}
