//! Bearer-token validation and role extraction.
//!
//! Session issuance lives in an external identity service; this crate only
//! validates the JWTs it mints. The `AuthService` is injected into request
//! extensions by middleware at startup, so the `AuthUser` extractor works
//! with any router state.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

const TOKEN_TTL_SECS: i64 = 3600;

/// Closed role set. Unknown role strings in a token fail validation
/// instead of being coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Buyer,
    Delivery,
    Admin,
}

/// Claim structure for JWT tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Validates (and, for tests and tooling, issues) bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, user_id: Uuid, role: Role) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {e}")))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// Authenticated caller extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Label recorded in the status history for this actor.
    pub fn actor_label(&self) -> String {
        format!("{}:{}", self.role, self.id)
    }

    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role == role || self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "requires {role} role"
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| {
                ServiceError::InternalError("auth service not installed".to_string())
            })?;

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

        let claims = auth_service.validate_token(token)?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_claims() {
        let svc = AuthService::new("test_secret_key_for_testing_purposes_only_32chars");
        let id = Uuid::new_v4();
        let token = svc.issue_token(id, Role::Delivery).unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Delivery);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let svc = AuthService::new("test_secret_key_for_testing_purposes_only_32chars");
        let other = AuthService::new("another_secret_key_entirely_with_enough_length!!");
        let token = other.issue_token(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(svc.validate_token(&token).is_err());
    }

    #[test]
    fn role_checks() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let buyer = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Buyer,
        };
        assert!(admin.require_role(Role::Delivery).is_ok());
        assert!(buyer.require_role(Role::Delivery).is_err());
        assert_eq!(&buyer.actor_label()[..6], "buyer:");
    }
}
