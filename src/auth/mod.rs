use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditActor;
use crate::permissions::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Session id; the CSRF token is derived from it
    pub sid: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, role: Role, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id.into(),
            email: email.into(),
            role: role.as_str().to_string(),
            sid: Uuid::new_v4().to_string(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Unknown role '{0}' in token")]
    UnknownRole(String),
}

/// The authenticated actor for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub session_id: String,
}

impl Principal {
    pub fn actor(&self) -> AuditActor {
        AuditActor {
            id: Some(self.user_id.clone()),
            email: Some(self.email.clone()),
            role: Some(self.role),
        }
    }
}

impl TryFrom<Claims> for Principal {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = Role::parse(&claims.role).ok_or(JwtError::UnknownRole(claims.role))?;
        Ok(Self {
            user_id: claims.sub,
            email: claims.email,
            role,
            session_id: claims.sid,
        })
    }
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Decode and verify an HS256 token, including expiry
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Session-bound CSRF token: hex sha256 of `secret:session_id`
pub fn csrf_token_for(secret: &str, session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(session_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_csrf_token(secret: &str, session_id: &str, submitted: &str) -> bool {
    constant_time_eq(csrf_token_for(secret, session_id).as_bytes(), submitted.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trips_into_principal() {
        let claims = Claims::new("u-1", "ana@agency.test", Role::Manager, 1);
        let token = generate_jwt(&claims, SECRET).unwrap();
        let principal = Principal::try_from(validate_jwt(&token, SECRET).unwrap()).unwrap();

        assert_eq!(principal.user_id, "u-1");
        assert_eq!(principal.role, Role::Manager);
        assert_eq!(principal.session_id, claims.sid);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt(&Claims::new("u-1", "a@b.test", Role::Agent, 1), SECRET).unwrap();
        assert!(matches!(validate_jwt(&token, "other"), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_refuses_to_sign() {
        let claims = Claims::new("u-1", "a@b.test", Role::Agent, 1);
        assert!(matches!(generate_jwt(&claims, ""), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn unknown_role_does_not_become_principal() {
        let mut claims = Claims::new("u-1", "a@b.test", Role::Agent, 1);
        claims.role = "superuser".into();
        assert!(matches!(Principal::try_from(claims), Err(JwtError::UnknownRole(_))));
    }

    #[test]
    fn csrf_token_is_bound_to_session() {
        let token = csrf_token_for(SECRET, "session-a");
        assert_eq!(token.len(), 64);
        assert!(verify_csrf_token(SECRET, "session-a", &token));
        assert!(!verify_csrf_token(SECRET, "session-b", &token));
        assert!(!verify_csrf_token(SECRET, "session-a", "short"));
    }
}
