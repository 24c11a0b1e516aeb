use axum::http::HeaderMap;

use crate::auth::{validate_jwt, JwtError, Principal};

/// Why a request could not be tied to a principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// No Authorization header at all
    Missing,
    /// A credential was presented but rejected
    Invalid(String),
}

impl AuthFailure {
    pub fn reason(&self) -> &str {
        match self {
            AuthFailure::Missing => "Missing Authorization header",
            AuthFailure::Invalid(reason) => reason,
        }
    }
}

/// Resolve the bearer token on a request into a principal
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Principal, AuthFailure> {
    let token = extract_jwt_from_headers(headers)?;
    let claims = validate_jwt(&token, secret).map_err(|e| AuthFailure::Invalid(e.to_string()))?;
    Principal::try_from(claims).map_err(|e: JwtError| AuthFailure::Invalid(e.to_string()))
}

/// Extract JWT token from Authorization header
pub fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, AuthFailure> {
    let auth_header = headers.get("authorization").ok_or(AuthFailure::Missing)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthFailure::Invalid("Invalid Authorization header format".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if token.trim().is_empty() => Err(AuthFailure::Invalid("Empty JWT token".to_string())),
        Some(token) => Ok(token.trim().to_string()),
        None => Err(AuthFailure::Invalid(
            "Authorization header must use Bearer token format".to_string(),
        )),
    }
}
