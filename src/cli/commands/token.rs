use serde_json::json;
use uuid::Uuid;

use crate::auth::{csrf_token_for, generate_jwt, Claims};
use crate::cli::utils::{output_json, parse_role};
use crate::cli::OutputFormat;
use crate::config::config;

/// Sign a token with the configured secret; prints the matching CSRF token too
pub fn handle(
    role: &str,
    user: Option<String>,
    email: &str,
    hours: Option<u64>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let role = parse_role(role)?;
    let security = &config().security;
    let user_id = user.unwrap_or_else(|| Uuid::new_v4().to_string());
    let claims = Claims::new(user_id, email, role, hours.unwrap_or(security.jwt_expiry_hours));

    let token = generate_jwt(&claims, &security.jwt_secret)?;
    let csrf = csrf_token_for(&security.jwt_secret, &claims.sid);

    match output_format {
        OutputFormat::Json => output_json(&json!({
            "token": token,
            "csrf_token": csrf,
            "user_id": claims.sub,
            "role": role,
            "expires_at": claims.exp,
        })),
        OutputFormat::Text => {
            println!("{}", token);
            eprintln!("user: {}  role: {}  csrf: {}", claims.sub, role, csrf);
            Ok(())
        }
    }
}
