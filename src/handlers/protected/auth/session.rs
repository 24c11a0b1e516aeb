// handlers/protected/auth/session.rs - GET /api/auth/{whoami,csrf,roles}

use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::auth::{csrf_token_for, Principal};
use crate::database::store::USERS;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::permissions::role_permissions;
use crate::state::AppState;

/// GET /api/auth/whoami - The caller's identity, effective permissions and stored profile
pub async fn whoami(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Value> {
    let profile = state.store.get(USERS, &principal.user_id).await.map_err(ApiError::from)?;
    let permissions: Vec<&str> = role_permissions(Some(principal.role)).iter().map(|p| p.id).collect();

    Ok(ApiResponse::success(json!({
        "id": principal.user_id,
        "email": principal.email,
        "role": principal.role,
        "role_name": principal.role.display_name(),
        "permissions": permissions,
        "profile": profile,
    })))
}

/// GET /api/auth/csrf - Token to echo in `X-CSRF-Token` on state-changing requests
pub async fn csrf(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Value> {
    let token = csrf_token_for(&state.config.security.jwt_secret, &principal.session_id);
    Ok(ApiResponse::success(json!({
        "csrf_token": token,
        "header": "X-CSRF-Token",
    })))
}

/// GET /api/auth/roles - Roles the caller may assign, with what each grants
pub async fn roles(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Value> {
    let assignable: Vec<Value> = state
        .users
        .assignable_roles(&principal)
        .into_iter()
        .map(|role| {
            let permissions: Vec<&str> = role_permissions(Some(role)).iter().map(|p| p.id).collect();
            json!({
                "role": role,
                "name": role.display_name(),
                "level": role.level(),
                "permissions": permissions,
            })
        })
        .collect();

    Ok(ApiResponse::success(json!({
        "role": principal.role,
        "assignable_roles": assignable,
    })))
}
