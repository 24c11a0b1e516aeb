// handlers/protected/users.rs - /api/users handlers

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::audit::RequestOrigin;
use crate::auth::Principal;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::permissions::Role;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// GET /api/users - Users at or below the caller's level
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
) -> ApiResult<Vec<Value>> {
    let users = state.users.list(&principal, &origin).await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/users - Provision a staff account
pub async fn provision(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let user = state.users.provision(&principal, &origin, &payload).await?;
    Ok(ApiResponse::created(user))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let user = state.users.get(&principal, &origin, &id).await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id - Profile fields only
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let user = state.users.update_profile(&principal, &origin, &id, &payload).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /api/users/:id/role - Body `{"role": "manager"}`
pub async fn change_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let request: RoleRequest = serde_json::from_value(payload)
        .map_err(|e| ApiError::invalid_json(format!("Invalid role request: {}", e)))?;
    let role = Role::parse(&request.role).ok_or_else(|| {
        ApiError::bad_request(format!("Unknown role '{}'", request.role))
    })?;
    let user = state.users.change_role(&principal, &origin, &id, role).await?;
    Ok(ApiResponse::success(user))
}

/// POST /api/users/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let user = state.users.deactivate(&principal, &origin, &id).await?;
    Ok(ApiResponse::success(user))
}

/// POST /api/users/:id/reactivate
pub async fn reactivate(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let user = state.users.reactivate(&principal, &origin, &id).await?;
    Ok(ApiResponse::success(user))
}
