// handlers/protected/clients.rs - /api/clients[/:id] handlers

use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::audit::RequestOrigin;
use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// GET /api/clients - Clients visible to the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Value>> {
    let clients = state.clients.list(&principal, &origin, query.status.as_deref()).await?;
    Ok(ApiResponse::success(clients))
}

/// POST /api/clients
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let client = state.clients.create(&principal, &origin, &payload).await?;
    Ok(ApiResponse::created(client))
}

/// GET /api/clients/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let client = state.clients.get(&principal, &origin, &id).await?;
    Ok(ApiResponse::success(client))
}

/// PATCH /api/clients/:id - Partial update
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let client = state.clients.update(&principal, &origin, &id, &payload).await?;
    Ok(ApiResponse::success(client))
}

/// DELETE /api/clients/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.clients.delete(&principal, &origin, &id).await?;
    Ok(ApiResponse::no_content())
}
