// handlers/protected/tasks.rs - /api/tasks[/:id][/assign] handlers

use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::audit::RequestOrigin;
use crate::auth::Principal;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::task::TaskFilter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub assigned_to: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: String,
}

/// GET /api/tasks - Agents only ever receive their own tasks
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Value>> {
    let filter = TaskFilter {
        assigned_to: query.assigned_to,
        status: query.status,
        client_id: query.client_id,
    };
    let tasks = state.tasks.list(&principal, &origin, filter).await?;
    Ok(ApiResponse::success(tasks))
}

/// POST /api/tasks
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let task = state.tasks.create(&principal, &origin, &payload).await?;
    Ok(ApiResponse::created(task))
}

/// GET /api/tasks/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let task = state.tasks.get(&principal, &origin, &id).await?;
    Ok(ApiResponse::success(task))
}

/// PATCH /api/tasks/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let task = state.tasks.update(&principal, &origin, &id, &payload).await?;
    Ok(ApiResponse::success(task))
}

/// POST /api/tasks/:id/assign - Body `{"assigned_to": "<user id>"}`
pub async fn assign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let request: AssignRequest = serde_json::from_value(payload)
        .map_err(|e| ApiError::invalid_json(format!("Invalid assignment request: {}", e)))?;
    let task = state.tasks.assign(&principal, &origin, &id, &request.assigned_to).await?;
    Ok(ApiResponse::success(task))
}

/// DELETE /api/tasks/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.tasks.delete(&principal, &origin, &id).await?;
    Ok(ApiResponse::no_content())
}
