// handlers/protected/interactions.rs - /api/clients/:id/interactions handlers

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use serde_json::Value;

use crate::audit::RequestOrigin;
use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/clients/:id/interactions
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(client_id): Path<String>,
) -> ApiResult<Vec<Value>> {
    let interactions = state.interactions.list_for_client(&principal, &origin, &client_id).await?;
    Ok(ApiResponse::success(interactions))
}

/// POST /api/clients/:id/interactions
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(client_id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let interaction = state.interactions.log(&principal, &origin, &client_id, &payload).await?;
    Ok(ApiResponse::created(interaction))
}
