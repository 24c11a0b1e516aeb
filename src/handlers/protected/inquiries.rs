// handlers/protected/inquiries.rs - GET /api/inquiries, PATCH /api/inquiries/:id/status

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
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// GET /api/inquiries
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Value>> {
    let inquiries = state.inquiries.list(&principal, &origin, query.status.as_deref()).await?;
    Ok(ApiResponse::success(inquiries))
}

/// PATCH /api/inquiries/:id/status - Body `{"status": "contacted"}`
pub async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(origin): Extension<RequestOrigin>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let request: StatusRequest = serde_json::from_value(payload)
        .map_err(|e| ApiError::invalid_json(format!("Invalid status request: {}", e)))?;
    let inquiry = state.inquiries.update_status(&principal, &origin, &id, &request.status).await?;
    Ok(ApiResponse::success(inquiry))
}
