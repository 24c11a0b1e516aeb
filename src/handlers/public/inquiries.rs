// handlers/public/inquiries.rs - POST /api/inquiries handler

use axum::{
    extract::{Extension, State},
    response::Json,
};
use serde_json::Value;

use crate::audit::RequestOrigin;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// POST /api/inquiries - Contact-form submission, no account needed
pub async fn submit(
    State(state): State<AppState>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let inquiry = state.inquiries.submit(&origin, &payload).await?;
    Ok(ApiResponse::created(inquiry))
}
