// handlers/protected/audit.rs - /api/audit/* read-only views

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::audit::{AuditEventType, AuditFilter, AuditLogEntry, SecurityReport, Severity, UserActivity};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

const DEFAULT_ALERT_LIMIT: usize = 50;
const DEFAULT_WINDOW_DAYS: i64 = 7;
const MAX_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub actor_id: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub severity: Option<Severity>,
    pub resource: Option<String>,
    pub success: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<i64>,
}

fn window(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS)
}

/// GET /api/audit/logs - Filtered entries, newest first
pub async fn logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> ApiResult<Vec<AuditLogEntry>> {
    let filter = AuditFilter {
        actor_id: query.actor_id,
        event_type: query.event_type,
        severity: query.severity,
        resource: query.resource,
        success: query.success,
        start: query.start,
        end: query.end,
        limit: query.limit,
    };
    Ok(ApiResponse::success(state.audit.query_logs(filter).await))
}

/// GET /api/audit/alerts - Recent high and critical failures
pub async fn alerts(State(state): State<AppState>, Query(query): Query<AlertsQuery>) -> ApiResult<Vec<AuditLogEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    Ok(ApiResponse::success(state.audit.security_alerts(limit).await))
}

/// GET /api/audit/report?days=N
pub async fn report(State(state): State<AppState>, Query(query): Query<WindowQuery>) -> ApiResult<SecurityReport> {
    Ok(ApiResponse::success(state.audit.security_report(window(query.days)).await))
}

/// GET /api/audit/activity/:actor?days=N
pub async fn activity(
    State(state): State<AppState>,
    Path(actor): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<UserActivity> {
    Ok(ApiResponse::success(state.audit.user_activity(&actor, window(query.days)).await))
}
