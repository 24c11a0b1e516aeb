// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::state::AppState;

/// GET / - service banner
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Agency CRM API",
            "version": version,
            "description": "Client, task and inquiry management with role-based access control",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "inquiries": "POST /api/inquiries (public contact form)",
                "auth": "/api/auth/whoami, /api/auth/csrf, /api/auth/roles",
                "clients": "/api/clients[/:id][/interactions]",
                "tasks": "/api/tasks[/:id][/assign]",
                "users": "/api/users[/:id][/role|/deactivate|/reactivate]",
                "audit": "/api/audit/logs|alerts|report|activity/:actor"
            }
        }
    }))
}

/// GET /health - liveness plus document store reachability
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, store) = match &state.pool {
        Some(pool) => match DatabaseManager::health_check(pool).await {
            Ok(()) => (StatusCode::OK, "postgres"),
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
            }
        },
        None => (StatusCode::OK, "memory"),
    };

    (
        status,
        Json(json!({
            "success": status == StatusCode::OK,
            "data": {
                "status": if status == StatusCode::OK { "healthy" } else { "degraded" },
                "store": store,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        })),
    )
}
