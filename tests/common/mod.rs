#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use agency_crm::audit::{AuditEventType, AuditLogEntry, MemoryAuditSink};
use agency_crm::auth::{csrf_token_for, generate_jwt, Claims};
use agency_crm::config::AppConfig;
use agency_crm::database::store::{CLIENTS, USERS};
use agency_crm::database::{DocumentStore, MemoryDocumentStore};
use agency_crm::permissions::Role;
use agency_crm::rate_limit::MemoryBucketStore;
use agency_crm::routes::app;
use agency_crm::state::AppState;

pub const CLIENT_IP: &str = "203.0.113.7";

pub fn peer_addr(ip: &str) -> SocketAddr {
    format!("{}:51000", ip).parse().expect("socket address")
}

/// Bearer token plus the CSRF token bound to its session
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub token: String,
    pub csrf: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The full router over in-memory stores, with the audit sink kept for inspection
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub sink: Arc<MemoryAuditSink>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let sink = Arc::new(MemoryAuditSink::new());
        let state = AppState::new(
            config,
            Arc::new(MemoryDocumentStore::new()),
            sink.clone(),
            Arc::new(MemoryBucketStore::new()),
        );
        let router = app(state.clone());
        Self { state, router, sink }
    }

    /// Store an active user document and mint a session for it
    pub async fn login(&self, user_id: &str, role: Role) -> Session {
        self.seed_user(user_id, role, "active").await;
        self.session(user_id, role)
    }

    pub fn session(&self, user_id: &str, role: Role) -> Session {
        let secret = &self.state.config.security.jwt_secret;
        let claims = Claims::new(user_id, format!("{}@agency.test", user_id), role, 1);
        let token = generate_jwt(&claims, secret).expect("token");
        let csrf = csrf_token_for(secret, &claims.sid);
        Session { user_id: user_id.to_string(), role, token, csrf }
    }

    pub async fn seed_user(&self, user_id: &str, role: Role, status: &str) {
        self.state
            .store
            .put(
                USERS,
                user_id,
                json!({
                    "id": user_id,
                    "display_name": format!("User {}", user_id),
                    "email": format!("{}@agency.test", user_id),
                    "role": role,
                    "status": status,
                }),
            )
            .await
            .expect("seed user");
    }

    pub async fn seed_client(&self, client_id: &str, assigned_to: &str) {
        self.state
            .store
            .put(
                CLIENTS,
                client_id,
                json!({
                    "id": client_id,
                    "name": "Acme Ltd",
                    "email": "contact@acme.test",
                    "status": "active",
                    "assigned_to": assigned_to,
                }),
            )
            .await
            .expect("seed client");
    }

    pub fn request(&self, method: Method, uri: &str, session: Option<&Session>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(peer_addr(CLIENT_IP)))
            .header(header::HOST, "api.agency.test");
        if let Some(session) = session {
            builder = builder
                .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
                .header("x-csrf-token", session.csrf.as_str());
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).expect("request")
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, headers, body })
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        session: Option<&Session>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        self.send(self.request(method, uri, session, body)).await
    }

    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.sink.entries().await
    }

    pub async fn audit_of(&self, event: AuditEventType) -> Vec<AuditLogEntry> {
        self.audit_entries()
            .await
            .into_iter()
            .filter(|entry| entry.event_type == event)
            .collect()
    }
}
