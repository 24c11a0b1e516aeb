//! The request pipeline every route runs through.
//!
//! Order: CORS, preflight short-circuit, rate limit, attack scan,
//! authentication, CSRF, authorization. The first failing step ends the
//! request; each failure kind is audited once, here, before the response is
//! built. Baseline headers are added on the way out regardless of outcome.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::net::{IpAddr, SocketAddr};
use std::panic::AssertUnwindSafe;

use super::auth::{authenticate, AuthFailure};
use super::headers::{self, header_str, CSRF_HEADER};
use super::policy::RouteMatch;
use crate::audit::{AuditEventType, AuditLevel, NewAuditEntry, RequestOrigin, Severity};
use crate::auth::{verify_csrf_token, Principal};
use crate::error::{ApiError, SecurityError};
use crate::permissions::{can_access_role_content, has_permission};
use crate::services::AccountStanding;
use crate::state::AppState;
use crate::validation::{attack, AttackMatch};

/// Per-request facts gathered as the pipeline advances
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub origin: RequestOrigin,
    pub matched: RouteMatch,
    pub principal: Option<Principal>,
    pub token_presented: bool,
    pub allowed_origin: Option<String>,
    pub preflight: bool,
}

impl RequestContext {
    fn new(state: &AppState, request: &Request) -> Self {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let matched = state.policies.resolve(&method, &path);
        Self {
            origin: request_origin(request, &state.config.security.trusted_proxies),
            method,
            path,
            matched,
            principal: None,
            token_presented: false,
            allowed_origin: None,
            preflight: false,
        }
    }

    fn action(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Client address. The socket peer, unless that peer is a trusted proxy, in which case
/// the nearest untrusted `X-Forwarded-For` hop (or `X-Real-IP`) is believed instead.
pub fn client_ip(request: &Request, trusted_proxies: &[IpAddr]) -> Option<String> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())?;
    if !trusted_proxies.contains(&peer) {
        return Some(peer.to_string());
    }
    let client = forwarded_client(request.headers(), trusted_proxies).unwrap_or(peer);
    Some(client.to_string())
}

/// Proxies append to the right, so the chain is read right to left and the first hop
/// not in `trusted_proxies` is the client. A malformed hop ends the walk.
fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    if let Some(chain) = header_str(headers, "x-forwarded-for") {
        let mut nearest = None;
        for hop in chain.rsplit(',') {
            let ip: IpAddr = hop.trim().parse().ok()?;
            if !trusted_proxies.contains(&ip) {
                return Some(ip);
            }
            nearest = Some(ip);
        }
        return nearest;
    }
    header_str(headers, "x-real-ip").and_then(|v| v.trim().parse().ok())
}

fn request_origin(request: &Request, trusted_proxies: &[IpAddr]) -> RequestOrigin {
    RequestOrigin {
        ip: client_ip(request, trusted_proxies),
        user_agent: header_str(request.headers(), header::USER_AGENT).map(str::to_string),
    }
}

pub async fn security_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut ctx = RequestContext::new(&state, &request);

    let outcome = AssertUnwindSafe(run_pipeline(&state, &mut ctx, request, next))
        .catch_unwind()
        .await;

    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => reject(&state, &ctx, err).await,
        Err(panic) => reject(&state, &ctx, SecurityError::System(panic_message(panic.as_ref()))).await,
    };

    headers::apply_security_headers(response.headers_mut(), &state.config.security);
    if let Some(origin) = &ctx.allowed_origin {
        headers::apply_cors_headers(response.headers_mut(), origin, ctx.preflight);
    }
    response
}

async fn run_pipeline(
    state: &AppState,
    ctx: &mut RequestContext,
    request: Request,
    next: Next,
) -> Result<Response, SecurityError> {
    let security = &state.config.security;
    let policy = ctx.matched.policy;

    // CORS
    if let Some(origin) = header_str(request.headers(), header::ORIGIN) {
        let host = header_str(request.headers(), header::HOST);
        if !headers::origin_allowed(origin, host, &security.cors_origins) {
            return Err(SecurityError::CorsRejected { origin: origin.to_string() });
        }
        ctx.allowed_origin = Some(origin.to_string());
    }
    if ctx.method == Method::OPTIONS {
        ctx.preflight = true;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    // Rate limit
    let key = format!("{}:{}", ctx.origin.ip.as_deref().unwrap_or("unknown"), ctx.matched.route);
    let now = Utc::now();
    let decision = state.limiters.for_class(policy.rate_class).check_at(&key, now).await;
    if !decision.allowed {
        return Err(SecurityError::RateLimitExceeded {
            retry_after_secs: decision.retry_after_secs(now),
        });
    }

    // Attack scan; the body is buffered once and handed on
    let (parts, body) = request.into_parts();
    let limit = state.config.api.max_request_size_bytes;
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| SecurityError::PayloadTooLarge { limit })?;
    if let Some(hit) = scan_request(&parts, &bytes) {
        return Err(SecurityError::AttackPatternDetected(hit));
    }
    let mut request = Request::from_parts(parts, Body::from(bytes));

    // Authentication
    let exempt = !policy.has_requirements() && security.anonymous_paths.iter().any(|p| p == &ctx.path);
    let requires_auth = policy.require_auth && !exempt;
    match authenticate(request.headers(), &security.jwt_secret) {
        Ok(principal) => {
            ctx.token_presented = true;
            let standing = state
                .users
                .standing(&principal.user_id)
                .await
                .map_err(|e| SecurityError::System(format!("user status lookup failed: {}", e)))?;
            // A token only speaks for the account as it stands now
            let refusal = match standing {
                AccountStanding::Deactivated => Some("account deactivated"),
                AccountStanding::Active(Some(stored)) if stored != principal.role => {
                    Some("role changed since token was issued")
                }
                _ => None,
            };
            match refusal {
                Some(reason) if requires_auth => {
                    ctx.principal = Some(principal);
                    return Err(SecurityError::AuthenticationRequired(reason.into()));
                }
                Some(reason) => tracing::debug!("Ignoring token for {} on {}: {}", principal.user_id, ctx.path, reason),
                None => ctx.principal = Some(principal),
            }
        }
        Err(failure) => {
            ctx.token_presented = failure != AuthFailure::Missing;
            if requires_auth {
                return Err(SecurityError::AuthenticationRequired(failure.reason().to_string()));
            }
            if ctx.token_presented {
                tracing::debug!("Ignoring unusable token on {}: {}", ctx.path, failure.reason());
            }
        }
    }

    // CSRF
    let state_changing = matches!(ctx.method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE);
    if security.csrf_enabled && policy.csrf && state_changing {
        if let Some(principal) = &ctx.principal {
            let submitted = header_str(request.headers(), CSRF_HEADER).unwrap_or_default();
            if !verify_csrf_token(&security.jwt_secret, &principal.session_id, submitted) {
                return Err(SecurityError::CsrfInvalid);
            }
        }
    }

    // Authorization
    if policy.has_requirements() {
        let role = ctx.principal.as_ref().map(|p| p.role);
        if let Some(min_role) = policy.min_role {
            if !can_access_role_content(role, min_role) {
                return Err(SecurityError::AuthorizationDenied { required: min_role.as_str().to_string() });
            }
        }
        if let Some(permission) = policy.permission {
            if !has_permission(role, permission) {
                return Err(SecurityError::AuthorizationDenied { required: permission.to_string() });
            }
        }
        if let Some((name, check)) = policy.predicate {
            let passed = ctx
                .principal
                .as_ref()
                .map_or(false, |principal| check(principal, &ctx.matched.params));
            if !passed {
                return Err(SecurityError::AuthorizationDenied { required: name.to_string() });
            }
        }
    }

    if state.audit.config().level != AuditLevel::Minimal {
        let actor = ctx.principal.as_ref().map(Principal::actor).unwrap_or_default();
        state
            .audit
            .log(
                NewAuditEntry::new(AuditEventType::ApiAccess, Severity::Low, ctx.action())
                    .actor(actor)
                    .origin(ctx.origin.clone())
                    .resource(ctx.matched.route.clone(), None),
            )
            .await;
    }

    request.extensions_mut().insert(ctx.origin.clone());
    if let Some(principal) = &ctx.principal {
        request.extensions_mut().insert(principal.clone());
    }
    Ok(next.run(request).await)
}

/// URI, identifying headers and body, in that order
fn scan_request(parts: &Parts, body: &[u8]) -> Option<AttackMatch> {
    let hit = |field: &str, value: &str| {
        attack::detect(value).map(|kind| AttackMatch { field: field.to_string(), kind })
    };

    let path: String = url::form_urlencoded::parse(parts.uri.path().as_bytes())
        .map(|(k, v)| format!("{}{}", k, v))
        .collect();
    if let Some(found) = hit("path", &path) {
        return Some(found);
    }

    if let Some(query) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let field = format!("query.{}", key);
            if let Some(found) = hit(&field, &key).or_else(|| hit(&field, &value)) {
                return Some(found);
            }
        }
    }

    for (name, field) in [(header::USER_AGENT, "header.user-agent"), (header::REFERER, "header.referer")] {
        if let Some(value) = header_str(&parts.headers, name) {
            if let Some(found) = hit(field, value) {
                return Some(found);
            }
        }
    }

    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(json) => attack::scan_value(&json).map(|found| AttackMatch {
            field: format!("body.{}", found.field),
            kind: found.kind,
        }),
        Err(_) => hit("body", &String::from_utf8_lossy(body)),
    }
}

/// Audit the refusal and turn it into the caller-facing response
async fn reject(state: &AppState, ctx: &RequestContext, err: SecurityError) -> Response {
    let audit = &state.audit;
    let actor = ctx.principal.as_ref().map(Principal::actor).unwrap_or_default();
    let origin = ctx.origin.clone();
    let route = ctx.matched.route.clone();
    let mut details = Map::new();
    details.insert("route".into(), json!(route));
    details.insert("method".into(), json!(ctx.method.as_str()));

    match &err {
        SecurityError::CorsRejected { origin: rejected } => {
            details.insert("origin".into(), json!(rejected));
            audit
                .log_security_event(AuditEventType::CorsViolation, Severity::Medium, actor, origin, ctx.action(), details)
                .await;
        }
        SecurityError::RateLimitExceeded { retry_after_secs } => {
            details.insert("class".into(), json!(ctx.matched.policy.rate_class.as_str()));
            details.insert("retry_after_secs".into(), json!(retry_after_secs));
            audit
                .log_security_event(AuditEventType::RateLimitExceeded, Severity::High, actor, origin, ctx.action(), details)
                .await;
        }
        SecurityError::AttackPatternDetected(hit) => {
            details.insert("field".into(), json!(hit.field));
            details.insert("pattern".into(), json!(hit.kind.as_str()));
            audit
                .log_security_event(AuditEventType::SuspiciousInput, Severity::High, actor, origin, ctx.action(), details)
                .await;
        }
        SecurityError::PayloadTooLarge { limit } => {
            details.insert("limit".into(), json!(limit));
            audit
                .log_security_event(AuditEventType::SecurityEvent, Severity::Medium, actor, origin, ctx.action(), details)
                .await;
        }
        SecurityError::AuthenticationRequired(reason) => {
            let event = if ctx.token_presented {
                AuditEventType::TokenInvalid
            } else {
                AuditEventType::UnauthorizedAccessAttempt
            };
            audit
                .log(
                    NewAuditEntry::new(event, Severity::Medium, ctx.action())
                        .actor(actor)
                        .origin(origin)
                        .resource(route, None)
                        .details(details)
                        .failed(reason.clone()),
                )
                .await;
        }
        SecurityError::CsrfInvalid => {
            audit
                .log_security_event(AuditEventType::CsrfViolation, Severity::High, actor, origin, ctx.action(), details)
                .await;
        }
        SecurityError::AuthorizationDenied { required } => {
            let role = ctx.principal.as_ref().map(|p| p.role);
            audit
                .log_unauthorized_access(
                    actor,
                    origin,
                    &route,
                    ctx.matched.params.get("id").cloned(),
                    ctx.action(),
                    json!({ "required": required, "role": role }),
                )
                .await;
        }
        SecurityError::System(message) => {
            audit.log_system_event(ctx.action(), Some(message.clone()), details).await;
        }
        SecurityError::Validation(_) => {}
    }

    ApiError::from(err).into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic with non-string payload".to_string()
    }
}
