use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::entry::{AuditActor, AuditEventType, AuditLogEntry, NewAuditEntry, RequestOrigin, Severity};
use super::report::{self, SecurityReport, UserActivity};
use super::sink::{AuditFilter, AuditSink};

pub const REDACTED: &str = "[REDACTED]";

const MAX_ERROR_MESSAGE_LEN: usize = 1000;
const DEFAULT_QUERY_LIMIT: usize = 100;

/// Upper bound on entries scanned for activity and report views
const REPORT_SCAN_LIMIT: usize = 10_000;

static SENSITIVE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)password|token|secret|key").expect("static sensitive-key pattern"));

/// How much the request pipeline records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// Failures and security events only; successful requests are not logged
    Minimal,
    Standard,
    Verbose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub enabled: bool,
    pub level: AuditLevel,
    pub max_details_bytes: usize,
    pub max_user_agent_len: usize,
    pub max_query_results: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: AuditLevel::Standard,
            max_details_bytes: 10 * 1024,
            max_user_agent_len: 500,
            max_query_results: 1000,
        }
    }
}

/// Structured, severity-tagged audit recorder.
///
/// Writes never fail from the caller's point of view: sink errors are logged
/// through `tracing` and swallowed.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    config: AuditConfig,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Record one entry and return its id
    pub async fn log(&self, new_entry: NewAuditEntry) -> Uuid {
        let entry = self.prepare(new_entry);
        let id = entry.id;
        if !self.config.enabled {
            return id;
        }

        if let Err(e) = self.sink.write(&entry).await {
            tracing::error!(
                audit_id = %id,
                event_type = %entry.event_type,
                "failed to write audit entry: {}",
                e
            );
        }
        id
    }

    /// Fire-and-forget variant; the write runs on the runtime without being awaited
    pub fn log_detached(&self, new_entry: NewAuditEntry) -> Uuid {
        let entry = self.prepare(new_entry);
        let id = entry.id;
        if !self.config.enabled {
            return id;
        }

        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.write(&entry).await {
                tracing::error!(audit_id = %entry.id, "failed to write audit entry: {}", e);
            }
        });
        id
    }

    fn prepare(&self, new_entry: NewAuditEntry) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: new_entry.event_type,
            severity: new_entry.severity,
            actor_id: new_entry.actor.id,
            actor_email: new_entry.actor.email,
            actor_role: new_entry.actor.role,
            ip_address: new_entry.origin.ip.map(|ip| truncate(&ip, 64)),
            user_agent: new_entry
                .origin
                .user_agent
                .map(|ua| truncate(&ua, self.config.max_user_agent_len)),
            resource: new_entry.resource,
            resource_id: new_entry.resource_id,
            action: new_entry.action,
            success: new_entry.success,
            details: self.sanitize_details(new_entry.details),
            error_message: new_entry.error_message.map(|m| truncate(&m, MAX_ERROR_MESSAGE_LEN)),
        }
    }

    /// Redact sensitive keys, then replace the whole payload with a size note
    /// if it is still too large.
    pub fn sanitize_details(&self, details: Map<String, Value>) -> Map<String, Value> {
        let redacted = redact_map(details);
        let size = serde_json::to_vec(&redacted).map(|b| b.len()).unwrap_or(usize::MAX);
        if size <= self.config.max_details_bytes {
            return redacted;
        }

        let mut note = Map::new();
        note.insert("_truncated".into(), json!(true));
        note.insert("original_size".into(), json!(size));
        note.insert(
            "note".into(),
            json!(format!("details exceeded {} bytes and were omitted", self.config.max_details_bytes)),
        );
        note
    }

    // -- convenience wrappers ------------------------------------------------

    pub async fn log_authentication(
        &self,
        event_type: AuditEventType,
        actor: AuditActor,
        origin: RequestOrigin,
        success: bool,
        error_message: Option<String>,
    ) -> Uuid {
        let severity = if success { Severity::Low } else { Severity::Medium };
        let mut entry = NewAuditEntry::new(event_type, severity, event_type.as_str().to_lowercase())
            .actor(actor)
            .origin(origin)
            .resource("auth", None)
            .success(success);
        entry.error_message = error_message;
        self.log(entry).await
    }

    /// Role or permission change. Always high severity.
    pub async fn log_permission_change(
        &self,
        actor: AuditActor,
        origin: RequestOrigin,
        target_user_id: &str,
        old_value: Value,
        new_value: Value,
        action: impl Into<String>,
    ) -> Uuid {
        let entry = NewAuditEntry::new(AuditEventType::PermissionChange, Severity::High, action)
            .actor(actor)
            .origin(origin)
            .resource("user", Some(target_user_id.to_string()))
            .detail("old_value", old_value)
            .detail("new_value", new_value);
        self.log(entry).await
    }

    /// Data access or mutation. Failures are high; deletions medium; the rest low.
    #[allow(clippy::too_many_arguments)]
    pub async fn log_data_access(
        &self,
        event_type: AuditEventType,
        actor: AuditActor,
        origin: RequestOrigin,
        resource: &str,
        resource_id: Option<String>,
        action: impl Into<String>,
        success: bool,
        details: Map<String, Value>,
    ) -> Uuid {
        let severity = match (success, event_type) {
            (false, _) => Severity::High,
            (true, AuditEventType::ClientDeleted | AuditEventType::TaskDeleted) => Severity::Medium,
            (true, _) => Severity::Low,
        };
        let entry = NewAuditEntry::new(event_type, severity, action)
            .actor(actor)
            .origin(origin)
            .resource(resource, resource_id)
            .success(success)
            .details(details);
        self.log(entry).await
    }

    pub async fn log_unauthorized_access(
        &self,
        actor: AuditActor,
        origin: RequestOrigin,
        resource: &str,
        resource_id: Option<String>,
        action: impl Into<String>,
        required: Value,
    ) -> Uuid {
        let entry = NewAuditEntry::new(AuditEventType::UnauthorizedAccessAttempt, Severity::High, action)
            .actor(actor)
            .origin(origin)
            .resource(resource, resource_id)
            .detail("required", required)
            .failed("Insufficient permissions");
        self.log(entry).await
    }

    pub async fn log_security_event(
        &self,
        event_type: AuditEventType,
        severity: Severity,
        actor: AuditActor,
        origin: RequestOrigin,
        action: impl Into<String>,
        details: Map<String, Value>,
    ) -> Uuid {
        let entry = NewAuditEntry::new(event_type, severity, action)
            .actor(actor)
            .origin(origin)
            .success(false)
            .details(details);
        self.log(entry).await
    }

    /// System errors are medium; other system events low
    pub async fn log_system_event(
        &self,
        action: impl Into<String>,
        error_message: Option<String>,
        details: Map<String, Value>,
    ) -> Uuid {
        let entry = match error_message {
            Some(message) => NewAuditEntry::new(AuditEventType::SystemError, Severity::Medium, action)
                .failed(message),
            None => NewAuditEntry::new(AuditEventType::SystemEvent, Severity::Low, action),
        };
        self.log(entry.resource("system", None).details(details)).await
    }

    // -- query surface -------------------------------------------------------

    /// Newest first, capped at the configured maximum
    pub async fn query_logs(&self, mut filter: AuditFilter) -> Vec<AuditLogEntry> {
        let cap = self.config.max_query_results;
        filter.limit = Some(filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT).min(cap));
        match self.sink.query(&filter).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("audit query failed: {}", e);
                Vec::new()
            }
        }
    }

    /// High and critical failures, newest first
    pub async fn security_alerts(&self, limit: usize) -> Vec<AuditLogEntry> {
        let filter = AuditFilter {
            success: Some(false),
            limit: Some(self.config.max_query_results),
            ..Default::default()
        };
        let mut alerts: Vec<AuditLogEntry> = self
            .query_logs(filter)
            .await
            .into_iter()
            .filter(|e| e.severity >= Severity::High)
            .collect();
        alerts.truncate(limit);
        alerts
    }

    pub async fn user_activity(&self, actor_id: &str, window_days: i64) -> UserActivity {
        let filter = AuditFilter {
            actor_id: Some(actor_id.to_string()),
            start: Some(Utc::now() - Duration::days(window_days)),
            ..Default::default()
        };
        let entries = self.scan(filter).await;
        report::summarize_activity(actor_id, window_days, &entries)
    }

    pub async fn security_report(&self, window_days: i64) -> SecurityReport {
        let now = Utc::now();
        let filter = AuditFilter {
            start: Some(now - Duration::days(window_days)),
            ..Default::default()
        };
        let entries = self.scan(filter).await;
        report::build_report(window_days, &entries, now)
    }

    /// Read past the interactive query cap for aggregate views
    async fn scan(&self, mut filter: AuditFilter) -> Vec<AuditLogEntry> {
        filter.limit = Some(REPORT_SCAN_LIMIT);
        match self.sink.query(&filter).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("audit scan failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn redact_map(details: Map<String, Value>) -> Map<String, Value> {
    details
        .into_iter()
        .map(|(key, value)| {
            if SENSITIVE_KEY.is_match(&key) {
                (key, Value::String(REDACTED.to_string()))
            } else {
                (key, redact_value(value))
            }
        })
        .collect()
}

fn redact_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_value).collect()),
        other => other,
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
