use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use thiserror::Error;
use tokio::sync::RwLock;

use super::entry::{AuditEventType, AuditLogEntry, Severity};
use crate::permissions::Role;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("audit serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Query filters; all optional and combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub severity: Option<Severity>,
    pub resource: Option<String>,
    pub success: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.actor_id.as_ref().map_or(true, |a| entry.actor_id.as_ref() == Some(a))
            && self.event_type.map_or(true, |t| entry.event_type == t)
            && self.severity.map_or(true, |s| entry.severity == s)
            && self.resource.as_ref().map_or(true, |r| entry.resource.as_ref() == Some(r))
            && self.success.map_or(true, |s| entry.success == s)
            && self.start.map_or(true, |s| entry.timestamp >= s)
            && self.end.map_or(true, |e| entry.timestamp <= e)
    }
}

/// Append-only destination for audit entries.
///
/// `query` returns newest-first and honours `filter.limit` (the logger always
/// sets it).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, entry: &AuditLogEntry) -> Result<(), AuditError>;

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, AuditError>;
}

/// Process-local sink, used in tests and when no database is configured
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        let entries = self.entries.read().await;
        let mut matched: Vec<AuditLogEntry> = entries.iter().filter(|e| filter.matches(e)).cloned().collect();
        // Stable sort keeps append order for equal timestamps; reverse for newest-first
        matched.sort_by_key(|e| e.timestamp);
        matched.reverse();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

/// Postgres-backed sink writing to `audit_logs`
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id UUID PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL,
                event_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                actor_id TEXT,
                actor_email TEXT,
                actor_role TEXT,
                ip_address TEXT,
                user_agent TEXT,
                resource TEXT,
                resource_id TEXT,
                action TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                details JSONB NOT NULL DEFAULT '{}'::jsonb,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS audit_logs_timestamp_idx ON audit_logs (timestamp DESC)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn write(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, timestamp, event_type, severity, actor_id, actor_email, actor_role,
                ip_address, user_agent, resource, resource_id, action, success, details, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(entry.event_type.as_str())
        .bind(entry.severity.as_str())
        .bind(&entry.actor_id)
        .bind(&entry.actor_email)
        .bind(entry.actor_role.map(|r| r.as_str()))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.resource)
        .bind(&entry.resource_id)
        .bind(&entry.action)
        .bind(entry.success)
        .bind(serde_json::Value::Object(entry.details.clone()))
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, timestamp, event_type, severity, actor_id, actor_email, actor_role, \
             ip_address, user_agent, resource, resource_id, action, success, details, error_message \
             FROM audit_logs WHERE TRUE",
        );
        if let Some(actor_id) = &filter.actor_id {
            qb.push(" AND actor_id = ").push_bind(actor_id.clone());
        }
        if let Some(event_type) = filter.event_type {
            qb.push(" AND event_type = ").push_bind(event_type.as_str());
        }
        if let Some(severity) = filter.severity {
            qb.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some(resource) = &filter.resource {
            qb.push(" AND resource = ").push_bind(resource.clone());
        }
        if let Some(success) = filter.success {
            qb.push(" AND success = ").push_bind(success);
        }
        if let Some(start) = filter.start {
            qb.push(" AND timestamp >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND timestamp <= ").push_bind(end);
        }
        qb.push(" ORDER BY timestamp DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let event_type: String = row.try_get("event_type")?;
            let severity: String = row.try_get("severity")?;
            let role: Option<String> = row.try_get("actor_role")?;
            let details: serde_json::Value = row.try_get("details")?;

            let Some(event_type) = AuditEventType::parse(&event_type) else {
                tracing::warn!("skipping audit row with unknown event type '{}'", event_type);
                continue;
            };

            entries.push(AuditLogEntry {
                id: row.try_get("id")?,
                timestamp: row.try_get("timestamp")?,
                event_type,
                severity: Severity::parse(&severity).unwrap_or(Severity::Medium),
                actor_id: row.try_get("actor_id")?,
                actor_email: row.try_get("actor_email")?,
                actor_role: role.as_deref().and_then(Role::parse),
                ip_address: row.try_get("ip_address")?,
                user_agent: row.try_get("user_agent")?,
                resource: row.try_get("resource")?,
                resource_id: row.try_get("resource_id")?,
                action: row.try_get("action")?,
                success: row.try_get("success")?,
                details: match details {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                },
                error_message: row.try_get("error_message")?,
            });
        }
        Ok(entries)
    }
}
