//! Per-entity façades over the document store.
//!
//! Every write passes rate limiting (for creation flows), screening and
//! validation, and an entity-specific authorization rule before it reaches
//! storage. Status, role and assignment changes are audited with old and new
//! values.

pub mod client;
pub mod inquiry;
pub mod interaction;
pub mod task;
pub mod user;

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::audit::{AuditActor, AuditEventType, AuditLogger, RequestOrigin, Severity};
use crate::auth::Principal;
use crate::database::{DocumentStore, StoreError};
use crate::permissions::{can_access_role_content, Role};
use crate::rate_limit::{OperationClass, RateLimiters};
use crate::validation::{AttackMatch, EntityKind, InputRejection, ValidationErrors};

pub use client::ClientService;
pub use inquiry::InquiryService;
pub use interaction::InteractionService;
pub use task::TaskService;
pub use user::{AccountStanding, UserService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("attack pattern '{}' in field '{}'", .0.kind, .0.field)]
    Attack(AttackMatch),

    #[error("forbidden: requires {0}")]
    Forbidden(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

/// Shared handles every service needs
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn DocumentStore>,
    pub limiters: Arc<RateLimiters>,
    pub audit: Arc<AuditLogger>,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn DocumentStore>, limiters: Arc<RateLimiters>, audit: Arc<AuditLogger>) -> Self {
        Self { store, limiters, audit }
    }

    /// Turn a failed check into a logged denial
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn authorize(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        resource: &str,
        resource_id: Option<&str>,
        action: &str,
        allowed: bool,
        required: &str,
    ) -> Result<(), ServiceError> {
        if allowed {
            return Ok(());
        }

        tracing::warn!(
            user_id = %principal.user_id,
            role = %principal.role,
            resource,
            action,
            "denied: requires {}",
            required
        );
        self.audit
            .log_unauthorized_access(
                principal.actor(),
                origin.clone(),
                resource,
                resource_id.map(str::to_string),
                action,
                json!({ "required": required, "role": principal.role }),
            )
            .await;
        Err(ServiceError::Forbidden(required.to_string()))
    }

    pub(crate) async fn throttle(
        &self,
        class: OperationClass,
        key: &str,
        actor: AuditActor,
        origin: &RequestOrigin,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let decision = self.limiters.for_class(class).check_at(key, now).await;
        if decision.allowed {
            return Ok(());
        }

        let mut details = Map::new();
        details.insert("operation".into(), json!(class.as_str()));
        details.insert("subject".into(), json!(key));
        self.audit
            .log_security_event(
                AuditEventType::RateLimitExceeded,
                Severity::High,
                actor,
                origin.clone(),
                format!("{} rate limit", class.as_str()),
                details,
            )
            .await;
        Err(ServiceError::RateLimited {
            retry_after_secs: decision.retry_after_secs(now),
        })
    }

    /// Log screening hits; plain validation failures are returned unlogged
    pub(crate) async fn reject(&self, rejection: InputRejection, actor: AuditActor, origin: &RequestOrigin) -> ServiceError {
        match rejection {
            InputRejection::Invalid(errors) => ServiceError::Validation(errors),
            InputRejection::Attack(hit) => {
                let mut details = Map::new();
                details.insert("field".into(), json!(hit.field));
                details.insert("pattern".into(), json!(hit.kind.as_str()));
                self.audit
                    .log_security_event(
                        AuditEventType::SuspiciousInput,
                        Severity::High,
                        actor,
                        origin.clone(),
                        "input screening",
                        details,
                    )
                    .await;
                ServiceError::Attack(hit)
            }
        }
    }

    pub(crate) async fn validated(
        &self,
        kind: EntityKind,
        input: &Value,
        actor: AuditActor,
        origin: &RequestOrigin,
    ) -> Result<Map<String, Value>, ServiceError> {
        match crate::validation::validate_and_sanitize(kind, input) {
            Ok(data) => Ok(data),
            Err(rejection) => Err(self.reject(rejection, actor, origin).await),
        }
    }

    pub(crate) async fn validated_patch(
        &self,
        kind: EntityKind,
        input: &Value,
        actor: AuditActor,
        origin: &RequestOrigin,
    ) -> Result<Map<String, Value>, ServiceError> {
        match crate::validation::validate_patch(kind, input) {
            Ok(data) => Ok(data),
            Err(rejection) => Err(self.reject(rejection, actor, origin).await),
        }
    }

    pub(crate) async fn load(&self, collection: &str, id: &str, what: &str) -> Result<Value, ServiceError> {
        self.store
            .get(collection, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(what.to_string()))
    }
}

pub(crate) fn is_manager_or_above(principal: &Principal) -> bool {
    can_access_role_content(Some(principal.role), Role::Manager)
}

pub(crate) fn str_field<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

pub(crate) fn timestamp() -> Value {
    json!(Utc::now().to_rfc3339())
}

/// `{field: {old, new}}` for each watched field the patch actually changes
pub(crate) fn tracked_changes(current: &Value, patch: &Map<String, Value>, watched: &[&str]) -> Map<String, Value> {
    watched
        .iter()
        .filter_map(|field| {
            let new = patch.get(*field)?;
            let old = current.get(*field).cloned().unwrap_or(Value::Null);
            (old != *new).then(|| (field.to_string(), json!({ "old": old, "new": new })))
        })
        .collect()
}

/// Overlay a validated patch onto a stored document
pub(crate) fn apply_patch(current: &mut Value, patch: Map<String, Value>) {
    if let Value::Object(doc) = current {
        doc.extend(patch);
        doc.insert("updated_at".into(), timestamp());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_changes_reports_only_differences() {
        let current = json!({ "status": "active", "assigned_to": "u1", "name": "Acme" });
        let mut patch = Map::new();
        patch.insert("status".into(), json!("churned"));
        patch.insert("assigned_to".into(), json!("u1"));
        patch.insert("name".into(), json!("Acme Ltd"));

        let changes = tracked_changes(&current, &patch, &["status", "assigned_to"]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["status"], json!({ "old": "active", "new": "churned" }));
    }
}
