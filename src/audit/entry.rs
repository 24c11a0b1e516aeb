use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::permissions::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailure,
    Logout,
    TokenInvalid,
    PermissionChange,
    RoleChange,
    UserCreated,
    UserDeactivated,
    UserReactivated,
    UnauthorizedAccessAttempt,
    ApiAccess,
    DataAccess,
    ClientCreated,
    ClientUpdated,
    ClientDeleted,
    TaskCreated,
    TaskUpdated,
    TaskAssigned,
    TaskDeleted,
    InquirySubmitted,
    InquiryUpdated,
    InteractionLogged,
    RateLimitExceeded,
    SuspiciousInput,
    CsrfViolation,
    CorsViolation,
    SecurityEvent,
    SystemError,
    SystemEvent,
}

/// Coarse grouping used by the activity and report views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Authentication,
    UserManagement,
    DataAccess,
    Security,
    System,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::LoginSuccess => "LOGIN_SUCCESS",
            AuditEventType::LoginFailure => "LOGIN_FAILURE",
            AuditEventType::Logout => "LOGOUT",
            AuditEventType::TokenInvalid => "TOKEN_INVALID",
            AuditEventType::PermissionChange => "PERMISSION_CHANGE",
            AuditEventType::RoleChange => "ROLE_CHANGE",
            AuditEventType::UserCreated => "USER_CREATED",
            AuditEventType::UserDeactivated => "USER_DEACTIVATED",
            AuditEventType::UserReactivated => "USER_REACTIVATED",
            AuditEventType::UnauthorizedAccessAttempt => "UNAUTHORIZED_ACCESS_ATTEMPT",
            AuditEventType::ApiAccess => "API_ACCESS",
            AuditEventType::DataAccess => "DATA_ACCESS",
            AuditEventType::ClientCreated => "CLIENT_CREATED",
            AuditEventType::ClientUpdated => "CLIENT_UPDATED",
            AuditEventType::ClientDeleted => "CLIENT_DELETED",
            AuditEventType::TaskCreated => "TASK_CREATED",
            AuditEventType::TaskUpdated => "TASK_UPDATED",
            AuditEventType::TaskAssigned => "TASK_ASSIGNED",
            AuditEventType::TaskDeleted => "TASK_DELETED",
            AuditEventType::InquirySubmitted => "INQUIRY_SUBMITTED",
            AuditEventType::InquiryUpdated => "INQUIRY_UPDATED",
            AuditEventType::InteractionLogged => "INTERACTION_LOGGED",
            AuditEventType::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AuditEventType::SuspiciousInput => "SUSPICIOUS_INPUT",
            AuditEventType::CsrfViolation => "CSRF_VIOLATION",
            AuditEventType::CorsViolation => "CORS_VIOLATION",
            AuditEventType::SecurityEvent => "SECURITY_EVENT",
            AuditEventType::SystemError => "SYSTEM_ERROR",
            AuditEventType::SystemEvent => "SYSTEM_EVENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(Value::String(value.to_ascii_uppercase())).ok()
    }

    pub fn category(&self) -> EventCategory {
        use AuditEventType::*;
        match self {
            LoginSuccess | LoginFailure | Logout | TokenInvalid => EventCategory::Authentication,
            PermissionChange | RoleChange | UserCreated | UserDeactivated | UserReactivated => {
                EventCategory::UserManagement
            }
            ApiAccess | DataAccess | ClientCreated | ClientUpdated | ClientDeleted | TaskCreated
            | TaskUpdated | TaskAssigned | TaskDeleted | InquirySubmitted | InquiryUpdated
            | InteractionLogged => EventCategory::DataAccess,
            UnauthorizedAccessAttempt | RateLimitExceeded | SuspiciousInput | CsrfViolation
            | CorsViolation | SecurityEvent => EventCategory::Security,
            SystemError | SystemEvent => EventCategory::System,
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Weight used when scoring actor risk
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 3,
            Severity::High => 5,
            Severity::Critical => 10,
        }
    }
}

/// Who performed the action, when known
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    pub id: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Network origin of the request, when known
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A written audit record. Never mutated after the logger produces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: Severity,
    pub actor_id: Option<String>,
    pub actor_email: Option<String>,
    pub actor_role: Option<Role>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub action: String,
    pub success: bool,
    pub details: Map<String, Value>,
    pub error_message: Option<String>,
}

/// Input to [`crate::audit::AuditLogger::log`]
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub event_type: AuditEventType,
    pub severity: Severity,
    pub actor: AuditActor,
    pub origin: RequestOrigin,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub action: String,
    pub success: bool,
    pub details: Map<String, Value>,
    pub error_message: Option<String>,
}

impl NewAuditEntry {
    pub fn new(event_type: AuditEventType, severity: Severity, action: impl Into<String>) -> Self {
        Self {
            event_type,
            severity,
            actor: AuditActor::default(),
            origin: RequestOrigin::default(),
            resource: None,
            resource_id: None,
            action: action.into(),
            success: true,
            details: Map::new(),
            error_message: None,
        }
    }

    pub fn actor(mut self, actor: AuditActor) -> Self {
        self.actor = actor;
        self
    }

    pub fn origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn resource(mut self, resource: impl Into<String>, resource_id: Option<String>) -> Self {
        self.resource = Some(resource.into());
        self.resource_id = resource_id;
        self
    }

    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn details(mut self, details: Map<String, Value>) -> Self {
        self.details.extend(details);
        self
    }
}
