//! Audit trail for authentication, authorization, data access and security events.

pub mod entry;
pub mod logger;
pub mod report;
pub mod sink;

pub use entry::{AuditActor, AuditEventType, AuditLogEntry, EventCategory, NewAuditEntry, RequestOrigin, Severity};
pub use logger::{AuditConfig, AuditLevel, AuditLogger, REDACTED};
pub use report::{ActorRisk, SecurityReport, UserActivity};
pub use sink::{AuditError, AuditFilter, AuditSink, MemoryAuditSink, PgAuditSink};
