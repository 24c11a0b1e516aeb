use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::entry::{AuditEventType, AuditLogEntry, EventCategory, Severity};

/// Activity summary for one actor over a trailing window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub actor_id: String,
    pub window_days: i64,
    pub total_events: usize,
    pub logins: usize,
    pub failed_logins: usize,
    pub data_access: usize,
    pub security_events: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorRisk {
    pub actor_id: String,
    pub risk_score: u32,
    pub events: usize,
    pub failed_events: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub generated_at: DateTime<Utc>,
    pub window_days: i64,
    pub total_events: usize,
    pub failed_events: usize,
    pub by_event_type: BTreeMap<AuditEventType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub top_risk_actors: Vec<ActorRisk>,
}

/// Number of actors listed in a report
pub const TOP_RISK_ACTORS: usize = 10;

pub fn summarize_activity(actor_id: &str, window_days: i64, entries: &[AuditLogEntry]) -> UserActivity {
    let mut activity = UserActivity {
        actor_id: actor_id.to_string(),
        window_days,
        ..Default::default()
    };

    for entry in entries.iter().filter(|e| e.actor_id.as_deref() == Some(actor_id)) {
        activity.total_events += 1;
        match entry.event_type {
            AuditEventType::LoginSuccess => activity.logins += 1,
            AuditEventType::LoginFailure => activity.failed_logins += 1,
            _ => {}
        }
        match entry.event_type.category() {
            EventCategory::DataAccess => activity.data_access += 1,
            EventCategory::Security => activity.security_events += 1,
            _ => {}
        }
        if activity.last_activity.map_or(true, |t| entry.timestamp > t) {
            activity.last_activity = Some(entry.timestamp);
        }
    }

    activity
}

/// Severity weight, doubled when the event records a failure
pub fn risk_points(entry: &AuditLogEntry) -> u32 {
    let weight = entry.severity.weight();
    if entry.success {
        weight
    } else {
        weight * 2
    }
}

pub fn build_report(window_days: i64, entries: &[AuditLogEntry], now: DateTime<Utc>) -> SecurityReport {
    let mut by_event_type = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    let mut actors: HashMap<&str, ActorRisk> = HashMap::new();
    let mut failed_events = 0;

    for entry in entries {
        *by_event_type.entry(entry.event_type).or_insert(0) += 1;
        *by_severity.entry(entry.severity).or_insert(0) += 1;
        if !entry.success {
            failed_events += 1;
        }

        if let Some(actor_id) = entry.actor_id.as_deref() {
            let risk = actors.entry(actor_id).or_insert_with(|| ActorRisk {
                actor_id: actor_id.to_string(),
                risk_score: 0,
                events: 0,
                failed_events: 0,
            });
            risk.risk_score += risk_points(entry);
            risk.events += 1;
            if !entry.success {
                risk.failed_events += 1;
            }
        }
    }

    let mut top_risk_actors: Vec<ActorRisk> = actors.into_values().collect();
    top_risk_actors.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then_with(|| a.actor_id.cmp(&b.actor_id)));
    top_risk_actors.truncate(TOP_RISK_ACTORS);

    SecurityReport {
        generated_at: now,
        window_days,
        total_events: entries.len(),
        failed_events,
        by_event_type,
        by_severity,
        top_risk_actors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use uuid::Uuid;

    fn entry(actor: &str, event_type: AuditEventType, severity: Severity, success: bool) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            severity,
            actor_id: Some(actor.to_string()),
            actor_email: None,
            actor_role: None,
            ip_address: None,
            user_agent: None,
            resource: None,
            resource_id: None,
            action: "test".into(),
            success,
            details: Map::new(),
            error_message: None,
        }
    }

    #[test]
    fn risk_is_weighted_and_failure_doubled() {
        let entries = vec![
            entry("alice", AuditEventType::ApiAccess, Severity::Low, true),
            entry("alice", AuditEventType::ApiAccess, Severity::Low, true),
            entry("mallory", AuditEventType::UnauthorizedAccessAttempt, Severity::High, false),
            entry("mallory", AuditEventType::LoginFailure, Severity::Medium, false),
        ];
        let report = build_report(7, &entries, Utc::now());

        assert_eq!(report.total_events, 4);
        assert_eq!(report.failed_events, 2);
        assert_eq!(report.by_severity[&Severity::Low], 2);
        assert_eq!(report.top_risk_actors[0].actor_id, "mallory");
        assert_eq!(report.top_risk_actors[0].risk_score, 5 * 2 + 3 * 2);
        assert_eq!(report.top_risk_actors[1].risk_score, 2);
    }

    #[test]
    fn activity_counts_by_category() {
        let entries = vec![
            entry("bob", AuditEventType::LoginSuccess, Severity::Low, true),
            entry("bob", AuditEventType::LoginFailure, Severity::Medium, false),
            entry("bob", AuditEventType::ClientCreated, Severity::Low, true),
            entry("bob", AuditEventType::RateLimitExceeded, Severity::High, false),
            entry("carol", AuditEventType::LoginSuccess, Severity::Low, true),
        ];
        let activity = summarize_activity("bob", 30, &entries);
        assert_eq!(activity.total_events, 4);
        assert_eq!(activity.logins, 1);
        assert_eq!(activity.failed_logins, 1);
        assert_eq!(activity.data_access, 1);
        assert_eq!(activity.security_events, 1);
        assert!(activity.last_activity.is_some());
    }
}
