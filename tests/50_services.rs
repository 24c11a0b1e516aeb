mod common;

use anyhow::Result;
use serde_json::json;

use agency_crm::audit::{AuditEventType, RequestOrigin, Severity};
use agency_crm::auth::Principal;
use agency_crm::config::AppConfig;
use agency_crm::permissions::Role;
use agency_crm::services::{AccountStanding, ServiceError};

use common::TestApp;

fn principal(user_id: &str, role: Role) -> Principal {
    Principal {
        user_id: user_id.to_string(),
        email: format!("{}@agency.test", user_id),
        role,
        session_id: format!("session-{}", user_id),
    }
}

fn origin() -> RequestOrigin {
    RequestOrigin {
        ip: Some("198.51.100.4".into()),
        user_agent: Some("integration-test".into()),
    }
}

#[tokio::test]
async fn agents_only_see_their_own_clients() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);
    let manager = principal("manager-1", Role::Manager);
    app.seed_client("mine", "agent-1").await;
    app.seed_client("theirs", "agent-2").await;

    let visible = app.state.clients.list(&agent, &origin(), None).await?;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0]["id"], json!("mine"));
    assert_eq!(app.state.clients.list(&manager, &origin(), None).await?.len(), 2);

    let err = app.state.clients.get(&agent, &origin(), "theirs").await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    let denied = app.audit_of(AuditEventType::UnauthorizedAccessAttempt).await;
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].resource_id.as_deref(), Some("theirs"));

    assert!(matches!(
        app.state.clients.get(&manager, &origin(), "missing").await,
        Err(ServiceError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn client_creation_defaults_and_assignment_rules() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);
    let manager = principal("manager-1", Role::Manager);

    let created = app
        .state
        .clients
        .create(&agent, &origin(), &json!({ "name": "Bakery Co", "email": "hello@bakery.test" }))
        .await?;
    assert_eq!(created["assigned_to"], json!("agent-1"));
    assert_eq!(created["status"], json!("prospect"));
    assert_eq!(created["created_by"], json!("agent-1"));

    let err = app
        .state
        .clients
        .create(
            &agent,
            &origin(),
            &json!({ "name": "Florist Ltd", "email": "hi@florist.test", "assigned_to": "agent-2" }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let created = app
        .state
        .clients
        .create(
            &manager,
            &origin(),
            &json!({ "name": "Florist Ltd", "email": "hi@florist.test", "assigned_to": "agent-2" }),
        )
        .await?;
    assert_eq!(created["assigned_to"], json!("agent-2"));
    assert_eq!(app.audit_of(AuditEventType::ClientCreated).await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn invalid_and_hostile_input_is_refused() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);

    let err = app
        .state
        .clients
        .create(&agent, &origin(), &json!({ "name": "", "email": "nope" }))
        .await
        .unwrap_err();
    match err {
        ServiceError::Validation(errors) => {
            assert!(errors.has_field("name"));
            assert!(errors.has_field("email"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    // Plain validation failures are not security events
    assert!(app.audit_of(AuditEventType::SuspiciousInput).await.is_empty());

    let err = app
        .state
        .clients
        .create(&agent, &origin(), &json!({ "name": "Acme", "email": "a@acme.test", "notes": "'; DROP TABLE clients; --" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Attack(_)));
    let hits = app.audit_of(AuditEventType::SuspiciousInput).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].details["field"], json!("notes"));
    assert_eq!(hits[0].ip_address.as_deref(), Some("198.51.100.4"));
    Ok(())
}

#[tokio::test]
async fn client_creation_is_throttled_per_user() -> Result<()> {
    let mut config = AppConfig::development();
    config.api.enable_rate_limiting = true;
    let app = TestApp::with_config(config);
    let agent = principal("agent-1", Role::Agent);

    for i in 0..5 {
        let input = json!({ "name": format!("Client {}", i), "email": format!("c{}@clients.test", i) });
        app.state.clients.create(&agent, &origin(), &input).await?;
    }
    let err = app
        .state
        .clients
        .create(&agent, &origin(), &json!({ "name": "One Too Many", "email": "six@clients.test" }))
        .await
        .unwrap_err();
    match err {
        ServiceError::RateLimited { retry_after_secs } => assert!(retry_after_secs >= 1),
        other => panic!("expected rate limit, got {:?}", other),
    }

    // Another user has their own budget
    let other = principal("agent-2", Role::Agent);
    app.state
        .clients
        .create(&other, &origin(), &json!({ "name": "Fresh Start", "email": "fresh@clients.test" }))
        .await?;

    let exceeded = app.audit_of(AuditEventType::RateLimitExceeded).await;
    assert_eq!(exceeded.len(), 1);
    assert_eq!(exceeded[0].details["operation"], json!("client_creation"));
    Ok(())
}

#[tokio::test]
async fn status_and_reassignment_changes_are_tracked() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);
    let manager = principal("manager-1", Role::Manager);
    app.seed_client("c1", "agent-1").await;

    let updated = app
        .state
        .clients
        .update(&agent, &origin(), "c1", &json!({ "status": "inactive", "phone": "+44 20 7946 0000" }))
        .await?;
    assert_eq!(updated["status"], json!("inactive"));
    assert_eq!(updated["name"], json!("Acme Ltd"));

    let err = app
        .state
        .clients
        .update(&agent, &origin(), "c1", &json!({ "assigned_to": "agent-2" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    app.state
        .clients
        .update(&manager, &origin(), "c1", &json!({ "assigned_to": "agent-2" }))
        .await?;

    let updates = app.audit_of(AuditEventType::ClientUpdated).await;
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].details["changes"]["status"]["old"], json!("active"));
    assert_eq!(updates[0].details["changes"]["status"]["new"], json!("inactive"));
    assert_eq!(updates[1].details["changes"]["assigned_to"]["new"], json!("agent-2"));

    // agent-1 no longer sees it
    assert!(app.state.clients.get(&agent, &origin(), "c1").await.is_err());
    Ok(())
}

#[tokio::test]
async fn task_assignment_needs_the_assign_permission() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);
    let manager = principal("manager-1", Role::Manager);

    let task = app
        .state
        .tasks
        .create(&agent, &origin(), &json!({ "title": "Draft homepage copy", "priority": "high" }))
        .await?;
    let id = task["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(task["assigned_to"], json!("agent-1"));
    assert_eq!(task["status"], json!("todo"));

    assert!(matches!(
        app.state.tasks.assign(&agent, &origin(), &id, "agent-2").await,
        Err(ServiceError::Forbidden(_))
    ));

    let reassigned = app.state.tasks.assign(&manager, &origin(), &id, "agent-2").await?;
    assert_eq!(reassigned["assigned_to"], json!("agent-2"));

    let assigned = app.audit_of(AuditEventType::TaskAssigned).await;
    assert_eq!(assigned[0].details["old_value"], json!("agent-1"));
    assert_eq!(assigned[0].details["new_value"], json!("agent-2"));

    let err = app
        .state
        .tasks
        .create(&manager, &origin(), &json!({ "title": "Orphan task", "client_id": "no-such-client" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ref e) if e.has_field("client_id")));
    Ok(())
}

#[tokio::test]
async fn tasks_only_link_to_visible_clients() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);
    app.seed_client("mine", "agent-1").await;
    app.seed_client("theirs", "agent-2").await;

    let task = app
        .state
        .tasks
        .create(&agent, &origin(), &json!({ "title": "Call back", "client_id": "mine" }))
        .await?;
    let id = task["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(task["client_id"], json!("mine"));

    // Hidden and unknown ids are refused alike
    for client_id in ["theirs", "no-such-client"] {
        assert!(matches!(
            app.state
                .tasks
                .create(&agent, &origin(), &json!({ "title": "Snoop", "client_id": client_id }))
                .await,
            Err(ServiceError::Forbidden(_))
        ));
    }
    assert!(matches!(
        app.state.tasks.update(&agent, &origin(), &id, &json!({ "client_id": "theirs" })).await,
        Err(ServiceError::Forbidden(_))
    ));
    let stored = app.state.tasks.get(&agent, &origin(), &id).await?;
    assert_eq!(stored["client_id"], json!("mine"));

    let denied = app.audit_of(AuditEventType::UnauthorizedAccessAttempt).await;
    assert_eq!(denied.len(), 3);
    assert!(denied.iter().all(|e| e.severity == Severity::High));
    Ok(())
}

#[tokio::test]
async fn interactions_follow_client_visibility() -> Result<()> {
    let app = TestApp::new();
    let agent = principal("agent-1", Role::Agent);
    app.seed_client("mine", "agent-1").await;
    app.seed_client("theirs", "agent-2").await;

    let logged = app
        .state
        .interactions
        .log(&agent, &origin(), "mine", &json!({ "kind": "call", "summary": "Discussed the redesign" }))
        .await?;
    assert_eq!(logged["client_id"], json!("mine"));
    assert_eq!(app.state.interactions.list_for_client(&agent, &origin(), "mine").await?.len(), 1);

    assert!(matches!(
        app.state
            .interactions
            .log(&agent, &origin(), "theirs", &json!({ "kind": "email", "summary": "Sent invoice" }))
            .await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        app.state
            .interactions
            .log(&agent, &origin(), "mine", &json!({ "kind": "carrier pigeon", "summary": "Coo" }))
            .await,
        Err(ServiceError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn role_changes_flow_strictly_downward() -> Result<()> {
    let app = TestApp::new();
    let admin = principal("admin-1", Role::Admin);
    let owner = principal("owner-1", Role::Owner);
    app.seed_user("agent-1", Role::Agent, "active").await;
    app.seed_user("admin-2", Role::Admin, "active").await;

    let promoted = app.state.users.change_role(&admin, &origin(), "agent-1", Role::Manager).await?;
    assert_eq!(promoted["role"], json!("manager"));

    // Not to their own level, and not over a peer
    assert!(matches!(
        app.state.users.change_role(&admin, &origin(), "agent-1", Role::Admin).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        app.state.users.change_role(&admin, &origin(), "admin-2", Role::Agent).await,
        Err(ServiceError::Forbidden(_))
    ));
    app.state.users.change_role(&owner, &origin(), "admin-2", Role::Manager).await?;

    let changes = app.audit_of(AuditEventType::PermissionChange).await;
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].severity, Severity::High);
    assert_eq!(changes[0].details["old_value"], json!("agent"));
    assert_eq!(changes[0].details["new_value"], json!("manager"));

    assert_eq!(app.state.users.assignable_roles(&admin), vec![Role::Agent, Role::Manager]);
    Ok(())
}

#[tokio::test]
async fn provisioning_and_deactivation() -> Result<()> {
    let app = TestApp::new();
    let admin = principal("admin-1", Role::Admin);
    let manager = principal("manager-1", Role::Manager);

    let input = json!({ "display_name": "New Hire", "email": "new.hire@agency.test", "role": "agent" });
    assert!(matches!(
        app.state.users.provision(&manager, &origin(), &input).await,
        Err(ServiceError::Forbidden(_))
    ));

    let user = app.state.users.provision(&admin, &origin(), &input).await?;
    let id = user["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(user["status"], json!("active"));
    assert!(matches!(
        app.state.users.provision(&admin, &origin(), &input).await,
        Err(ServiceError::Conflict(_))
    ));

    let promote_to_owner = json!({ "display_name": "Usurper", "email": "usurper@agency.test", "role": "owner" });
    assert!(matches!(
        app.state.users.provision(&admin, &origin(), &promote_to_owner).await,
        Err(ServiceError::Forbidden(_))
    ));

    assert_eq!(app.state.users.standing(&id).await?, AccountStanding::Active(Some(Role::Agent)));
    app.state.users.deactivate(&admin, &origin(), &id).await?;
    assert!(app.state.users.is_deactivated(&id).await?);
    assert_eq!(app.state.users.standing(&id).await?, AccountStanding::Deactivated);
    app.state.users.reactivate(&admin, &origin(), &id).await?;
    assert!(!app.state.users.is_deactivated(&id).await?);
    assert!(!app.state.users.is_deactivated("never-stored").await?);
    assert_eq!(app.state.users.standing("never-stored").await?, AccountStanding::Unknown);

    assert_eq!(app.audit_of(AuditEventType::UserCreated).await.len(), 1);
    assert_eq!(app.audit_of(AuditEventType::UserDeactivated).await.len(), 1);
    assert_eq!(app.audit_of(AuditEventType::UserReactivated).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn user_listing_is_scoped_to_accessible_roles() -> Result<()> {
    let app = TestApp::new();
    app.seed_user("agent-1", Role::Agent, "active").await;
    app.seed_user("manager-1", Role::Manager, "active").await;
    app.seed_user("admin-1", Role::Admin, "active").await;
    app.seed_user("owner-1", Role::Owner, "active").await;

    let manager = principal("manager-1", Role::Manager);
    let visible = app.state.users.list(&manager, &origin()).await?;
    assert_eq!(visible.len(), 2);

    let agent = principal("agent-1", Role::Agent);
    assert!(matches!(app.state.users.list(&agent, &origin()).await, Err(ServiceError::Forbidden(_))));
    // Self lookups always work
    assert_eq!(app.state.users.get(&agent, &origin(), "agent-1").await?["id"], json!("agent-1"));
    Ok(())
}
