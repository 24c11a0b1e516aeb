use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{apply_patch, is_manager_or_above, str_field, timestamp, tracked_changes, ServiceContext, ServiceError};
use crate::audit::{AuditEventType, RequestOrigin};
use crate::auth::Principal;
use crate::database::store::CLIENTS;
use crate::database::DocumentQuery;
use crate::permissions::has_permission;
use crate::rate_limit::OperationClass;
use crate::validation::EntityKind;

const VIEW: &str = "crm.clients.view";
const VIEW_ALL: &str = "crm.clients.view_all";
const CREATE: &str = "crm.clients.create";
const EDIT: &str = "crm.clients.edit";
const DELETE: &str = "crm.clients.delete";

/// Changes to these fields are audited with old and new values
const TRACKED: &[&str] = &["status", "assigned_to"];

#[derive(Clone)]
pub struct ClientService {
    ctx: ServiceContext,
}

/// Agents see their own clients; `crm.clients.view_all` sees everything
pub fn can_view_client(principal: &Principal, client: &Value) -> bool {
    has_permission(Some(principal.role), VIEW_ALL) || str_field(client, "assigned_to") == Some(principal.user_id.as_str())
}

impl ClientService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, principal: &Principal, origin: &RequestOrigin, input: &Value) -> Result<Value, ServiceError> {
        self.ctx
            .throttle(OperationClass::ClientCreation, &principal.user_id, principal.actor(), origin)
            .await?;
        let mut data = self.ctx.validated(EntityKind::Client, input, principal.actor(), origin).await?;

        self.ctx
            .authorize(principal, origin, "client", None, "create", has_permission(Some(principal.role), CREATE), CREATE)
            .await?;

        let assignee = data
            .get("assigned_to")
            .and_then(Value::as_str)
            .unwrap_or(principal.user_id.as_str())
            .to_string();
        if assignee != principal.user_id {
            self.ctx
                .authorize(principal, origin, "client", None, "assign", is_manager_or_above(principal), "manager")
                .await?;
        }

        let id = Uuid::new_v4().to_string();
        data.insert("id".into(), json!(id));
        data.insert("assigned_to".into(), json!(assignee));
        data.entry("status").or_insert_with(|| json!("prospect"));
        data.insert("created_by".into(), json!(principal.user_id));
        data.insert("created_at".into(), timestamp());
        data.insert("updated_at".into(), timestamp());

        let doc = Value::Object(data);
        self.ctx.store.put(CLIENTS, &id, doc.clone()).await?;

        let mut details = Map::new();
        details.insert("assigned_to".into(), json!(assignee));
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::ClientCreated,
                principal.actor(),
                origin.clone(),
                "client",
                Some(id),
                "create",
                true,
                details,
            )
            .await;
        Ok(doc)
    }

    pub async fn get(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "client", Some(id), "view", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;
        let client = self.ctx.load(CLIENTS, id, "client").await?;
        self.ctx
            .authorize(principal, origin, "client", Some(id), "view", can_view_client(principal, &client), VIEW_ALL)
            .await?;
        Ok(client)
    }

    /// Clients visible to the caller, optionally narrowed by status
    pub async fn list(&self, principal: &Principal, origin: &RequestOrigin, status: Option<&str>) -> Result<Vec<Value>, ServiceError> {
        self.ctx
            .authorize(principal, origin, "client", None, "list", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;

        let mut query = DocumentQuery::new();
        if !has_permission(Some(principal.role), VIEW_ALL) {
            query = query.eq("assigned_to", principal.user_id.clone());
        }
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        Ok(self.ctx.store.query(CLIENTS, &query).await?)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        input: &Value,
    ) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "client", Some(id), "update", has_permission(Some(principal.role), EDIT), EDIT)
            .await?;
        let mut client = self.ctx.load(CLIENTS, id, "client").await?;
        self.ctx
            .authorize(principal, origin, "client", Some(id), "update", can_view_client(principal, &client), VIEW_ALL)
            .await?;

        let patch = self.ctx.validated_patch(EntityKind::Client, input, principal.actor(), origin).await?;
        let changes = tracked_changes(&client, &patch, TRACKED);
        if changes.contains_key("assigned_to") {
            self.ctx
                .authorize(principal, origin, "client", Some(id), "reassign", is_manager_or_above(principal), "manager")
                .await?;
        }

        apply_patch(&mut client, patch);
        self.ctx.store.put(CLIENTS, id, client.clone()).await?;

        let mut details = Map::new();
        if !changes.is_empty() {
            details.insert("changes".into(), Value::Object(changes));
        }
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::ClientUpdated,
                principal.actor(),
                origin.clone(),
                "client",
                Some(id.to_string()),
                "update",
                true,
                details,
            )
            .await;
        Ok(client)
    }

    /// Manager-or-above with the delete permission
    pub async fn delete(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<(), ServiceError> {
        let allowed = is_manager_or_above(principal) && has_permission(Some(principal.role), DELETE);
        self.ctx
            .authorize(principal, origin, "client", Some(id), "delete", allowed, DELETE)
            .await?;

        let client = self.ctx.load(CLIENTS, id, "client").await?;
        self.ctx.store.delete(CLIENTS, id).await?;

        let mut details = Map::new();
        if let Some(name) = client.get("name") {
            details.insert("name".into(), name.clone());
        }
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::ClientDeleted,
                principal.actor(),
                origin.clone(),
                "client",
                Some(id.to_string()),
                "delete",
                true,
                details,
            )
            .await;
        Ok(())
    }
}
