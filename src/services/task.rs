use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::client::can_view_client;
use super::{apply_patch, is_manager_or_above, str_field, timestamp, tracked_changes, ServiceContext, ServiceError};
use crate::audit::{AuditEventType, RequestOrigin};
use crate::auth::Principal;
use crate::database::store::{CLIENTS, TASKS};
use crate::database::DocumentQuery;
use crate::permissions::has_permission;
use crate::validation::{EntityKind, ValidationErrors};

const VIEW: &str = "crm.tasks.view";
const CREATE: &str = "crm.tasks.create";
const EDIT: &str = "crm.tasks.edit";
const ASSIGN: &str = "crm.tasks.assign";
const DELETE: &str = "crm.tasks.delete";
const CLIENT_VIEW_ALL: &str = "crm.clients.view_all";

const TRACKED: &[&str] = &["status", "priority", "assigned_to"];

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assigned_to: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Clone)]
pub struct TaskService {
    ctx: ServiceContext,
}

fn is_assignee(principal: &Principal, task: &Value) -> bool {
    str_field(task, "assigned_to") == Some(principal.user_id.as_str())
}

impl TaskService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// A task may only point at a client the caller can see. Callers without
    /// `crm.clients.view_all` get the same refusal for unknown and hidden ids.
    async fn linkable_client(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        task_id: Option<&str>,
        client_id: &str,
    ) -> Result<(), ServiceError> {
        let client = self.ctx.store.get(CLIENTS, client_id).await?;
        if client.is_none() && has_permission(Some(principal.role), CLIENT_VIEW_ALL) {
            return Err(ValidationErrors::single("client_id", "Unknown client").into());
        }
        let visible = client.as_ref().map_or(false, |client| can_view_client(principal, client));
        self.ctx
            .authorize(principal, origin, "task", task_id, "link_client", visible, CLIENT_VIEW_ALL)
            .await
    }

    pub async fn create(&self, principal: &Principal, origin: &RequestOrigin, input: &Value) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "task", None, "create", has_permission(Some(principal.role), CREATE), CREATE)
            .await?;
        let mut data = self.ctx.validated(EntityKind::Task, input, principal.actor(), origin).await?;

        let assignee = data
            .get("assigned_to")
            .and_then(Value::as_str)
            .unwrap_or(principal.user_id.as_str())
            .to_string();
        if assignee != principal.user_id {
            self.ctx
                .authorize(principal, origin, "task", None, "assign", has_permission(Some(principal.role), ASSIGN), ASSIGN)
                .await?;
        }
        if let Some(client_id) = data.get("client_id").and_then(Value::as_str) {
            self.linkable_client(principal, origin, None, client_id).await?;
        }

        let id = Uuid::new_v4().to_string();
        data.insert("id".into(), json!(id));
        data.insert("assigned_to".into(), json!(assignee));
        data.entry("status").or_insert_with(|| json!("todo"));
        data.entry("priority").or_insert_with(|| json!("medium"));
        data.insert("created_by".into(), json!(principal.user_id));
        data.insert("created_at".into(), timestamp());
        data.insert("updated_at".into(), timestamp());

        let doc = Value::Object(data);
        self.ctx.store.put(TASKS, &id, doc.clone()).await?;

        let mut details = Map::new();
        details.insert("assigned_to".into(), json!(assignee));
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::TaskCreated,
                principal.actor(),
                origin.clone(),
                "task",
                Some(id),
                "create",
                true,
                details,
            )
            .await;
        Ok(doc)
    }

    /// Agents only ever see their own tasks, whatever the filter says
    pub async fn list(&self, principal: &Principal, origin: &RequestOrigin, filter: TaskFilter) -> Result<Vec<Value>, ServiceError> {
        self.ctx
            .authorize(principal, origin, "task", None, "list", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;

        let mut query = DocumentQuery::new();
        if !is_manager_or_above(principal) {
            query = query.eq("assigned_to", principal.user_id.clone());
        } else if let Some(assignee) = filter.assigned_to {
            query = query.eq("assigned_to", assignee);
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status);
        }
        if let Some(client_id) = filter.client_id {
            query = query.eq("client_id", client_id);
        }
        Ok(self.ctx.store.query(TASKS, &query).await?)
    }

    pub async fn get(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "task", Some(id), "view", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;
        let task = self.ctx.load(TASKS, id, "task").await?;
        let allowed = is_assignee(principal, &task) || is_manager_or_above(principal);
        self.ctx
            .authorize(principal, origin, "task", Some(id), "view", allowed, "assignee or manager")
            .await?;
        Ok(task)
    }

    /// Only the assignee or a manager-or-above may edit a task
    pub async fn update(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        input: &Value,
    ) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "task", Some(id), "update", has_permission(Some(principal.role), EDIT), EDIT)
            .await?;
        let mut task = self.ctx.load(TASKS, id, "task").await?;
        let allowed = is_assignee(principal, &task) || is_manager_or_above(principal);
        self.ctx
            .authorize(principal, origin, "task", Some(id), "update", allowed, "assignee or manager")
            .await?;

        let patch = self.ctx.validated_patch(EntityKind::Task, input, principal.actor(), origin).await?;
        if let Some(client_id) = patch.get("client_id").and_then(Value::as_str) {
            if str_field(&task, "client_id") != Some(client_id) {
                self.linkable_client(principal, origin, Some(id), client_id).await?;
            }
        }
        let changes = tracked_changes(&task, &patch, TRACKED);
        if changes.contains_key("assigned_to") {
            self.ctx
                .authorize(principal, origin, "task", Some(id), "assign", has_permission(Some(principal.role), ASSIGN), ASSIGN)
                .await?;
        }

        apply_patch(&mut task, patch);
        self.ctx.store.put(TASKS, id, task.clone()).await?;

        let mut details = Map::new();
        if !changes.is_empty() {
            details.insert("changes".into(), Value::Object(changes));
        }
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::TaskUpdated,
                principal.actor(),
                origin.clone(),
                "task",
                Some(id.to_string()),
                "update",
                true,
                details,
            )
            .await;
        Ok(task)
    }

    pub async fn assign(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        assignee: &str,
    ) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "task", Some(id), "assign", has_permission(Some(principal.role), ASSIGN), ASSIGN)
            .await?;
        let mut task = self.ctx.load(TASKS, id, "task").await?;
        let patch = self
            .ctx
            .validated_patch(EntityKind::Task, &json!({ "assigned_to": assignee }), principal.actor(), origin)
            .await?;

        let previous = task.get("assigned_to").cloned().unwrap_or(Value::Null);
        apply_patch(&mut task, patch);
        self.ctx.store.put(TASKS, id, task.clone()).await?;

        let mut details = Map::new();
        details.insert("old_value".into(), previous);
        details.insert("new_value".into(), json!(assignee));
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::TaskAssigned,
                principal.actor(),
                origin.clone(),
                "task",
                Some(id.to_string()),
                "assign",
                true,
                details,
            )
            .await;
        Ok(task)
    }

    pub async fn delete(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<(), ServiceError> {
        self.ctx
            .authorize(principal, origin, "task", Some(id), "delete", has_permission(Some(principal.role), DELETE), DELETE)
            .await?;
        self.ctx.load(TASKS, id, "task").await?;
        self.ctx.store.delete(TASKS, id).await?;
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::TaskDeleted,
                principal.actor(),
                origin.clone(),
                "task",
                Some(id.to_string()),
                "delete",
                true,
                Map::new(),
            )
            .await;
        Ok(())
    }
}
