use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::client::can_view_client;
use super::{timestamp, ServiceContext, ServiceError};
use crate::audit::{AuditEventType, RequestOrigin};
use crate::auth::Principal;
use crate::database::store::{CLIENTS, INTERACTIONS};
use crate::database::DocumentQuery;
use crate::permissions::has_permission;
use crate::validation::EntityKind;

const VIEW: &str = "crm.interactions.view";
const CREATE: &str = "crm.interactions.create";

/// Calls, emails, meetings and notes recorded against a client
#[derive(Clone)]
pub struct InteractionService {
    ctx: ServiceContext,
}

impl InteractionService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    async fn visible_client(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        client_id: &str,
        action: &str,
    ) -> Result<Value, ServiceError> {
        let client = self.ctx.load(CLIENTS, client_id, "client").await?;
        self.ctx
            .authorize(principal, origin, "client", Some(client_id), action, can_view_client(principal, &client), "crm.clients.view_all")
            .await?;
        Ok(client)
    }

    pub async fn log(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        client_id: &str,
        input: &Value,
    ) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "interaction", None, "create", has_permission(Some(principal.role), CREATE), CREATE)
            .await?;
        self.visible_client(principal, origin, client_id, "log_interaction").await?;
        let mut data = self.ctx.validated(EntityKind::Interaction, input, principal.actor(), origin).await?;

        let id = Uuid::new_v4().to_string();
        data.insert("id".into(), json!(id));
        data.insert("client_id".into(), json!(client_id));
        data.insert("logged_by".into(), json!(principal.user_id));
        data.insert("created_at".into(), timestamp());

        let doc = Value::Object(data);
        self.ctx.store.put(INTERACTIONS, &id, doc.clone()).await?;

        let mut details = Map::new();
        details.insert("client_id".into(), json!(client_id));
        details.insert("kind".into(), doc["kind"].clone());
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::InteractionLogged,
                principal.actor(),
                origin.clone(),
                "interaction",
                Some(id),
                "create",
                true,
                details,
            )
            .await;
        Ok(doc)
    }

    pub async fn list_for_client(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        client_id: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        self.ctx
            .authorize(principal, origin, "interaction", None, "list", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;
        self.visible_client(principal, origin, client_id, "list_interactions").await?;
        let query = DocumentQuery::new().eq("client_id", client_id);
        Ok(self.ctx.store.query(INTERACTIONS, &query).await?)
    }
}
