use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{apply_patch, timestamp, ServiceContext, ServiceError};
use crate::audit::{AuditActor, AuditEventType, RequestOrigin};
use crate::auth::Principal;
use crate::database::store::INQUIRIES;
use crate::database::DocumentQuery;
use crate::permissions::has_permission;
use crate::rate_limit::OperationClass;
use crate::validation::schema::{check_format, Format, INQUIRY_STATUSES};
use crate::validation::{EntityKind, ValidationErrors};

const VIEW: &str = "crm.inquiries.view";
const MANAGE: &str = "crm.inquiries.manage";

/// Website contact-form submissions
#[derive(Clone)]
pub struct InquiryService {
    ctx: ServiceContext,
}

impl InquiryService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Anonymous submission, limited per client IP
    pub async fn submit(&self, origin: &RequestOrigin, input: &Value) -> Result<Value, ServiceError> {
        let key = origin.ip.as_deref().unwrap_or("unknown");
        self.ctx
            .throttle(OperationClass::InquirySubmission, key, AuditActor::default(), origin)
            .await?;
        let mut data = self.ctx.validated(EntityKind::Inquiry, input, AuditActor::default(), origin).await?;

        let id = Uuid::new_v4().to_string();
        data.insert("id".into(), json!(id));
        data.insert("status".into(), json!("new"));
        data.insert("created_at".into(), timestamp());
        data.insert("updated_at".into(), timestamp());

        let doc = Value::Object(data);
        self.ctx.store.put(INQUIRIES, &id, doc.clone()).await?;

        self.ctx
            .audit
            .log_data_access(
                AuditEventType::InquirySubmitted,
                AuditActor::default(),
                origin.clone(),
                "inquiry",
                Some(id),
                "submit",
                true,
                Map::new(),
            )
            .await;
        Ok(doc)
    }

    pub async fn list(&self, principal: &Principal, origin: &RequestOrigin, status: Option<&str>) -> Result<Vec<Value>, ServiceError> {
        self.ctx
            .authorize(principal, origin, "inquiry", None, "list", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;
        let mut query = DocumentQuery::new();
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        Ok(self.ctx.store.query(INQUIRIES, &query).await?)
    }

    pub async fn update_status(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        status: &str,
    ) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "inquiry", Some(id), "update_status", has_permission(Some(principal.role), MANAGE), MANAGE)
            .await?;
        check_format(Format::OneOf(INQUIRY_STATUSES), status).map_err(|msg| ValidationErrors::single("status", msg))?;

        let mut inquiry = self.ctx.load(INQUIRIES, id, "inquiry").await?;
        let previous = inquiry.get("status").cloned().unwrap_or(Value::Null);

        let mut patch = Map::new();
        patch.insert("status".into(), json!(status));
        apply_patch(&mut inquiry, patch);
        self.ctx.store.put(INQUIRIES, id, inquiry.clone()).await?;

        let mut details = Map::new();
        details.insert("old_value".into(), previous);
        details.insert("new_value".into(), json!(status));
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::InquiryUpdated,
                principal.actor(),
                origin.clone(),
                "inquiry",
                Some(id.to_string()),
                "update_status",
                true,
                details,
            )
            .await;
        Ok(inquiry)
    }
}
