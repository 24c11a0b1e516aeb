use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{apply_patch, str_field, timestamp, ServiceContext, ServiceError};
use crate::audit::{AuditEventType, NewAuditEntry, RequestOrigin, Severity};
use crate::auth::Principal;
use crate::database::store::USERS;
use crate::database::DocumentQuery;
use crate::permissions::{can_access_role_content, can_manage_user, has_permission, max_accessible_roles, Role};
use crate::validation::{EntityKind, ValidationErrors};

const VIEW: &str = "admin.users.view";
const MANAGE: &str = "admin.users.manage";
const ROLES: &str = "admin.users.roles";

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStanding {
    Unknown,
    Deactivated,
    /// Active, holding the stored role
    Active(Option<Role>),
}

/// Staff accounts. Management authority is strictly downward.
#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

fn role_of(user: &Value) -> Option<Role> {
    str_field(user, "role").and_then(Role::parse)
}

fn parse_role(value: Option<&Value>) -> Result<Role, ServiceError> {
    value
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .ok_or_else(|| ValidationErrors::single("role", "Must be one of: agent, manager, admin, owner").into())
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Roles the caller may grant or revoke
    pub fn assignable_roles(&self, principal: &Principal) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| can_manage_user(Some(principal.role), *role))
            .collect()
    }

    pub async fn provision(&self, principal: &Principal, origin: &RequestOrigin, input: &Value) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "user", None, "provision", has_permission(Some(principal.role), MANAGE), MANAGE)
            .await?;
        let mut data = self.ctx.validated(EntityKind::UserProfile, input, principal.actor(), origin).await?;
        let role = parse_role(input.get("role"))?;
        self.ctx
            .authorize(principal, origin, "user", None, "provision", can_manage_user(Some(principal.role), role), role.as_str())
            .await?;

        let email = data.get("email").and_then(Value::as_str).unwrap_or_default().to_string();
        let existing = self.ctx.store.query(USERS, &DocumentQuery::new().eq("email", email.clone()).limit(1)).await?;
        if !existing.is_empty() {
            return Err(ServiceError::Conflict(format!("a user with email {} already exists", email)));
        }

        let id = Uuid::new_v4().to_string();
        data.insert("id".into(), json!(id));
        data.insert("role".into(), json!(role));
        data.insert("status".into(), json!(STATUS_ACTIVE));
        data.insert("created_by".into(), json!(principal.user_id));
        data.insert("created_at".into(), timestamp());
        data.insert("updated_at".into(), timestamp());

        let doc = Value::Object(data);
        self.ctx.store.put(USERS, &id, doc.clone()).await?;

        self.ctx
            .audit
            .log(
                NewAuditEntry::new(AuditEventType::UserCreated, Severity::Medium, "provision")
                    .actor(principal.actor())
                    .origin(origin.clone())
                    .resource("user", Some(id))
                    .detail("role", role.as_str()),
            )
            .await;
        Ok(doc)
    }

    /// Self, or anyone holding `admin.users.view` whose content scope covers the user's role
    pub async fn get(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<Value, ServiceError> {
        let user = self.ctx.load(USERS, id, "user").await?;
        if id == principal.user_id {
            return Ok(user);
        }

        let allowed = has_permission(Some(principal.role), VIEW)
            && role_of(&user).map_or(false, |role| can_access_role_content(Some(principal.role), role));
        self.ctx.authorize(principal, origin, "user", Some(id), "view", allowed, VIEW).await?;
        Ok(user)
    }

    /// Users whose role lies within the caller's accessible roles
    pub async fn list(&self, principal: &Principal, origin: &RequestOrigin) -> Result<Vec<Value>, ServiceError> {
        self.ctx
            .authorize(principal, origin, "user", None, "list", has_permission(Some(principal.role), VIEW), VIEW)
            .await?;
        let accessible = max_accessible_roles(Some(principal.role));
        let users = self.ctx.store.query(USERS, &DocumentQuery::new()).await?;
        Ok(users
            .into_iter()
            .filter(|user| role_of(user).map_or(false, |role| accessible.contains(&role)))
            .collect())
    }

    /// The caller must be able to manage both the current and the requested role
    pub async fn change_role(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        new_role: Role,
    ) -> Result<Value, ServiceError> {
        self.ctx
            .authorize(principal, origin, "user", Some(id), "change_role", has_permission(Some(principal.role), ROLES), ROLES)
            .await?;
        let mut user = self.ctx.load(USERS, id, "user").await?;
        let current = role_of(&user);

        let allowed = current.map_or(false, |role| can_manage_user(Some(principal.role), role))
            && can_manage_user(Some(principal.role), new_role);
        self.ctx
            .authorize(principal, origin, "user", Some(id), "change_role", allowed, new_role.as_str())
            .await?;
        if current == Some(new_role) {
            return Ok(user);
        }

        let mut patch = Map::new();
        patch.insert("role".into(), json!(new_role));
        apply_patch(&mut user, patch);
        self.ctx.store.put(USERS, id, user.clone()).await?;

        self.ctx
            .audit
            .log_permission_change(
                principal.actor(),
                origin.clone(),
                id,
                json!(current),
                json!(new_role),
                "change_role",
            )
            .await;
        Ok(user)
    }

    pub async fn deactivate(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<Value, ServiceError> {
        self.set_status(principal, origin, id, STATUS_INACTIVE, AuditEventType::UserDeactivated).await
    }

    pub async fn reactivate(&self, principal: &Principal, origin: &RequestOrigin, id: &str) -> Result<Value, ServiceError> {
        self.set_status(principal, origin, id, STATUS_ACTIVE, AuditEventType::UserReactivated).await
    }

    async fn set_status(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        status: &str,
        event: AuditEventType,
    ) -> Result<Value, ServiceError> {
        let action = event.as_str().to_lowercase();
        self.ctx
            .authorize(principal, origin, "user", Some(id), &action, has_permission(Some(principal.role), MANAGE), MANAGE)
            .await?;
        let mut user = self.ctx.load(USERS, id, "user").await?;
        let allowed = role_of(&user).map_or(false, |role| can_manage_user(Some(principal.role), role));
        self.ctx
            .authorize(principal, origin, "user", Some(id), &action, allowed, "higher role than target")
            .await?;

        let previous = user.get("status").cloned().unwrap_or(Value::Null);
        let mut patch = Map::new();
        patch.insert("status".into(), json!(status));
        apply_patch(&mut user, patch);
        self.ctx.store.put(USERS, id, user.clone()).await?;

        self.ctx
            .audit
            .log(
                NewAuditEntry::new(event, Severity::Medium, action)
                    .actor(principal.actor())
                    .origin(origin.clone())
                    .resource("user", Some(id.to_string()))
                    .detail("old_value", previous)
                    .detail("new_value", status),
            )
            .await;
        Ok(user)
    }

    /// Profile fields only; role and status are never touched here
    pub async fn update_profile(
        &self,
        principal: &Principal,
        origin: &RequestOrigin,
        id: &str,
        input: &Value,
    ) -> Result<Value, ServiceError> {
        let mut user = self.ctx.load(USERS, id, "user").await?;
        if id != principal.user_id {
            let allowed = has_permission(Some(principal.role), MANAGE)
                && role_of(&user).map_or(false, |role| can_manage_user(Some(principal.role), role));
            self.ctx
                .authorize(principal, origin, "user", Some(id), "update_profile", allowed, MANAGE)
                .await?;
        }

        let patch = self.ctx.validated_patch(EntityKind::UserProfile, input, principal.actor(), origin).await?;
        let fields: Vec<String> = patch.keys().cloned().collect();
        apply_patch(&mut user, patch);
        self.ctx.store.put(USERS, id, user.clone()).await?;

        let mut details = Map::new();
        details.insert("fields".into(), json!(fields));
        self.ctx
            .audit
            .log_data_access(
                AuditEventType::DataAccess,
                principal.actor(),
                origin.clone(),
                "user",
                Some(id.to_string()),
                "update_profile",
                true,
                details,
            )
            .await;
        Ok(user)
    }

    /// Whether a stored account has been deactivated; unknown ids are not
    /// How the stored account stands for authentication. Ids with no user document are
    /// `Unknown`; tokens for them are taken at face value.
    pub async fn standing(&self, id: &str) -> Result<AccountStanding, ServiceError> {
        let standing = match self.ctx.store.get(USERS, id).await? {
            None => AccountStanding::Unknown,
            Some(user) if str_field(&user, "status") == Some(STATUS_INACTIVE) => AccountStanding::Deactivated,
            Some(user) => AccountStanding::Active(role_of(&user)),
        };
        Ok(standing)
    }

    pub async fn is_deactivated(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.standing(id).await? == AccountStanding::Deactivated)
    }
}
