use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    Clients,
    Leads,
    Tasks,
    Interactions,
    Inquiries,
    Users,
    Audit,
    Settings,
    System,
}

/// Immutable catalog entry. Ids are stable, dot-namespaced keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permission {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: PermissionCategory,
}

const fn perm(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: PermissionCategory,
) -> Permission {
    Permission { id, name, description, category }
}

use PermissionCategory as C;

pub const PERMISSIONS: &[Permission] = &[
    perm("crm.clients.view", "View Clients", "View clients assigned to you", C::Clients),
    perm("crm.clients.view_all", "View All Clients", "View every client regardless of assignee", C::Clients),
    perm("crm.clients.create", "Create Clients", "Add new client records", C::Clients),
    perm("crm.clients.edit", "Edit Clients", "Update client details and status", C::Clients),
    perm("crm.clients.delete", "Delete Clients", "Permanently remove client records", C::Clients),
    perm("crm.leads.view", "View Leads", "View lead pipeline", C::Leads),
    perm("crm.leads.create", "Create Leads", "Add new leads", C::Leads),
    perm("crm.leads.edit", "Edit Leads", "Update lead qualification and stage", C::Leads),
    perm("crm.leads.delete", "Delete Leads", "Remove leads from the pipeline", C::Leads),
    perm("crm.tasks.view", "View Tasks", "View tasks", C::Tasks),
    perm("crm.tasks.create", "Create Tasks", "Create tasks", C::Tasks),
    perm("crm.tasks.edit", "Edit Tasks", "Update task details and progress", C::Tasks),
    perm("crm.tasks.assign", "Assign Tasks", "Assign tasks to other staff", C::Tasks),
    perm("crm.tasks.delete", "Delete Tasks", "Remove tasks", C::Tasks),
    perm("crm.interactions.view", "View Interactions", "View client interaction history", C::Interactions),
    perm("crm.interactions.create", "Log Interactions", "Record calls, emails and meetings", C::Interactions),
    perm("crm.inquiries.view", "View Inquiries", "Read inbound website inquiries", C::Inquiries),
    perm("crm.inquiries.manage", "Manage Inquiries", "Triage and close inbound inquiries", C::Inquiries),
    perm("admin.users.view", "View Users", "List staff accounts", C::Users),
    perm("admin.users.manage", "Manage Users", "Provision, deactivate and reactivate staff accounts", C::Users),
    perm("admin.users.roles", "Change Roles", "Change the role of lower-ranked staff", C::Users),
    perm("admin.audit.view", "View Audit Log", "Read audit entries and security reports", C::Audit),
    perm("admin.settings.manage", "Manage Settings", "Change site and CRM settings", C::Settings),
    perm("system.billing.manage", "Manage Billing", "Manage subscription and billing", C::System),
    perm("system.ownership.transfer", "Transfer Ownership", "Transfer business ownership", C::System),
];

const AGENT_PERMISSIONS: &[&str] = &[
    "crm.clients.view",
    "crm.clients.create",
    "crm.clients.edit",
    "crm.leads.view",
    "crm.leads.create",
    "crm.leads.edit",
    "crm.tasks.view",
    "crm.tasks.create",
    "crm.tasks.edit",
    "crm.interactions.view",
    "crm.interactions.create",
    "crm.inquiries.view",
];

const MANAGER_EXTRA: &[&str] = &[
    "crm.clients.view_all",
    "crm.clients.delete",
    "crm.leads.delete",
    "crm.tasks.assign",
    "crm.tasks.delete",
    "crm.inquiries.manage",
    "admin.users.view",
];

const ADMIN_EXTRA: &[&str] = &[
    "admin.users.manage",
    "admin.users.roles",
    "admin.audit.view",
    "admin.settings.manage",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("hierarchy levels are not strictly increasing at role '{0}'")]
    LevelOrder(Role),

    #[error("role '{role}' references unknown permission '{permission}'")]
    UnknownPermission { role: Role, permission: String },

    #[error("role '{0}' has no definition")]
    MissingRole(Role),

    #[error("role '{0}' accessible roles are not exactly itself and all lower roles")]
    AccessibleRoles(Role),

    #[error("role '{role}' lacks permission '{permission}' held by lower role '{lower}'")]
    NotMonotonic { role: Role, lower: Role, permission: String },

    #[error("owner is missing catalog permission '{0}'")]
    OwnerIncomplete(String),

    #[error("duplicate permission id '{0}'")]
    DuplicatePermission(String),
}

/// Permission set and accessible roles attached to one role
#[derive(Debug, Clone)]
pub struct RoleDefinition {
    pub role: Role,
    pub level: u8,
    pub permissions: BTreeSet<&'static str>,
    pub accessible_roles: BTreeSet<Role>,
}

/// Deploy-time catalog: every permission plus each role's assignment.
#[derive(Debug, Clone)]
pub struct Catalog {
    permissions: Vec<Permission>,
    roles: BTreeMap<Role, RoleDefinition>,
}

impl Catalog {
    pub fn new(permissions: Vec<Permission>, definitions: Vec<RoleDefinition>) -> Self {
        let roles = definitions.into_iter().map(|d| (d.role, d)).collect();
        Self { permissions, roles }
    }

    /// The shipped catalog
    pub fn standard() -> Self {
        let agent: BTreeSet<&'static str> = AGENT_PERMISSIONS.iter().copied().collect();
        let manager: BTreeSet<&'static str> =
            agent.iter().copied().chain(MANAGER_EXTRA.iter().copied()).collect();
        let admin: BTreeSet<&'static str> =
            manager.iter().copied().chain(ADMIN_EXTRA.iter().copied()).collect();
        let owner: BTreeSet<&'static str> = PERMISSIONS.iter().map(|p| p.id).collect();

        let definitions = [
            (Role::Agent, agent),
            (Role::Manager, manager),
            (Role::Admin, admin),
            (Role::Owner, owner),
        ]
        .into_iter()
        .map(|(role, permissions)| RoleDefinition {
            role,
            level: role.level(),
            permissions,
            accessible_roles: Role::ALL.iter().copied().filter(|r| r.level() <= role.level()).collect(),
        })
        .collect();

        Self::new(PERMISSIONS.to_vec(), definitions)
    }

    pub fn definition(&self, role: Role) -> Option<&RoleDefinition> {
        self.roles.get(&role)
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn permission(&self, id: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == id)
    }

    pub fn permissions_by_category(&self) -> BTreeMap<PermissionCategory, Vec<&Permission>> {
        let mut grouped: BTreeMap<PermissionCategory, Vec<&Permission>> = BTreeMap::new();
        for permission in &self.permissions {
            grouped.entry(permission.category).or_default().push(permission);
        }
        grouped
    }

    /// Check the hierarchy invariants the permission data does not enforce
    /// structurally. Run once at startup; the server refuses to boot on error.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = BTreeSet::new();
        for permission in &self.permissions {
            if !seen.insert(permission.id) {
                return Err(CatalogError::DuplicatePermission(permission.id.to_string()));
            }
        }

        let mut previous: Option<&RoleDefinition> = None;
        for role in Role::ALL {
            let def = self.roles.get(&role).ok_or(CatalogError::MissingRole(role))?;

            if let Some(lower) = previous {
                if def.level <= lower.level {
                    return Err(CatalogError::LevelOrder(role));
                }
                if let Some(missing) = lower.permissions.difference(&def.permissions).next() {
                    return Err(CatalogError::NotMonotonic {
                        role,
                        lower: lower.role,
                        permission: missing.to_string(),
                    });
                }
            }

            for id in &def.permissions {
                if !seen.contains(id) {
                    return Err(CatalogError::UnknownPermission {
                        role,
                        permission: id.to_string(),
                    });
                }
            }

            let expected: BTreeSet<Role> =
                Role::ALL.iter().copied().filter(|r| r.level() <= def.level).collect();
            if def.accessible_roles != expected {
                return Err(CatalogError::AccessibleRoles(role));
            }

            previous = Some(def);
        }

        if let Some(owner) = self.roles.get(&Role::Owner) {
            if let Some(missing) = seen.iter().find(|id| !owner.permissions.contains(*id)) {
                return Err(CatalogError::OwnerIncomplete(missing.to_string()));
            }
        }

        Ok(())
    }
}

pub static CATALOG: Lazy<Catalog> = Lazy::new(Catalog::standard);

pub fn catalog() -> &'static Catalog {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_valid() {
        assert_eq!(Catalog::standard().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_monotonic_permissions() {
        let mut catalog = Catalog::standard();
        if let Some(manager) = catalog.roles.get_mut(&Role::Manager) {
            manager.permissions.remove("crm.clients.edit");
        }
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::NotMonotonic { role: Role::Manager, lower: Role::Agent, .. })
        ));
    }

    #[test]
    fn rejects_unknown_permission_ids() {
        let mut catalog = Catalog::standard();
        if let Some(agent) = catalog.roles.get_mut(&Role::Agent) {
            agent.permissions.insert("crm.clients.teleport");
        }
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::UnknownPermission { role: Role::Agent, .. })
        ));
    }

    #[test]
    fn rejects_upward_accessible_roles() {
        let mut catalog = Catalog::standard();
        if let Some(agent) = catalog.roles.get_mut(&Role::Agent) {
            agent.accessible_roles.insert(Role::Admin);
        }
        assert_eq!(catalog.validate(), Err(CatalogError::AccessibleRoles(Role::Agent)));
    }

    #[test]
    fn groups_by_category() {
        let grouped = catalog().permissions_by_category();
        assert_eq!(grouped[&PermissionCategory::Audit].len(), 1);
        assert_eq!(grouped[&PermissionCategory::Clients].len(), 5);
    }
}
