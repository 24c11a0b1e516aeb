//! Role hierarchy, permission catalog and the authorization predicates.
//!
//! Every access decision in the crate goes through [`has_permission`],
//! [`can_access_role_content`] or [`can_manage_user`]. All of them take an
//! `Option<Role>` and resolve `None` to the least-privileged answer.
//!
//! Viewing is `>=` and managing is `>`: peers of equal rank can see each
//! other's material but can never mutate each other's accounts.

pub mod catalog;
pub mod role;

pub use catalog::{catalog, Catalog, CatalogError, Permission, PermissionCategory, RoleDefinition};
pub use role::Role;

/// True iff `permission_id` is in the role's assigned set
pub fn has_permission(role: Option<Role>, permission_id: &str) -> bool {
    role.and_then(|r| catalog().definition(r))
        .map(|def| def.permissions.contains(permission_id))
        .unwrap_or(false)
}

/// View check: the caller's level is at least the target's
pub fn can_access_role_content(role: Option<Role>, target: Role) -> bool {
    match role {
        Some(role) => role.level() >= target.level(),
        None => false,
    }
}

/// Manage check: the caller strictly outranks the target
pub fn can_manage_user(acting: Option<Role>, target: Role) -> bool {
    match acting {
        Some(acting) => acting.level() > target.level(),
        None => false,
    }
}

/// Roles at or below the caller, ascending. Used to build role pickers.
pub fn max_accessible_roles(role: Option<Role>) -> Vec<Role> {
    role.and_then(|r| catalog().definition(r))
        .map(|def| def.accessible_roles.iter().copied().collect())
        .unwrap_or_default()
}

/// Resolve a role's permission ids to catalog entries, in catalog order
pub fn role_permissions(role: Option<Role>) -> Vec<&'static Permission> {
    let Some(def) = role.and_then(|r| catalog().definition(r)) else {
        return Vec::new();
    };
    catalog()
        .permissions()
        .iter()
        .filter(|p| def.permissions.contains(p.id))
        .collect()
}
