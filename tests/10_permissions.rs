use proptest::prelude::*;

use agency_crm::permissions::{
    can_access_role_content, can_manage_user, catalog, has_permission, max_accessible_roles, role_permissions, Role,
};

fn any_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn any_permission() -> impl Strategy<Value = &'static str> {
    prop::sample::select(catalog().permissions().iter().map(|p| p.id).collect::<Vec<_>>())
}

#[test]
fn shipped_catalog_is_consistent() {
    catalog().validate().expect("catalog validates");
}

#[test]
fn anonymous_callers_hold_nothing() {
    for permission in catalog().permissions() {
        assert!(!has_permission(None, permission.id));
    }
    assert!(max_accessible_roles(None).is_empty());
    assert!(role_permissions(None).is_empty());
    assert!(!can_access_role_content(None, Role::Agent));
    assert!(!can_manage_user(None, Role::Agent));
}

#[test]
fn owner_holds_every_permission() {
    let held = role_permissions(Some(Role::Owner));
    assert_eq!(held.len(), catalog().permissions().len());
}

#[test]
fn unknown_permission_is_denied_even_to_owner() {
    assert!(!has_permission(Some(Role::Owner), "crm.clients.teleport"));
}

#[test]
fn shipped_role_boundaries() {
    assert!(has_permission(Some(Role::Agent), "crm.clients.create"));
    assert!(!has_permission(Some(Role::Agent), "crm.clients.delete"));
    assert!(has_permission(Some(Role::Manager), "crm.clients.delete"));
    assert!(!has_permission(Some(Role::Manager), "admin.audit.view"));
    assert!(has_permission(Some(Role::Admin), "admin.audit.view"));
    assert!(!has_permission(Some(Role::Admin), "system.billing.manage"));
    assert!(has_permission(Some(Role::Owner), "system.ownership.transfer"));
}

proptest! {
    #[test]
    fn permissions_are_monotonic_in_rank(lower in any_role(), higher in any_role(), permission in any_permission()) {
        prop_assume!(lower.level() <= higher.level());
        if has_permission(Some(lower), permission) {
            prop_assert!(has_permission(Some(higher), permission));
        }
    }

    #[test]
    fn content_access_follows_levels(acting in any_role(), target in any_role()) {
        prop_assert_eq!(can_access_role_content(Some(acting), target), acting.level() >= target.level());
    }

    #[test]
    fn management_requires_strictly_higher_rank(acting in any_role(), target in any_role()) {
        let allowed = can_manage_user(Some(acting), target);
        prop_assert_eq!(allowed, acting.level() > target.level());
        // Nobody manages a peer, including themselves
        prop_assert!(!can_manage_user(Some(acting), acting));
    }

    #[test]
    fn accessible_roles_are_self_and_below(role in any_role()) {
        let accessible = max_accessible_roles(Some(role));
        prop_assert!(accessible.contains(&role));
        for other in Role::ALL {
            prop_assert_eq!(accessible.contains(&other), other.level() <= role.level());
        }
    }

    #[test]
    fn role_names_round_trip(role in any_role()) {
        prop_assert_eq!(Role::parse(role.as_str()), Some(role));
    }
}
