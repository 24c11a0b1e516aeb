use axum::http::Method;
use std::collections::HashMap;

use crate::auth::Principal;
use crate::permissions::{has_permission, Role};
use crate::rate_limit::OperationClass;

/// Path parameters captured while matching a route pattern
pub type RouteParams = HashMap<String, String>;

/// Resource-level check evaluated after role and permission checks
pub type Predicate = fn(&Principal, &RouteParams) -> bool;

/// What a route demands of a request before the handler runs
#[derive(Clone, Copy)]
pub struct RoutePolicy {
    pub require_auth: bool,
    pub min_role: Option<Role>,
    pub permission: Option<&'static str>,
    pub rate_class: OperationClass,
    pub csrf: bool,
    pub predicate: Option<(&'static str, Predicate)>,
}

impl std::fmt::Debug for RoutePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePolicy")
            .field("require_auth", &self.require_auth)
            .field("min_role", &self.min_role)
            .field("permission", &self.permission)
            .field("rate_class", &self.rate_class)
            .field("csrf", &self.csrf)
            .field("predicate", &self.predicate.map(|(name, _)| name))
            .finish()
    }
}

impl RoutePolicy {
    /// No token needed, no CSRF
    pub const fn public() -> Self {
        Self {
            require_auth: false,
            min_role: None,
            permission: None,
            rate_class: OperationClass::General,
            csrf: false,
            predicate: None,
        }
    }

    /// Any valid token; CSRF on state-changing methods
    pub const fn authenticated() -> Self {
        Self {
            require_auth: true,
            csrf: true,
            ..Self::public()
        }
    }

    pub const fn min_role(mut self, role: Role) -> Self {
        self.min_role = Some(role);
        self
    }

    pub const fn permission(mut self, permission: &'static str) -> Self {
        self.permission = Some(permission);
        self
    }

    pub const fn rate(mut self, class: OperationClass) -> Self {
        self.rate_class = class;
        self
    }

    pub const fn predicate(mut self, name: &'static str, check: Predicate) -> Self {
        self.predicate = Some((name, check));
        self
    }

    pub fn has_requirements(&self) -> bool {
        self.min_role.is_some() || self.permission.is_some() || self.predicate.is_some()
    }
}

#[derive(Debug, Clone)]
struct PolicyRule {
    method: Method,
    pattern: &'static str,
    policy: RoutePolicy,
}

/// A request resolved against the table
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Pattern of the matched rule, or the raw path when nothing matched
    pub route: String,
    pub params: RouteParams,
    pub policy: RoutePolicy,
}

/// Method + path pattern → policy. Patterns use `:name` segments like the router.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    rules: Vec<PolicyRule>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, method: Method, pattern: &'static str, policy: RoutePolicy) -> Self {
        self.rules.push(PolicyRule { method, pattern, policy });
        self
    }

    /// Unknown `/api` paths still require authentication; everything else is public.
    /// OPTIONS resolves to whichever rule shares the path so preflight is keyed per route.
    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch {
        let exact = self.rules.iter().find_map(|rule| {
            (rule.method == *method)
                .then(|| match_pattern(rule.pattern, path).map(|params| (rule, params)))
                .flatten()
        });
        let found = exact.or_else(|| {
            (*method == Method::OPTIONS)
                .then(|| {
                    self.rules
                        .iter()
                        .find_map(|rule| match_pattern(rule.pattern, path).map(|params| (rule, params)))
                })
                .flatten()
        });

        match found {
            Some((rule, params)) => RouteMatch {
                route: rule.pattern.to_string(),
                params,
                policy: rule.policy,
            },
            None => RouteMatch {
                route: path.to_string(),
                params: RouteParams::new(),
                policy: if path.starts_with("/api/") {
                    RoutePolicy::authenticated()
                } else {
                    RoutePolicy::public()
                },
            },
        }
    }

    /// Policies for every route the application serves
    pub fn standard() -> Self {
        use OperationClass::Sensitive;
        let auth = RoutePolicy::authenticated;

        Self::new()
            .rule(Method::GET, "/", RoutePolicy::public())
            .rule(Method::GET, "/health", RoutePolicy::public())
            .rule(Method::POST, "/api/inquiries", RoutePolicy::public())
            // Session
            .rule(Method::GET, "/api/auth/whoami", auth())
            .rule(Method::GET, "/api/auth/csrf", auth())
            .rule(Method::GET, "/api/auth/roles", auth())
            // Clients
            .rule(Method::GET, "/api/clients", auth().permission("crm.clients.view"))
            .rule(Method::POST, "/api/clients", auth().permission("crm.clients.create"))
            .rule(Method::GET, "/api/clients/:id", auth().permission("crm.clients.view"))
            .rule(Method::PATCH, "/api/clients/:id", auth().permission("crm.clients.edit"))
            .rule(
                Method::DELETE,
                "/api/clients/:id",
                auth().min_role(Role::Manager).permission("crm.clients.delete"),
            )
            .rule(Method::GET, "/api/clients/:id/interactions", auth().permission("crm.interactions.view"))
            .rule(Method::POST, "/api/clients/:id/interactions", auth().permission("crm.interactions.create"))
            // Tasks
            .rule(Method::GET, "/api/tasks", auth().permission("crm.tasks.view"))
            .rule(Method::POST, "/api/tasks", auth().permission("crm.tasks.create"))
            .rule(Method::GET, "/api/tasks/:id", auth().permission("crm.tasks.view"))
            .rule(Method::PATCH, "/api/tasks/:id", auth().permission("crm.tasks.edit"))
            .rule(Method::DELETE, "/api/tasks/:id", auth().permission("crm.tasks.delete"))
            .rule(Method::POST, "/api/tasks/:id/assign", auth().permission("crm.tasks.assign"))
            // Inquiries (submission is anonymous, above)
            .rule(
                Method::GET,
                "/api/inquiries",
                auth().min_role(Role::Manager).permission("crm.inquiries.view"),
            )
            .rule(
                Method::PATCH,
                "/api/inquiries/:id/status",
                auth().min_role(Role::Manager).permission("crm.inquiries.manage"),
            )
            // Users
            .rule(Method::GET, "/api/users", auth().permission("admin.users.view").rate(Sensitive))
            .rule(
                Method::POST,
                "/api/users",
                auth().min_role(Role::Admin).permission("admin.users.manage").rate(Sensitive),
            )
            .rule(Method::GET, "/api/users/:id", auth().rate(Sensitive))
            .rule(
                Method::PATCH,
                "/api/users/:id",
                auth().predicate("self_or_user_manager", self_or_user_manager).rate(Sensitive),
            )
            .rule(
                Method::PUT,
                "/api/users/:id/role",
                auth().min_role(Role::Admin).permission("admin.users.roles").rate(Sensitive),
            )
            .rule(
                Method::POST,
                "/api/users/:id/deactivate",
                auth().min_role(Role::Admin).permission("admin.users.manage").rate(Sensitive),
            )
            .rule(
                Method::POST,
                "/api/users/:id/reactivate",
                auth().min_role(Role::Admin).permission("admin.users.manage").rate(Sensitive),
            )
            // Audit
            .rule(Method::GET, "/api/audit/logs", auth().permission("admin.audit.view").rate(Sensitive))
            .rule(Method::GET, "/api/audit/alerts", auth().permission("admin.audit.view").rate(Sensitive))
            .rule(Method::GET, "/api/audit/report", auth().permission("admin.audit.view").rate(Sensitive))
            .rule(
                Method::GET,
                "/api/audit/activity/:actor",
                auth().permission("admin.audit.view").rate(Sensitive),
            )
    }
}

/// Editing your own profile, or holding user management rights
fn self_or_user_manager(principal: &Principal, params: &RouteParams) -> bool {
    params.get("id").map(String::as_str) == Some(principal.user_id.as_str())
        || has_permission(Some(principal.role), "admin.users.manage")
}

fn match_pattern(pattern: &str, path: &str) -> Option<RouteParams> {
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    let mut pattern_parts = pattern.split('/');
    let mut path_parts = path.split('/');
    let mut params = RouteParams::new();

    loop {
        match (pattern_parts.next(), path_parts.next()) {
            (None, None) => return Some(params),
            (Some(expected), Some(actual)) => {
                if let Some(name) = expected.strip_prefix(':') {
                    if actual.is_empty() {
                        return None;
                    }
                    params.insert(name.to_string(), actual.to_string());
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}
