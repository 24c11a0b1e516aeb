use serde::{Deserialize, Serialize};
use std::fmt;

/// Staff roles, ordered from least to most privileged.
///
/// The derived `Ord` follows declaration order, which matches [`Role::level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Manager,
    Admin,
    Owner,
}

impl Role {
    /// Every role in ascending hierarchy order
    pub const ALL: [Role; 4] = [Role::Agent, Role::Manager, Role::Admin, Role::Owner];

    /// Hierarchy level. Strictly increasing across `ALL`, no ties.
    pub fn level(&self) -> u8 {
        match self {
            Role::Agent => 1,
            Role::Manager => 2,
            Role::Admin => 3,
            Role::Owner => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Human label for role pickers
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Agent => "Sales Agent",
            Role::Manager => "Manager",
            Role::Admin => "Administrator",
            Role::Owner => "Owner",
        }
    }

    /// Parse a role name. Unknown names resolve to `None`, which every
    /// authorization predicate treats as "no privileges".
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agent" => Some(Role::Agent),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }

    /// True iff this role strictly outranks `other`
    pub fn outranks(&self, other: Role) -> bool {
        self.level() > other.level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_strictly_increase() {
        for pair in Role::ALL.windows(2) {
            assert!(pair[0].level() < pair[1].level());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" owner "), Some(Role::Owner));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
    }
}
