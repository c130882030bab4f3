use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role held by a user within its organization. Exactly one per user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Owns the organization; full control.
    Owner,
    /// Manages users and settings.
    Admin,
    /// Runs operations and reads reports.
    Manager,
    /// Day-to-day work: logs, diagnoses, stock movements.
    Operator,
    /// Read-only.
    Viewer,
    /// Support staff with access across organizations.
    SuperAdmin,
}

impl Role {
    pub const COUNT: usize = 6;

    pub const ALL: [Role; Role::COUNT] = [
        Role::Owner,
        Role::Admin,
        Role::Manager,
        Role::Operator,
        Role::Viewer,
        Role::SuperAdmin,
    ];

    /// Row of this role in the permission matrix.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Operator => "OPERATOR",
            Role::Viewer => "VIEWER",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Privilege level; higher means more privileged.
    pub fn privilege(self) -> u8 {
        match self {
            Role::SuperAdmin => 5,
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Manager => 2,
            Role::Operator => 1,
            Role::Viewer => 0,
        }
    }

    pub fn is_super_admin(self) -> bool {
        self == Role::SuperAdmin
    }

    pub fn is_owner_or_admin(self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::SuperAdmin)
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.privilege().cmp(&other.privilege())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_order_is_total() {
        let mut roles = Role::ALL.to_vec();
        roles.sort();
        assert_eq!(
            roles,
            vec![
                Role::Viewer,
                Role::Operator,
                Role::Manager,
                Role::Admin,
                Role::Owner,
                Role::SuperAdmin,
            ]
        );
    }

    #[test]
    fn parses_canonical_names_only() {
        assert_eq!("SUPER_ADMIN".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("owner".parse::<Role>().is_err());
        assert!("ROOT".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_canonical_names() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"SUPER_ADMIN\"");
        let role: Role = serde_json::from_str("\"OPERATOR\"").unwrap();
        assert_eq!(role, Role::Operator);
    }
}
