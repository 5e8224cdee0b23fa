//! Static permission and role catalog.
//!
//! Permission names are the persisted identifiers; they are mirrored into the
//! `permissions` and `roles` tables at startup.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HelpdeskError;

/// An atomic named capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Permission {
    ViewTickets,
    ViewAnyTickets,
    CreateTickets,
    UpdateTickets,
    DeleteTickets,
    ViewFollowups,
    CreateFollowups,
    CreateCommentFollowups,
    CreateSolutionFollowups,
    UpdateFollowups,
    DeleteFollowups,
}

impl Permission {
    pub const ALL: [Permission; 11] = [
        Permission::ViewTickets,
        Permission::ViewAnyTickets,
        Permission::CreateTickets,
        Permission::UpdateTickets,
        Permission::DeleteTickets,
        Permission::ViewFollowups,
        Permission::CreateFollowups,
        Permission::CreateCommentFollowups,
        Permission::CreateSolutionFollowups,
        Permission::UpdateFollowups,
        Permission::DeleteFollowups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewTickets => "view tickets",
            Permission::ViewAnyTickets => "view any tickets",
            Permission::CreateTickets => "create tickets",
            Permission::UpdateTickets => "update tickets",
            Permission::DeleteTickets => "delete tickets",
            Permission::ViewFollowups => "view followups",
            Permission::CreateFollowups => "create followups",
            Permission::CreateCommentFollowups => "create comment followups",
            Permission::CreateSolutionFollowups => "create solution followups",
            Permission::UpdateFollowups => "update followups",
            Permission::DeleteFollowups => "delete followups",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| HelpdeskError::InvalidArgument(format!("Unknown permission: {}", s)))
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

impl TryFrom<String> for Permission {
    type Error = HelpdeskError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::ViewTickets,
    Permission::CreateTickets,
    Permission::UpdateTickets,
    Permission::DeleteTickets,
    Permission::ViewFollowups,
    Permission::CreateFollowups,
    Permission::CreateCommentFollowups,
    Permission::CreateSolutionFollowups,
    Permission::UpdateFollowups,
    Permission::DeleteFollowups,
];

/// A named bundle of permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// The fixed permission set granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &Permission::ALL,
            Role::User => USER_PERMISSIONS,
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(HelpdeskError::InvalidArgument(format!(
                "Unknown role: {}",
                other
            ))),
        }
    }
}

/// Union of the permissions granted by a set of roles.
pub fn permissions_for<'a>(roles: impl IntoIterator<Item = &'a Role>) -> BTreeSet<Permission> {
    roles
        .into_iter()
        .flat_map(|r| r.permissions().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
        assert!("view all the things".parse::<Permission>().is_err());
    }

    #[test]
    fn test_admin_has_everything() {
        for p in Permission::ALL {
            assert!(Role::Admin.grants(p), "admin lacks {}", p);
        }
    }

    #[test]
    fn test_user_lacks_overrides() {
        assert!(!Role::User.grants(Permission::ViewAnyTickets));
        assert!(Role::User.grants(Permission::CreateSolutionFollowups));
        assert_eq!(Role::User.permissions().len(), Permission::ALL.len() - 1);
    }

    #[test]
    fn test_permissions_for_union() {
        let set = permissions_for(&[Role::User, Role::Admin]);
        assert_eq!(set.len(), Permission::ALL.len());
        assert!(permissions_for(&[]).is_empty());
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Permission::CreateCommentFollowups).unwrap();
        assert_eq!(json, "\"create comment followups\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
