use std::collections::BTreeSet;

use crate::auth::permissions::{permissions_for, Permission, Role};
use crate::model::User;

/// The acting user with their effective capability set.
///
/// Every policy check and service call takes the actor explicitly.
#[derive(Debug, Clone)]
pub struct Actor {
    user: User,
    roles: BTreeSet<Role>,
    permissions: BTreeSet<Permission>,
}

impl Actor {
    /// Build an actor whose permissions come from the static role catalog.
    pub fn from_roles(user: User, roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        let permissions = permissions_for(&roles);
        Self {
            user,
            roles,
            permissions,
        }
    }

    /// Build an actor from an explicitly loaded permission set.
    pub fn new(
        user: User,
        roles: impl IntoIterator<Item = Role>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            user,
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Holder of the "view any tickets" override.
    pub fn sees_all_tickets(&self) -> bool {
        self.has_permission(Permission::ViewAnyTickets)
    }
}
