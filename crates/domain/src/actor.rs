use std::collections::BTreeSet;

use cohort_core::{RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::Permission;

/// The role a user is currently "wearing".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRole {
    /// Role identifier.
    pub role_id: RoleId,
    /// Role machine name.
    pub name: String,
    /// Presentation name.
    pub display_name: String,
}

/// Resolved request identity attached by the authentication gate.
///
/// Holds the live role memberships and the permission set scoped to the
/// user's current active role. The checks below are pure set lookups over
/// that snapshot; resolution against storage happens once per request in
/// the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    user_id: UserId,
    display_name: String,
    email: Option<String>,
    role_names: Vec<String>,
    active_role: Option<ActiveRole>,
    permissions: BTreeSet<Permission>,
}

impl ActorContext {
    /// Creates an actor context from resolved authentication data.
    #[must_use]
    pub fn new(
        user_id: UserId,
        display_name: impl Into<String>,
        email: Option<String>,
        role_names: Vec<String>,
        active_role: Option<ActiveRole>,
        permissions: BTreeSet<Permission>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            email,
            role_names,
            active_role,
            permissions,
        }
    }

    /// Returns the authenticated user id.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if one is recorded.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the names of all held, enabled roles.
    #[must_use]
    pub fn role_names(&self) -> &[String] {
        self.role_names.as_slice()
    }

    /// Returns the currently worn role, if one is selected.
    #[must_use]
    pub fn active_role(&self) -> Option<&ActiveRole> {
        self.active_role.as_ref()
    }

    /// Returns the permission set scoped to the active role.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Returns whether the active-role scope grants the permission.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Returns whether the active-role scope grants at least one of the
    /// requested permissions. An empty request is unsatisfiable and
    /// evaluates to false.
    #[must_use]
    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .any(|permission| self.permissions.contains(permission))
    }

    /// Returns whether the active-role scope grants every requested
    /// permission. An empty request is vacuously true.
    #[must_use]
    pub fn has_all_permissions(&self, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .all(|permission| self.permissions.contains(permission))
    }

    /// Returns whether the user holds an enabled role with this name,
    /// regardless of which role is currently worn.
    #[must_use]
    pub fn has_role(&self, role_name: &str) -> bool {
        self.role_names.iter().any(|name| name == role_name)
    }
}
