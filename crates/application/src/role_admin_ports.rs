use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_core::{AppResult, RoleId, UserId};
use cohort_domain::{Permission, Role, RoleAssignment};

/// Input payload for creating roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role machine name.
    pub name: String,
    /// Presentation name.
    pub display_name: String,
    /// Presentation description.
    pub description: Option<String>,
    /// Grants to attach to the role.
    pub permissions: BTreeSet<Permission>,
}

/// Validated role row handed to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Unique role machine name.
    pub name: String,
    /// Presentation name.
    pub display_name: String,
    /// Presentation description.
    pub description: Option<String>,
    /// Grants to attach to the role.
    pub permissions: BTreeSet<Permission>,
}

/// New assignment linking a user to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    /// User receiving the role.
    pub user_id: UserId,
    /// Role being granted.
    pub role_id: RoleId,
    /// Grantor identity, null for system-seeded grants.
    pub assigned_by: Option<UserId>,
}

/// Assignment projection for administrative views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentView {
    /// User holding the role.
    pub user_id: UserId,
    /// Role identifier.
    pub role_id: RoleId,
    /// Role machine name.
    pub role_name: String,
    /// Grantor identity.
    pub assigned_by: Option<UserId>,
    /// Grant timestamp.
    pub assigned_at: DateTime<Utc>,
}

/// Repository port for role and assignment administration.
#[async_trait]
pub trait RoleAdminRepository: Send + Sync {
    /// Lists all roles with effective grants.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Finds a role by its stable id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Creates a role and attaches grants. Duplicate names conflict.
    async fn create_role(&self, role: NewRole) -> AppResult<Role>;

    /// Replaces a role's permission set.
    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permissions: BTreeSet<Permission>,
    ) -> AppResult<Role>;

    /// Enables or disables a role without touching assignments.
    async fn set_role_active(&self, role_id: RoleId, is_active: bool) -> AppResult<Role>;

    /// Creates an assignment. A duplicate (user, role) pair conflicts.
    async fn create_assignment(&self, assignment: NewAssignment) -> AppResult<RoleAssignment>;

    /// Destroys an assignment; missing pairs are not found. Clears the
    /// user's active role in the same transaction when it pointed at the
    /// revoked role.
    async fn delete_assignment(&self, user_id: UserId, role_id: RoleId) -> AppResult<()>;

    /// Lists current role assignments.
    async fn list_assignments(&self) -> AppResult<Vec<RoleAssignmentView>>;
}
