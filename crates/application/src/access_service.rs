use std::collections::BTreeSet;
use std::sync::Arc;

use cohort_core::{AppError, AppResult, RoleId, UserId};
use cohort_domain::{ActiveRole, ActorContext, Permission};

use crate::{AccessRepository, AssignedRole, UserRepository};

/// Permission resolver over persisted role assignments.
///
/// Stateless: every check is a bounded read against the backing store.
/// Storage failures propagate as errors so that callers deny, never allow.
#[derive(Clone)]
pub struct AccessService {
    repository: Arc<dyn AccessRepository>,
    user_repository: Arc<dyn UserRepository>,
}

impl AccessService {
    /// Creates a resolver from repository implementations.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AccessRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            repository,
            user_repository,
        }
    }

    /// Resolves the effective permission set for a user.
    ///
    /// With a scope role: exactly that assignment's grants, empty when the
    /// user does not hold the role or the role is disabled. Without one:
    /// the union over all held, enabled roles. A user with no assignments
    /// resolves to the empty set.
    pub async fn permissions_for(
        &self,
        user_id: UserId,
        scope_role_id: Option<RoleId>,
    ) -> AppResult<BTreeSet<Permission>> {
        let assigned = self.repository.list_assigned_roles(user_id).await?;
        Ok(effective_permissions(&assigned, scope_role_id))
    }

    /// Returns whether the resolved set contains the permission.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        permission: Permission,
        scope_role_id: Option<RoleId>,
    ) -> AppResult<bool> {
        let permissions = self.permissions_for(user_id, scope_role_id).await?;
        Ok(permissions.contains(&permission))
    }

    /// Returns whether the resolved set intersects the requested list.
    /// An empty request is unsatisfiable and evaluates to false.
    pub async fn has_any_permission(
        &self,
        user_id: UserId,
        requested: &[Permission],
        scope_role_id: Option<RoleId>,
    ) -> AppResult<bool> {
        let permissions = self.permissions_for(user_id, scope_role_id).await?;
        Ok(requested
            .iter()
            .any(|permission| permissions.contains(permission)))
    }

    /// Returns whether the resolved set covers the whole requested list.
    /// An empty request is vacuously true.
    pub async fn has_all_permissions(
        &self,
        user_id: UserId,
        requested: &[Permission],
        scope_role_id: Option<RoleId>,
    ) -> AppResult<bool> {
        let permissions = self.permissions_for(user_id, scope_role_id).await?;
        Ok(requested
            .iter()
            .all(|permission| permissions.contains(permission)))
    }

    /// Returns whether the user holds an enabled role with this name.
    pub async fn has_role(&self, user_id: UserId, role_name: &str) -> AppResult<bool> {
        let names = self.active_role_names(user_id).await?;
        Ok(names.iter().any(|name| name == role_name))
    }

    /// Returns whether the user holds any of the named enabled roles.
    pub async fn has_any_role(&self, user_id: UserId, role_names: &[&str]) -> AppResult<bool> {
        let names = self.active_role_names(user_id).await?;
        Ok(role_names.iter().any(|requested| {
            names.iter().any(|name| name == requested)
        }))
    }

    /// Returns whether the user holds every named enabled role.
    pub async fn has_all_roles(&self, user_id: UserId, role_names: &[&str]) -> AppResult<bool> {
        let names = self.active_role_names(user_id).await?;
        Ok(role_names.iter().all(|requested| {
            names.iter().any(|name| name == requested)
        }))
    }

    /// Resolves the full request identity for the authentication gate.
    ///
    /// The permission scope is the stored active role, never a token
    /// claim, so role switches apply to the next request. A null or
    /// no-longer-held active role falls back to the identity-wide union.
    pub async fn resolve_actor(&self, user_id: UserId) -> AppResult<ActorContext> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' was not found")))?;

        let assigned = self.repository.list_assigned_roles(user_id).await?;

        let role_names: Vec<String> = assigned
            .iter()
            .filter(|assigned| assigned.role.is_active)
            .map(|assigned| assigned.role.name.clone())
            .collect();

        let active_role = user.active_role_id.and_then(|active_role_id| {
            assigned
                .iter()
                .find(|assigned| {
                    assigned.role.id == active_role_id && assigned.role.is_active
                })
                .map(|assigned| ActiveRole {
                    role_id: assigned.role.id,
                    name: assigned.role.name.clone(),
                    display_name: assigned.role.display_name.clone(),
                })
        });

        let scope = active_role.as_ref().map(|role| role.role_id);
        let permissions = effective_permissions(&assigned, scope);

        Ok(ActorContext::new(
            user.id,
            user.display_name,
            Some(user.email.into()),
            role_names,
            active_role,
            permissions,
        ))
    }

    async fn active_role_names(&self, user_id: UserId) -> AppResult<Vec<String>> {
        let assigned = self.repository.list_assigned_roles(user_id).await?;
        Ok(assigned
            .into_iter()
            .filter(|assigned| assigned.role.is_active)
            .map(|assigned| assigned.role.name)
            .collect())
    }
}

/// Computes the effective permission set from assigned roles.
///
/// Disabled roles contribute nothing in either scope.
fn effective_permissions(
    assigned: &[AssignedRole],
    scope_role_id: Option<RoleId>,
) -> BTreeSet<Permission> {
    match scope_role_id {
        Some(role_id) => assigned
            .iter()
            .find(|assigned| assigned.role.id == role_id && assigned.role.is_active)
            .map(|assigned| assigned.role.permissions.clone())
            .unwrap_or_default(),
        None => assigned
            .iter()
            .filter(|assigned| assigned.role.is_active)
            .flat_map(|assigned| assigned.role.permissions.iter().copied())
            .collect(),
    }
}
