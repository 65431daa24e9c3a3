use std::collections::BTreeSet;
use std::sync::Arc;

use cohort_core::{AppError, AppResult, NonEmptyString, RoleId, UserId};
use cohort_domain::{ActorContext, AuditAction, AuditOutcome, Permission, Role, RoleAssignment};

use crate::{
    AuditEntry, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRecorder, CreateRoleInput,
    NewAssignment, NewRole, RequestMeta, RoleAdminRepository, RoleAssignmentView,
};

/// Application service for role and assignment administration.
///
/// Every mutation records exactly one audit entry, for rejected calls as
/// well as successful ones. Audit writes are best-effort and never fail
/// the operation.
#[derive(Clone)]
pub struct RoleAdminService {
    repository: Arc<dyn RoleAdminRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    audit: AuditRecorder,
}

impl RoleAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleAdminRepository>,
        audit_log_repository: Arc<dyn AuditLogRepository>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            repository,
            audit_log_repository,
            audit,
        }
    }

    /// Returns all roles for administrative users.
    pub async fn list_roles(&self, actor: &ActorContext) -> AppResult<Vec<Role>> {
        require_permission(actor, Permission::ManageRoles)?;
        self.repository.list_roles().await
    }

    /// Creates a role and records an audit entry.
    pub async fn create_role(
        &self,
        actor: &ActorContext,
        input: CreateRoleInput,
        meta: &RequestMeta,
    ) -> AppResult<Role> {
        let result = self.create_role_inner(actor, input).await;

        let resource_id = result.as_ref().ok().map(|role| role.id.to_string());
        self.record_mutation(
            actor,
            AuditAction::RoleCreated,
            "role",
            resource_id,
            None,
            meta,
            result.as_ref().err(),
        )
        .await;

        result
    }

    /// Replaces a role's permission set and records an audit entry.
    pub async fn update_role_permissions(
        &self,
        actor: &ActorContext,
        role_id: RoleId,
        permissions: BTreeSet<Permission>,
        meta: &RequestMeta,
    ) -> AppResult<Role> {
        let result = self.update_role_permissions_inner(actor, role_id, permissions).await;

        self.record_mutation(
            actor,
            AuditAction::RolePermissionsUpdated,
            "role",
            Some(role_id.to_string()),
            None,
            meta,
            result.as_ref().err(),
        )
        .await;

        result
    }

    /// Enables or disables a role and records an audit entry.
    ///
    /// Disabling never deletes assignments; the role simply stops
    /// contributing to resolution.
    pub async fn set_role_active(
        &self,
        actor: &ActorContext,
        role_id: RoleId,
        is_active: bool,
        meta: &RequestMeta,
    ) -> AppResult<Role> {
        let result = self.set_role_active_inner(actor, role_id, is_active).await;

        self.record_mutation(
            actor,
            AuditAction::RoleActivationChanged,
            "role",
            Some(role_id.to_string()),
            Some(serde_json::json!({ "is_active": is_active })),
            meta,
            result.as_ref().err(),
        )
        .await;

        result
    }

    /// Grants a role to a user and records an audit entry.
    ///
    /// Granting an already-held role is rejected with a conflict; the
    /// rejection itself is audited.
    pub async fn assign_role(
        &self,
        actor: &ActorContext,
        user_id: UserId,
        role_id: RoleId,
        meta: &RequestMeta,
    ) -> AppResult<RoleAssignment> {
        let result = self.assign_role_inner(actor, user_id, role_id).await;

        self.record_mutation(
            actor,
            AuditAction::RoleAssigned,
            "role_assignment",
            Some(format!("{user_id}:{role_id}")),
            Some(serde_json::json!({
                "user_id": user_id.to_string(),
                "role_id": role_id.to_string(),
            })),
            meta,
            result.as_ref().err(),
        )
        .await;

        result
    }

    /// Revokes a role from a user and records an audit entry.
    ///
    /// Revoking an assignment that does not exist is rejected as not
    /// found; the rejection itself is audited.
    pub async fn revoke_role(
        &self,
        actor: &ActorContext,
        user_id: UserId,
        role_id: RoleId,
        meta: &RequestMeta,
    ) -> AppResult<()> {
        let result = self.revoke_role_inner(actor, user_id, role_id).await;

        self.record_mutation(
            actor,
            AuditAction::RoleRevoked,
            "role_assignment",
            Some(format!("{user_id}:{role_id}")),
            Some(serde_json::json!({
                "user_id": user_id.to_string(),
                "role_id": role_id.to_string(),
            })),
            meta,
            result.as_ref().err(),
        )
        .await;

        result
    }

    /// Returns current role assignments for administrative users.
    pub async fn list_assignments(
        &self,
        actor: &ActorContext,
    ) -> AppResult<Vec<RoleAssignmentView>> {
        require_permission(actor, Permission::ManageRoles)?;
        self.repository.list_assignments().await
    }

    /// Returns recent audit entries.
    pub async fn list_audit_log(
        &self,
        actor: &ActorContext,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        require_permission(actor, Permission::ViewAuditLog)?;
        self.audit_log_repository.list_recent_entries(query).await
    }

    async fn create_role_inner(
        &self,
        actor: &ActorContext,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        require_permission(actor, Permission::ManageRoles)?;

        let name = NonEmptyString::new(input.name.trim())?;
        let display_name = NonEmptyString::new(input.display_name.trim())?;

        self.repository
            .create_role(NewRole {
                name: name.into(),
                display_name: display_name.into(),
                description: input.description,
                permissions: input.permissions,
            })
            .await
    }

    async fn update_role_permissions_inner(
        &self,
        actor: &ActorContext,
        role_id: RoleId,
        permissions: BTreeSet<Permission>,
    ) -> AppResult<Role> {
        require_permission(actor, Permission::ManageRoles)?;
        self.repository
            .update_role_permissions(role_id, permissions)
            .await
    }

    async fn set_role_active_inner(
        &self,
        actor: &ActorContext,
        role_id: RoleId,
        is_active: bool,
    ) -> AppResult<Role> {
        require_permission(actor, Permission::ManageRoles)?;
        self.repository.set_role_active(role_id, is_active).await
    }

    async fn assign_role_inner(
        &self,
        actor: &ActorContext,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<RoleAssignment> {
        require_permission(actor, Permission::ManageRoles)?;

        self.repository
            .create_assignment(NewAssignment {
                user_id,
                role_id,
                assigned_by: Some(actor.user_id()),
            })
            .await
    }

    async fn revoke_role_inner(
        &self,
        actor: &ActorContext,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<()> {
        require_permission(actor, Permission::ManageRoles)?;
        self.repository.delete_assignment(user_id, role_id).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_mutation(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        resource_type: &str,
        resource_id: Option<String>,
        details: Option<serde_json::Value>,
        meta: &RequestMeta,
        error: Option<&AppError>,
    ) {
        let outcome = match error {
            None => AuditOutcome::Success,
            Some(AppError::Internal(_)) => AuditOutcome::Error,
            Some(_) => AuditOutcome::Failure,
        };

        self.audit
            .record(AuditEntry {
                actor_id: Some(actor.user_id()),
                actor_active_role_id: actor.active_role().map(|role| role.role_id),
                action,
                resource_type: resource_type.to_owned(),
                resource_id,
                details,
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                outcome,
                error_message: error.map(ToString::to_string),
            })
            .await;
    }
}

fn require_permission(actor: &ActorContext, permission: Permission) -> AppResult<()> {
    if actor.has_permission(permission) {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "user '{}' is missing permission '{}'",
        actor.user_id(),
        permission.as_str()
    )))
}
