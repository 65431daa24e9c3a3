use cohort_application::{AuditLogEntry, RoleAssignmentView};
use cohort_domain::{Permission, Role};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Incoming payload for replacing a role's permission set.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/update-role-permissions-request.ts"
)]
pub struct UpdateRolePermissionsRequest {
    pub permissions: Vec<String>,
}

/// Incoming payload for enabling or disabling a role.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/set-role-activation-request.ts"
)]
pub struct SetRoleActivationRequest {
    pub is_active: bool,
}

/// Incoming payload for granting a role.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/assign-role-request.ts"
)]
pub struct AssignRoleRequest {
    pub user_id: String,
    pub role_id: String,
}

/// Incoming payload for revoking a role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/revoke-role-request.ts"
)]
pub struct RevokeRoleRequest {
    pub user_id: String,
    pub role_id: String,
}

/// Query parameters for audit log listing.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-log-query-params.ts"
)]
pub struct AuditLogQueryParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
}

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role_id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub permissions: Vec<String>,
}

/// API representation of a role assignment.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-assignment-response.ts"
)]
pub struct RoleAssignmentResponse {
    pub user_id: String,
    pub role_id: String,
    pub role_name: String,
    pub assigned_by: Option<String>,
    pub assigned_at: String,
}

/// API representation of an audit log entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub entry_id: String,
    pub actor_id: Option<String>,
    pub actor_active_role_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    #[ts(type = "unknown")]
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub outcome: String,
    pub error_message: Option<String>,
    pub created_at: String,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            role_id: value.id.to_string(),
            name: value.name,
            display_name: value.display_name,
            description: value.description,
            is_active: value.is_active,
            permissions: value
                .permissions
                .iter()
                .map(|permission| Permission::as_str(permission).to_owned())
                .collect(),
        }
    }
}

impl From<RoleAssignmentView> for RoleAssignmentResponse {
    fn from(value: RoleAssignmentView) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            role_id: value.role_id.to_string(),
            role_name: value.role_name,
            assigned_by: value.assigned_by.map(|user_id| user_id.to_string()),
            assigned_at: value.assigned_at.to_rfc3339(),
        }
    }
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            entry_id: value.entry_id,
            actor_id: value.actor_id,
            actor_active_role_id: value.actor_active_role_id,
            action: value.action,
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            details: value.details,
            ip_address: value.ip_address,
            user_agent: value.user_agent,
            outcome: value.outcome,
            error_message: value.error_message,
            created_at: value.created_at,
        }
    }
}
