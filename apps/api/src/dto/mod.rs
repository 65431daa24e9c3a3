mod auth;
mod security;

pub use auth::{
    ActiveRoleResponse, ActorResponse, LoginRequest, RegisterRequest, SessionResponse,
    SwitchRoleRequest, UserResponse,
};
pub use security::{
    AssignRoleRequest, AuditLogEntryResponse, AuditLogQueryParams, CreateRoleRequest,
    RevokeRoleRequest, RoleAssignmentResponse, RoleResponse, SetRoleActivationRequest,
    UpdateRolePermissionsRequest,
};
