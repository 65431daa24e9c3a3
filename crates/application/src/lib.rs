//! Application services and ports.

#![forbid(unsafe_code)]

mod access_ports;
mod access_service;
mod audit_ports;
mod audit_service;
mod auth_ports;
mod role_admin_ports;
mod role_admin_service;
mod user_service;

pub use access_ports::{AccessRepository, AssignedRole};
pub use access_service::AccessService;
pub use audit_ports::{
    AuditEntry, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository, RequestMeta,
};
pub use audit_service::AuditRecorder;
pub use auth_ports::{IssuedToken, PasswordHasher, TokenClaims, TokenIssuer, TokenVerifier};
pub use role_admin_ports::{
    CreateRoleInput, NewAssignment, NewRole, RoleAdminRepository, RoleAssignmentView,
};
pub use role_admin_service::RoleAdminService;
pub use user_service::{AuthSession, RegisterUserInput, UserRepository, UserService};
