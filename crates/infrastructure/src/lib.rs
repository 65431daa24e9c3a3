//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod jwt_token_service;
mod postgres_access_repository;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_role_admin_repository;
mod postgres_user_repository;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use jwt_token_service::JwtTokenService;
pub use postgres_access_repository::PostgresAccessRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_role_admin_repository::PostgresRoleAdminRepository;
pub use postgres_user_repository::PostgresUserRepository;
