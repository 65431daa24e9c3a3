use std::sync::Arc;

use cohort_application::{AccessService, AuditRecorder, RoleAdminService, TokenVerifier, UserService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_service: AccessService,
    pub role_admin_service: RoleAdminService,
    pub user_service: UserService,
    pub audit_recorder: AuditRecorder,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub pool: PgPool,
}
