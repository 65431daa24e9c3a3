use cohort_application::AuthSession;
use cohort_domain::{ActiveRole, ActorContext, Permission, User};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for password login.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/login-request.ts"
)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Incoming payload for account registration.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/register-request.ts"
)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

/// Incoming payload for switching the active role.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/switch-role-request.ts"
)]
pub struct SwitchRoleRequest {
    pub role_id: String,
}

/// API representation of an issued bearer session.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/session-response.ts"
)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in_seconds: i64,
    pub user_id: String,
    pub active_role_id: Option<String>,
}

/// API representation of the worn role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/active-role-response.ts"
)]
pub struct ActiveRoleResponse {
    pub role_id: String,
    pub name: String,
    pub display_name: String,
}

/// API representation of the resolved request identity.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/actor-response.ts"
)]
pub struct ActorResponse {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub active_role: Option<ActiveRoleResponse>,
    pub permissions: Vec<String>,
}

/// API representation of a user account.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/user-response.ts"
)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

impl From<AuthSession> for SessionResponse {
    fn from(value: AuthSession) -> Self {
        Self {
            token: value.token,
            token_type: value.token_type,
            expires_in_seconds: value.expires_in_seconds,
            user_id: value.user_id.to_string(),
            active_role_id: value.active_role_id.map(|role_id| role_id.to_string()),
        }
    }
}

impl From<ActiveRole> for ActiveRoleResponse {
    fn from(value: ActiveRole) -> Self {
        Self {
            role_id: value.role_id.to_string(),
            name: value.name,
            display_name: value.display_name,
        }
    }
}

impl From<ActorContext> for ActorResponse {
    fn from(value: ActorContext) -> Self {
        Self {
            user_id: value.user_id().to_string(),
            display_name: value.display_name().to_owned(),
            email: value.email().map(ToOwned::to_owned),
            roles: value.role_names().to_vec(),
            active_role: value.active_role().cloned().map(ActiveRoleResponse::from),
            permissions: value
                .permissions()
                .iter()
                .map(|permission| Permission::as_str(permission).to_owned())
                .collect(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            user_id: value.id.to_string(),
            email: value.email.into(),
            display_name: value.display_name,
        }
    }
}
