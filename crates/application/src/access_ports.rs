use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_core::{AppResult, UserId};
use cohort_domain::Role;

/// A role held by a user, with the grant timestamp used for deterministic
/// first-login selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedRole {
    /// The held role, including disabled ones.
    pub role: Role,
    /// When the assignment was granted.
    pub assigned_at: DateTime<Utc>,
}

/// Repository port for permission resolution reads.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Lists every role assigned to the user, joined with its grants.
    ///
    /// Disabled roles are included; the resolver decides what they
    /// contribute.
    async fn list_assigned_roles(&self, user_id: UserId) -> AppResult<Vec<AssignedRole>>;
}
