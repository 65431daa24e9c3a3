use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cohort_core::{RoleId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Permission;

/// Named, independently activatable bundle of permissions.
///
/// Roles are soft-disabled through `is_active`; a disabled role keeps its
/// assignments but contributes nothing to permission resolution and cannot
/// be switched into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique machine key, immutable once referenced by assignments.
    pub name: String,
    /// Presentation name.
    pub display_name: String,
    /// Presentation description.
    pub description: Option<String>,
    /// Deduplicated permission grants.
    pub permissions: BTreeSet<Permission>,
    /// Whether the role participates in resolution and switching.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Returns whether this role grants the permission.
    #[must_use]
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// The fact that a user holds a role, with grant provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Stable assignment identifier.
    pub id: Uuid,
    /// User holding the role.
    pub user_id: UserId,
    /// Role held.
    pub role_id: RoleId,
    /// Grantor identity, null for system-seeded assignments.
    pub assigned_by: Option<UserId>,
    /// Grant timestamp.
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use cohort_core::RoleId;

    use super::Role;
    use crate::Permission;

    fn role(permissions: BTreeSet<Permission>) -> Role {
        Role {
            id: RoleId::new(),
            name: "learner".to_owned(),
            display_name: "Learner".to_owned(),
            description: None,
            permissions,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn grants_reports_membership() {
        let role = role(BTreeSet::from([Permission::BrowseCourses]));
        assert!(role.grants(Permission::BrowseCourses));
        assert!(!role.grants(Permission::ManageRoles));
    }

    #[test]
    fn permission_set_deduplicates() {
        let role = role(BTreeSet::from([
            Permission::BrowseCourses,
            Permission::BrowseCourses,
            Permission::TakeQuiz,
        ]));
        assert_eq!(role.permissions.len(), 2);
    }
}
