use std::str::FromStr;

use cohort_core::AppError;
use serde::{Deserialize, Serialize};

/// Permissions enforced by application policy checks.
///
/// The catalog is closed: unknown storage values are rejected at the
/// parsing boundary instead of silently resolving to "not granted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows administering user accounts.
    ManageUsers,
    /// Allows creating roles and granting or revoking assignments.
    ManageRoles,
    /// Allows reading the audit log.
    ViewAuditLog,
    /// Allows creating course drafts.
    CreateCourse,
    /// Allows editing existing courses.
    EditCourse,
    /// Allows publishing courses to learners.
    PublishCourse,
    /// Allows browsing the published course catalog.
    BrowseCourses,
    /// Allows enrolling into published courses.
    EnrollCourse,
    /// Allows grading learner submissions.
    GradeSubmissions,
    /// Allows taking quizzes in enrolled courses.
    TakeQuiz,
    /// Allows issuing completion certificates.
    IssueCertificates,
    /// Allows reading compliance and progress reports.
    ViewReports,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageUsers => "manage_users",
            Self::ManageRoles => "manage_roles",
            Self::ViewAuditLog => "view_audit_log",
            Self::CreateCourse => "create_course",
            Self::EditCourse => "edit_course",
            Self::PublishCourse => "publish_course",
            Self::BrowseCourses => "browse_courses",
            Self::EnrollCourse => "enroll_course",
            Self::GradeSubmissions => "grade_submissions",
            Self::TakeQuiz => "take_quiz",
            Self::IssueCertificates => "issue_certificates",
            Self::ViewReports => "view_reports",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::ManageUsers,
            Permission::ManageRoles,
            Permission::ViewAuditLog,
            Permission::CreateCourse,
            Permission::EditCourse,
            Permission::PublishCourse,
            Permission::BrowseCourses,
            Permission::EnrollCourse,
            Permission::GradeSubmissions,
            Permission::TakeQuiz,
            Permission::IssueCertificates,
            Permission::ViewReports,
        ];

        ALL
    }

    /// Parses a transport value into a permission.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manage_users" => Ok(Self::ManageUsers),
            "manage_roles" => Ok(Self::ManageRoles),
            "view_audit_log" => Ok(Self::ViewAuditLog),
            "create_course" => Ok(Self::CreateCourse),
            "edit_course" => Ok(Self::EditCourse),
            "publish_course" => Ok(Self::PublishCourse),
            "browse_courses" => Ok(Self::BrowseCourses),
            "enroll_course" => Ok(Self::EnrollCourse),
            "grade_submissions" => Ok(Self::GradeSubmissions),
            "take_quiz" => Ok(Self::TakeQuiz),
            "issue_certificates" => Ok(Self::IssueCertificates),
            "view_reports" => Ok(Self::ViewReports),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created.
    RoleCreated,
    /// Emitted when a role's permission set changes.
    RolePermissionsUpdated,
    /// Emitted when a role is enabled or disabled.
    RoleActivationChanged,
    /// Emitted when a role is granted to a user.
    RoleAssigned,
    /// Emitted when a role assignment is revoked.
    RoleRevoked,
    /// Emitted when a user switches their active role.
    ActiveRoleSwitched,
    /// Emitted when a new user account is registered.
    UserRegistered,
    /// Emitted when a user authenticates.
    UserLoggedIn,
    /// Emitted by the generic per-route audit wrapper.
    RouteAccessed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "role.created",
            Self::RolePermissionsUpdated => "role.permissions_updated",
            Self::RoleActivationChanged => "role.activation_changed",
            Self::RoleAssigned => "role.assigned",
            Self::RoleRevoked => "role.revoked",
            Self::ActiveRoleSwitched => "active_role.switched",
            Self::UserRegistered => "user.registered",
            Self::UserLoggedIn => "user.logged_in",
            Self::RouteAccessed => "route.accessed",
        }
    }
}

/// Outcome recorded with every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The audited operation completed.
    Success,
    /// The audited operation was rejected by policy or state.
    Failure,
    /// The audited operation failed on infrastructure.
    Error,
}

impl AuditOutcome {
    /// Returns a stable storage value for this outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }
}
