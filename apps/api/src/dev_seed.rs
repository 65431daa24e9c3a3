//! Idempotent development bootstrap for the role catalog and admin user.

use std::collections::BTreeSet;

use chrono::Utc;
use cohort_application::{
    NewAssignment, NewRole, PasswordHasher, RoleAdminRepository, UserRepository,
};
use cohort_core::{AppError, AppResult, UserId};
use cohort_domain::{EmailAddress, Permission, Role, User};
use cohort_infrastructure::{
    Argon2PasswordHasher, PostgresRoleAdminRepository, PostgresUserRepository,
};
use sqlx::PgPool;
use tracing::info;

const DEV_SEED_ADMIN_EMAIL: &str = "admin@cohort.local";
const DEV_SEED_ADMIN_DISPLAY_NAME: &str = "Platform Admin";
const DEV_SEED_ADMIN_PASSWORD: &str = "cohort-dev-password";

pub async fn run(pool: PgPool) -> AppResult<()> {
    let roles = PostgresRoleAdminRepository::new(pool.clone());
    let users = PostgresUserRepository::new(pool);
    let hasher = Argon2PasswordHasher::new();

    let administrator = ensure_role(
        &roles,
        "administrator",
        "Administrator",
        Permission::all().iter().copied().collect(),
    )
    .await?;
    ensure_role(
        &roles,
        "instructor",
        "Instructor",
        BTreeSet::from([
            Permission::CreateCourse,
            Permission::EditCourse,
            Permission::PublishCourse,
            Permission::GradeSubmissions,
            Permission::IssueCertificates,
            Permission::ViewReports,
        ]),
    )
    .await?;
    ensure_role(
        &roles,
        "learner",
        "Learner",
        BTreeSet::from([
            Permission::BrowseCourses,
            Permission::EnrollCourse,
            Permission::TakeQuiz,
        ]),
    )
    .await?;

    let admin = match users.find_by_email(DEV_SEED_ADMIN_EMAIL).await? {
        Some(admin) => admin,
        None => {
            let password_hash = hasher.hash_password(DEV_SEED_ADMIN_PASSWORD)?;
            let admin = users
                .create_user(User {
                    id: UserId::new(),
                    email: EmailAddress::new(DEV_SEED_ADMIN_EMAIL)?,
                    display_name: DEV_SEED_ADMIN_DISPLAY_NAME.to_owned(),
                    password_hash,
                    active_role_id: None,
                    created_at: Utc::now(),
                })
                .await?;
            info!(email = DEV_SEED_ADMIN_EMAIL, "seeded admin user");
            admin
        }
    };

    let granted = roles
        .create_assignment(NewAssignment {
            user_id: admin.id,
            role_id: administrator.id,
            assigned_by: None,
        })
        .await;
    match granted {
        Ok(_) => info!("granted administrator role to seed user"),
        Err(AppError::Conflict(_)) => {}
        Err(error) => return Err(error),
    }

    users
        .set_active_role_if_held(admin.id, administrator.id)
        .await?;

    Ok(())
}

async fn ensure_role(
    repository: &PostgresRoleAdminRepository,
    name: &str,
    display_name: &str,
    permissions: BTreeSet<Permission>,
) -> AppResult<Role> {
    let existing = repository
        .list_roles()
        .await?
        .into_iter()
        .find(|role| role.name == name);

    if let Some(role) = existing {
        return Ok(role);
    }

    let created = repository
        .create_role(NewRole {
            name: name.to_owned(),
            display_name: display_name.to_owned(),
            description: None,
            permissions,
        })
        .await?;
    info!(role = name, "seeded role");
    Ok(created)
}
