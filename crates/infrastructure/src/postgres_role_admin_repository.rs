use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_application::{NewAssignment, NewRole, RoleAdminRepository, RoleAssignmentView};
use cohort_core::{AppError, AppResult, RoleId, UserId};
use cohort_domain::{Permission, Role, RoleAssignment};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for role and assignment administration.
#[derive(Clone)]
pub struct PostgresRoleAdminRepository {
    pool: PgPool,
}

impl PostgresRoleAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.display_name,
                roles.description,
                roles.is_active,
                roles.created_at,
                grants.permission
            FROM roles
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            WHERE roles.id = $1
            ORDER BY grants.permission
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: uuid::Uuid,
    role_name: String,
    display_name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    permission: Option<String>,
}

#[derive(Debug, FromRow)]
struct AssignmentViewRow {
    user_id: uuid::Uuid,
    role_id: uuid::Uuid,
    role_name: String,
    assigned_by: Option<uuid::Uuid>,
    assigned_at: DateTime<Utc>,
}

#[async_trait]
impl RoleAdminRepository for PostgresRoleAdminRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.display_name,
                roles.description,
                roles.is_active,
                roles.created_at,
                grants.permission
            FROM roles
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            ORDER BY roles.name, grants.permission
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        self.load_role(role_id).await
    }

    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let row = sqlx::query_as::<_, CreatedRoleRow>(
            r#"
            INSERT INTO roles (name, display_name, description, is_active)
            VALUES ($1, $2, $3, true)
            RETURNING id, created_at
            "#,
        )
        .bind(role.name.as_str())
        .bind(role.display_name.as_str())
        .bind(role.description.as_deref())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, role.name.as_str()))?;

        for permission in &role.permissions {
            sqlx::query(
                r#"
                INSERT INTO role_grants (role_id, permission)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission) DO NOTHING
                "#,
            )
            .bind(row.id)
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(Role {
            id: RoleId::from_uuid(row.id),
            name: role.name,
            display_name: role.display_name,
            description: role.description,
            permissions: role.permissions,
            is_active: true,
            created_at: row.created_at,
        })
    }

    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permissions: BTreeSet<Permission>,
    ) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve role: {error}")))?;

        if exists == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        sqlx::query(
            r#"
            DELETE FROM role_grants
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear role grants: {error}")))?;

        for permission in &permissions {
            sqlx::query(
                r#"
                INSERT INTO role_grants (role_id, permission)
                VALUES ($1, $2)
                "#,
            )
            .bind(role_id.as_uuid())
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        self.load_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    async fn set_role_active(&self, role_id: RoleId, is_active: bool) -> AppResult<Role> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE roles
            SET is_active = $2
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(is_active)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update role activation: {error}"))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        self.load_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    async fn create_assignment(&self, assignment: NewAssignment) -> AppResult<RoleAssignment> {
        let role_exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(assignment.role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve role: {error}")))?;

        if role_exists == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                assignment.role_id
            )));
        }

        let user_exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(assignment.user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve user: {error}")))?;

        if user_exists == 0 {
            return Err(AppError::NotFound(format!(
                "user '{}' was not found",
                assignment.user_id
            )));
        }

        // The unique constraint turns a concurrent duplicate grant into a
        // rejected conflict instead of silent duplication.
        let row = sqlx::query_as::<_, CreatedAssignmentRow>(
            r#"
            INSERT INTO role_assignments (user_id, role_id, assigned_by)
            VALUES ($1, $2, $3)
            RETURNING id, assigned_at
            "#,
        )
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.assigned_by.map(|user_id| user_id.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            map_assignment_conflict(error, assignment.user_id, assignment.role_id)
        })?;

        Ok(RoleAssignment {
            id: row.id,
            user_id: assignment.user_id,
            role_id: assignment.role_id,
            assigned_by: assignment.assigned_by,
            assigned_at: row.assigned_at,
        })
    }

    async fn delete_assignment(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let rows_affected = sqlx::query(
            r#"
            DELETE FROM role_assignments
            WHERE user_id = $1
                AND role_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove role assignment: {error}"))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "assignment '{user_id}:{role_id}' was not found"
            )));
        }

        // A revoked role must not stay selected as the worn hat.
        sqlx::query(
            r#"
            UPDATE users
            SET active_role_id = NULL
            WHERE id = $1
                AND active_role_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear active role: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn list_assignments(&self) -> AppResult<Vec<RoleAssignmentView>> {
        let rows = sqlx::query_as::<_, AssignmentViewRow>(
            r#"
            SELECT
                assignments.user_id,
                assignments.role_id,
                roles.name AS role_name,
                assignments.assigned_by,
                assignments.assigned_at
            FROM role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            ORDER BY assignments.user_id, roles.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role assignments: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RoleAssignmentView {
                user_id: UserId::from_uuid(row.user_id),
                role_id: RoleId::from_uuid(row.role_id),
                role_name: row.role_name,
                assigned_by: row.assigned_by.map(UserId::from_uuid),
                assigned_at: row.assigned_at,
            })
            .collect())
    }
}

#[derive(Debug, FromRow)]
struct CreatedRoleRow {
    id: uuid::Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CreatedAssignmentRow {
    id: uuid::Uuid,
    assigned_at: DateTime<Utc>,
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
    let mut roles: Vec<Role> = Vec::new();

    for row in rows {
        let role_id = RoleId::from_uuid(row.role_id);

        if roles.last().is_none_or(|last| last.id != role_id) {
            roles.push(Role {
                id: role_id,
                name: row.role_name.clone(),
                display_name: row.display_name.clone(),
                description: row.description.clone(),
                permissions: BTreeSet::new(),
                is_active: row.is_active,
                created_at: row.created_at,
            });
        }

        if let Some(permission) = row.permission.as_deref() {
            let parsed = Permission::from_str(permission).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode permission '{permission}' for role '{}': {error}",
                    row.role_name
                ))
            })?;

            if let Some(last) = roles.last_mut() {
                last.permissions.insert(parsed);
            }
        }
    }

    Ok(roles)
}

fn map_role_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to create role: {error}"))
}

fn map_assignment_conflict(error: sqlx::Error, user_id: UserId, role_id: RoleId) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "user '{user_id}' already holds role '{role_id}'"
        ));
    }

    AppError::Internal(format!("failed to assign role: {error}"))
}
