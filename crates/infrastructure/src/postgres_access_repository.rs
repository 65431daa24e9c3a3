use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_application::{AccessRepository, AssignedRole};
use cohort_core::{AppError, AppResult, RoleId, UserId};
use cohort_domain::{Permission, Role};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for permission resolution reads.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssignedRoleRow {
    role_id: uuid::Uuid,
    role_name: String,
    display_name: String,
    description: Option<String>,
    is_active: bool,
    role_created_at: DateTime<Utc>,
    assigned_at: DateTime<Utc>,
    permission: Option<String>,
}

#[async_trait]
impl AccessRepository for PostgresAccessRepository {
    async fn list_assigned_roles(&self, user_id: UserId) -> AppResult<Vec<AssignedRole>> {
        let rows = sqlx::query_as::<_, AssignedRoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.display_name,
                roles.description,
                roles.is_active,
                roles.created_at AS role_created_at,
                assignments.assigned_at,
                grants.permission
            FROM role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            WHERE assignments.user_id = $1
            ORDER BY roles.name, grants.permission
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load assigned roles: {error}")))?;

        aggregate_assigned_roles(rows)
    }
}

fn aggregate_assigned_roles(rows: Vec<AssignedRoleRow>) -> AppResult<Vec<AssignedRole>> {
    let mut assigned: Vec<AssignedRole> = Vec::new();

    for row in rows {
        let role_id = RoleId::from_uuid(row.role_id);

        if assigned
            .last()
            .is_none_or(|last| last.role.id != role_id)
        {
            assigned.push(AssignedRole {
                role: Role {
                    id: role_id,
                    name: row.role_name.clone(),
                    display_name: row.display_name.clone(),
                    description: row.description.clone(),
                    permissions: BTreeSet::new(),
                    is_active: row.is_active,
                    created_at: row.role_created_at,
                },
                assigned_at: row.assigned_at,
            });
        }

        if let Some(permission) = row.permission.as_deref() {
            let parsed = Permission::from_str(permission).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode permission '{permission}' for role '{}': {error}",
                    row.role_name
                ))
            })?;

            if let Some(last) = assigned.last_mut() {
                last.role.permissions.insert(parsed);
            }
        }
    }

    Ok(assigned)
}
