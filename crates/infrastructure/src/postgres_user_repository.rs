use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_application::UserRepository;
use cohort_core::{AppError, AppResult, RoleId, UserId};
use cohort_domain::{EmailAddress, User};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for user accounts.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    display_name: String,
    password_hash: String,
    active_role_id: Option<uuid::Uuid>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AppResult<User> {
        let email = EmailAddress::new(self.email.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "stored email for user '{}' is invalid: {error}",
                self.id
            ))
        })?;

        Ok(User {
            id: UserId::from_uuid(self.id),
            email,
            display_name: self.display_name,
            password_hash: self.password_hash,
            active_role_id: self.active_role_id.map(RoleId::from_uuid),
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, display_name, password_hash, active_role_id, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user: {error}")))?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, display_name, password_hash, active_role_id, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user by email: {error}")))?;

        row.map(UserRow::into_user).transpose()
    }

    async fn create_user(&self, user: User) -> AppResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, password_hash, active_role_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.display_name.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.active_role_id.map(|role_id| role_id.as_uuid()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| map_email_conflict(error, user.email.as_str()))?;

        Ok(user)
    }

    async fn set_active_role_if_held(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET active_role_id = $2
            WHERE id = $1
                AND EXISTS (
                    SELECT 1
                    FROM role_assignments
                    INNER JOIN roles
                        ON roles.id = role_assignments.role_id
                    WHERE role_assignments.user_id = $1
                        AND role_assignments.role_id = $2
                        AND roles.is_active
                )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to set active role: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}

fn map_email_conflict(error: sqlx::Error, email: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("email '{email}' is already registered"));
    }

    AppError::Internal(format!("failed to create user: {error}"))
}
