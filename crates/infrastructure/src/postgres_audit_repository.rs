use async_trait::async_trait;
use sqlx::PgPool;

use cohort_application::{AuditEntry, AuditRepository};
use cohort_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
///
/// Entries are inserted once and never updated or deleted.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                actor_id,
                actor_active_role_id,
                action,
                resource_type,
                resource_id,
                details,
                ip_address,
                user_agent,
                outcome,
                error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.actor_id.map(|user_id| user_id.as_uuid()))
        .bind(entry.actor_active_role_id.map(|role_id| role_id.as_uuid()))
        .bind(entry.action.as_str())
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .bind(entry.outcome.as_str())
        .bind(entry.error_message)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(())
    }
}
