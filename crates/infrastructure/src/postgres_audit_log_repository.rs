use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use cohort_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use cohort_core::{AppError, AppResult};

/// PostgreSQL-backed repository for audit log read models.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    entry_id: uuid::Uuid,
    actor_id: Option<uuid::Uuid>,
    actor_active_role_id: Option<uuid::Uuid>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    outcome: String,
    error_message: Option<String>,
    created_at: String,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let capped_offset = query.offset.min(5_000) as i64;
        let actor_filter = query
            .actor_id
            .as_deref()
            .map(uuid::Uuid::parse_str)
            .transpose()
            .map_err(|error| AppError::Validation(format!("invalid actor filter: {error}")))?;

        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id AS entry_id,
                actor_id,
                actor_active_role_id,
                action,
                resource_type,
                resource_id,
                details,
                ip_address,
                user_agent,
                outcome,
                error_message,
                to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM audit_log_entries
            WHERE ($1::TEXT IS NULL OR action = $1)
                AND ($2::UUID IS NULL OR actor_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(query.action)
        .bind(actor_filter)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit log entries: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| AuditLogEntry {
                entry_id: row.entry_id.to_string(),
                actor_id: row.actor_id.map(|actor_id| actor_id.to_string()),
                actor_active_role_id: row
                    .actor_active_role_id
                    .map(|role_id| role_id.to_string()),
                action: row.action,
                resource_type: row.resource_type,
                resource_id: row.resource_id,
                details: row.details,
                ip_address: row.ip_address,
                user_agent: row.user_agent,
                outcome: row.outcome,
                error_message: row.error_message,
                created_at: row.created_at,
            })
            .collect())
    }
}
