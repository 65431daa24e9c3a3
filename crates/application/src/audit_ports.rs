use async_trait::async_trait;
use cohort_core::{AppResult, RoleId, UserId};
use cohort_domain::{AuditAction, AuditOutcome};

/// Request provenance captured with audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Client address, typically from `x-forwarded-for`.
    pub ip_address: Option<String>,
    /// Client user agent header.
    pub user_agent: Option<String>,
}

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Acting user, null for system-initiated events.
    pub actor_id: Option<UserId>,
    /// The role the actor was wearing when acting.
    pub actor_active_role_id: Option<RoleId>,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: Option<String>,
    /// Structured detail payload (method, path, changed ids).
    pub details: Option<serde_json::Value>,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Final outcome of the audited operation.
    pub outcome: AuditOutcome,
    /// Error description for failure and error outcomes.
    pub error_message: Option<String>,
}

/// Port for persisting append-only audit entries.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit entry.
    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()>;
}

/// Audit log entry projection for administrative views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Stable entry identifier.
    pub entry_id: String,
    /// Acting user id, null for system-initiated events.
    pub actor_id: Option<String>,
    /// The role the actor was wearing when acting.
    pub actor_active_role_id: Option<String>,
    /// Stable action identifier.
    pub action: String,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: Option<String>,
    /// Structured detail payload.
    pub details: Option<serde_json::Value>,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Recorded outcome.
    pub outcome: String,
    /// Error description for failure and error outcomes.
    pub error_message: Option<String>,
    /// Entry timestamp in RFC3339.
    pub created_at: String,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter.
    pub action: Option<String>,
    /// Optional actor filter.
    pub actor_id: Option<String>,
}

/// Repository port for reading the audit log.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists most recent audit entries.
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>>;
}
