use std::sync::Arc;

use crate::{AuditEntry, AuditRepository};

/// Best-effort writer for the append-only audit trail.
///
/// A failed write must never fail the action that triggered it; failures
/// are logged and swallowed.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: Arc<dyn AuditRepository>,
}

impl AuditRecorder {
    /// Creates a recorder from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Appends one audit entry, logging instead of propagating failures.
    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action.as_str();
        if let Err(error) = self.repository.append_entry(entry).await {
            tracing::warn!(action, %error, "failed to append audit entry");
        }
    }
}
