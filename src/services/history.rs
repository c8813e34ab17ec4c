use std::sync::Arc;

use crate::domain::{NewHistoryEntry, StatusHistoryEntry};
use crate::error::AppError;
use crate::ports::HistoryRepository;

/// Append-only audit log of status changes.
#[derive(Clone)]
pub struct HistoryRecorder {
    repository: Arc<dyn HistoryRepository>,
}

impl HistoryRecorder {
    pub fn new(repository: Arc<dyn HistoryRepository>) -> Self {
        Self { repository }
    }

    /// Storage failures are returned; the caller decides what to do with them.
    pub async fn append(&self, entry: &NewHistoryEntry) -> Result<StatusHistoryEntry, AppError> {
        let stored = self.repository.append(entry).await?;
        tracing::debug!(
            transaction_id = stored.transaction_id,
            previous = ?stored.previous_status,
            new = %stored.new_status,
            "History entry recorded"
        );
        Ok(stored)
    }

    /// Entries for one order, oldest first.
    pub async fn list_for(&self, transaction_id: i64) -> Result<Vec<StatusHistoryEntry>, AppError> {
        Ok(self.repository.list_for(transaction_id).await?)
    }
}
