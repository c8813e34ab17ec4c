//! Persistence ports. Services depend on these traits; adapters implement them.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    DashboardStats, NewHistoryEntry, NewTransaction, StatusHistoryEntry, Transaction,
    TransactionStatus, TransactionUpdate, TransitionError,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Listing parameters. `offset` is derived from the page by the caller.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<TransactionStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of a committed status change.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub transaction: Transaction,
    pub entry: StatusHistoryEntry,
}

/// Store of the mutable order state. Soft-deleted orders are invisible to
/// every method.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persists the order and its line items as one unit.
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction>;

    async fn get_by_code(&self, code: &str) -> RepositoryResult<Transaction>;

    async fn list(&self, filter: &ListFilter) -> RepositoryResult<(Vec<Transaction>, i64)>;

    async fn update_fields(&self, id: i64, update: &TransactionUpdate)
        -> RepositoryResult<Transaction>;

    async fn soft_delete(&self, id: i64) -> RepositoryResult<()>;

    /// Validates `next` against the status read under the same unit of work,
    /// then stores it and appends the history entry. Either both writes land
    /// or neither does.
    async fn transition_status(
        &self,
        id: i64,
        next: TransactionStatus,
        actor: &str,
        reason: &str,
    ) -> RepositoryResult<TransitionOutcome>;

    async fn dashboard_stats(&self) -> RepositoryResult<DashboardStats>;
}

/// Append-only audit log of status changes.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append(&self, entry: &NewHistoryEntry) -> RepositoryResult<StatusHistoryEntry>;

    /// Entries for one order, oldest first.
    async fn list_for(&self, transaction_id: i64) -> RepositoryResult<Vec<StatusHistoryEntry>>;
}
