//! Storage adapters implementing the persistence ports.

pub mod memory;
pub mod postgres_history_repository;
pub mod postgres_transaction_repository;

pub use memory::MemoryStore;
pub use postgres_history_repository::PostgresHistoryRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;

use crate::domain::TransactionStatus;
use crate::ports::{RepositoryError, RepositoryResult};

pub(crate) fn parse_status(raw: &str) -> RepositoryResult<TransactionStatus> {
    raw.parse()
        .map_err(|e: crate::domain::UnknownStatus| RepositoryError::Database(e.to_string()))
}
