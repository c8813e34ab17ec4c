use std::sync::Arc;

use crate::domain::DashboardStats;
use crate::error::AppError;
use crate::ports::TransactionRepository;

/// Read-only metrics over the current ledger state. Nothing is cached.
#[derive(Clone)]
pub struct DashboardAggregator {
    transactions: Arc<dyn TransactionRepository>,
}

impl DashboardAggregator {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    pub async fn stats(&self) -> Result<DashboardStats, AppError> {
        Ok(self.transactions.dashboard_stats().await?)
    }
}
