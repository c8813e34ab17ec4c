pub mod dashboard;
pub mod history;
pub mod ledger;

pub use dashboard::DashboardAggregator;
pub use history::HistoryRecorder;
pub use ledger::{CreateTransactionInput, OrderLedger, TransactionPage};
