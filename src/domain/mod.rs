//! Framework-agnostic domain types for laundry orders.

pub mod operator;
pub mod status;
pub mod tracking_code;
pub mod transaction;

pub use operator::Operator;
pub use status::{TransactionStatus, TransitionError, UnknownStatus};
pub use transaction::{
    DashboardStats, LineItem, NewHistoryEntry, NewLineItem, NewTransaction, StatusHistoryEntry,
    TrackingStep, TrackingView, Transaction, TransactionDetail, TransactionUpdate,
};
