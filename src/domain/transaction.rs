//! Laundry order entity, its line items and status history records.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::status::TransactionStatus;

pub const SYSTEM_ACTOR: &str = "system";
pub const CREATION_REASON: &str = "Transaction created";

/// One customer order as currently stored.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub tracking_code: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub notes: String,
    pub status: TransactionStatus,
    pub total: BigDecimal,
    pub is_paid: bool,
    pub pickup_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub operator_id: i64,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    pub id: i64,
    pub transaction_id: i64,
    pub service_type: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub subtotal: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub service_type: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

impl NewLineItem {
    pub fn subtotal(&self) -> BigDecimal {
        BigDecimal::from(self.quantity) * &self.unit_price
    }
}

/// A validated order ready to be persisted in the Queued state.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub tracking_code: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub notes: String,
    pub total: BigDecimal,
    pub pickup_date: Option<NaiveDate>,
    pub operator_id: i64,
    pub items: Vec<NewLineItem>,
}

impl NewTransaction {
    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::Queued
    }
}

/// Plain field replacement; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub notes: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub is_paid: Option<bool>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.customer_phone.is_none()
            && self.customer_address.is_none()
            && self.notes.is_none()
            && self.pickup_date.is_none()
            && self.is_paid.is_none()
    }

    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(name) = &self.customer_name {
            tx.customer_name = name.clone();
        }
        if let Some(phone) = &self.customer_phone {
            tx.customer_phone = phone.clone();
        }
        if let Some(address) = &self.customer_address {
            tx.customer_address = address.clone();
        }
        if let Some(notes) = &self.notes {
            tx.notes = notes.clone();
        }
        if let Some(date) = self.pickup_date {
            tx.pickup_date = Some(date);
        }
        if let Some(paid) = self.is_paid {
            tx.is_paid = paid;
        }
    }
}

/// Immutable audit record of one status change.
#[derive(Debug, Clone, Serialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub transaction_id: i64,
    pub previous_status: Option<TransactionStatus>,
    pub new_status: TransactionStatus,
    pub changed_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub transaction_id: i64,
    pub previous_status: Option<TransactionStatus>,
    pub new_status: TransactionStatus,
    pub changed_by: String,
    pub reason: String,
}

impl NewHistoryEntry {
    /// The entry written when an order is first queued.
    pub fn creation(transaction_id: i64) -> Self {
        Self {
            transaction_id,
            previous_status: None,
            new_status: TransactionStatus::Queued,
            changed_by: SYSTEM_ACTOR.to_string(),
            reason: CREATION_REASON.to_string(),
        }
    }

    pub fn transition(
        transaction_id: i64,
        previous: TransactionStatus,
        next: TransactionStatus,
        changed_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            previous_status: Some(previous),
            new_status: next,
            changed_by: changed_by.into(),
            reason: reason.into(),
        }
    }
}

/// Operator view: the order together with its ordered audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub status_history: Vec<StatusHistoryEntry>,
}

/// Public tracking view. Carries no operator identity and no internal ids.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub tracking_code: String,
    pub customer_name: String,
    pub status: TransactionStatus,
    pub total: BigDecimal,
    pub is_paid: bool,
    pub pickup_date: Option<NaiveDate>,
    pub items_count: usize,
    pub status_history: Vec<TrackingStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingStep {
    pub previous_status: Option<TransactionStatus>,
    pub new_status: TransactionStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionDetail> for TrackingView {
    fn from(detail: TransactionDetail) -> Self {
        let tx = detail.transaction;
        Self {
            items_count: tx.items.len(),
            tracking_code: tx.tracking_code,
            customer_name: tx.customer_name,
            status: tx.status,
            total: tx.total,
            is_paid: tx.is_paid,
            pickup_date: tx.pickup_date,
            status_history: detail
                .status_history
                .into_iter()
                .map(|entry| TrackingStep {
                    previous_status: entry.previous_status,
                    new_status: entry.new_status,
                    reason: entry.reason,
                    created_at: entry.created_at,
                })
                .collect(),
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub queued: i64,
    pub washing: i64,
    pub ironing: i64,
    pub ready_for_pickup: i64,
    pub completed: i64,
    pub total: i64,
    pub total_revenue: BigDecimal,
    pub unpaid_amount: BigDecimal,
}

impl DashboardStats {
    pub fn count_for(&self, status: TransactionStatus) -> i64 {
        match status {
            TransactionStatus::Queued => self.queued,
            TransactionStatus::Washing => self.washing,
            TransactionStatus::Ironing => self.ironing,
            TransactionStatus::ReadyForPickup => self.ready_for_pickup,
            TransactionStatus::Completed => self.completed,
        }
    }
}
