//! Order ledger: owns the order lifecycle and enforces the status state machine.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use super::history::HistoryRecorder;
use crate::domain::tracking_code;
use crate::domain::{
    NewHistoryEntry, NewLineItem, NewTransaction, Operator, StatusHistoryEntry, TrackingView,
    Transaction, TransactionDetail, TransactionStatus, TransactionUpdate,
};
use crate::error::AppError;
use crate::ports::{ListFilter, RepositoryError, TransactionRepository, TransitionOutcome};
use crate::validation::{
    self, ACTOR_MAX_LEN, CUSTOMER_NAME_MAX_LEN, CUSTOMER_PHONE_MAX_LEN,
};

/// Insert attempts before a tracking-code collision is reported as a conflict.
pub const MAX_CODE_ATTEMPTS: u32 = 3;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub notes: String,
    pub items: Vec<NewLineItem>,
    /// When present it must equal the sum of item subtotals.
    pub total: Option<BigDecimal>,
    pub pickup_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub data: Vec<Transaction>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

pub struct OrderLedger {
    transactions: Arc<dyn TransactionRepository>,
    history: HistoryRecorder,
}

impl OrderLedger {
    pub fn new(transactions: Arc<dyn TransactionRepository>, history: HistoryRecorder) -> Self {
        Self {
            transactions,
            history,
        }
    }

    /// Creates an order in the Queued state and records its creation entry.
    ///
    /// The creation entry is best-effort: if it cannot be written the order
    /// still exists and the failure is only logged.
    pub async fn create_transaction(
        &self,
        input: CreateTransactionInput,
        operator: &Operator,
    ) -> Result<TransactionDetail, AppError> {
        let customer_name =
            validation::required_text("customer_name", &input.customer_name, CUSTOMER_NAME_MAX_LEN)?;
        let customer_phone = validation::required_text(
            "customer_phone",
            &input.customer_phone,
            CUSTOMER_PHONE_MAX_LEN,
        )?;
        let items = input
            .items
            .into_iter()
            .map(|item| NewLineItem {
                service_type: validation::sanitize_string(&item.service_type),
                item_name: validation::sanitize_string(&item.item_name),
                ..item
            })
            .collect::<Vec<_>>();
        let items_sum = validation::validate_line_items(&items)?;
        let total = validation::resolve_total(input.total, items_sum)?;

        let mut new_tx = NewTransaction {
            tracking_code: String::new(),
            customer_name,
            customer_phone,
            customer_address: validation::sanitize_string(&input.customer_address),
            notes: input.notes.trim().to_string(),
            total,
            pickup_date: input.pickup_date,
            operator_id: operator.id,
            items,
        };

        let mut attempt = 1;
        let transaction = loop {
            new_tx.tracking_code = tracking_code::generate_code();
            match self.transactions.insert(&new_tx).await {
                Ok(tx) => break tx,
                Err(RepositoryError::Conflict(detail)) if attempt < MAX_CODE_ATTEMPTS => {
                    tracing::warn!(
                        tracking_code = %new_tx.tracking_code,
                        attempt,
                        detail = %detail,
                        "Tracking code collision, regenerating"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            transaction_id = transaction.id,
            tracking_code = %transaction.tracking_code,
            operator = %operator.username,
            total = %transaction.total,
            "Transaction created"
        );

        let status_history = match self
            .history
            .append(&NewHistoryEntry::creation(transaction.id))
            .await
        {
            Ok(entry) => vec![entry],
            Err(e) => {
                tracing::error!(
                    transaction_id = transaction.id,
                    error = %e,
                    "Failed to record creation history"
                );
                Vec::new()
            }
        };

        Ok(TransactionDetail {
            transaction,
            status_history,
        })
    }

    /// Moves an order to `next` if the transition table allows it from the
    /// order's current status. The status change and its history entry are
    /// committed together.
    pub async fn transition_status(
        &self,
        id: i64,
        next: TransactionStatus,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionOutcome, AppError> {
        let actor = validation::required_text("actor", actor, ACTOR_MAX_LEN)?;
        let reason = reason.trim();

        match self
            .transactions
            .transition_status(id, next, &actor, reason)
            .await
        {
            Ok(outcome) => {
                tracing::info!(
                    transaction_id = id,
                    previous = ?outcome.entry.previous_status,
                    new = %next,
                    actor = %actor,
                    "Transaction status changed"
                );
                Ok(outcome)
            }
            Err(RepositoryError::InvalidTransition(e)) => {
                tracing::warn!(
                    transaction_id = id,
                    current = %e.current,
                    attempted = %e.attempted,
                    "Rejected status transition"
                );
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<TransactionDetail, AppError> {
        let transaction = self.transactions.get_by_id(id).await?;
        let status_history = self.history.list_for(transaction.id).await?;
        Ok(TransactionDetail {
            transaction,
            status_history,
        })
    }

    /// Public lookup. Malformed codes are reported as not found without
    /// touching the store.
    pub async fn get_by_tracking_code(&self, code: &str) -> Result<TrackingView, AppError> {
        let code = code.trim();
        if !tracking_code::is_valid_format(code) {
            return Err(AppError::NotFound(format!("transaction {}", code)));
        }

        let transaction = self.transactions.get_by_code(code).await?;
        let status_history = self.history.list_for(transaction.id).await?;
        Ok(TrackingView::from(TransactionDetail {
            transaction,
            status_history,
        }))
    }

    /// `page` is 1-based; out-of-range paging values fall back to defaults.
    /// Pages past the end come back empty.
    pub async fn list(
        &self,
        status: Option<TransactionStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<TransactionPage, AppError> {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let filter = ListFilter {
            status,
            limit,
            offset: (page - 1).saturating_mul(limit),
        };
        let (data, total) = self.transactions.list(&filter).await?;

        Ok(TransactionPage {
            data,
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        })
    }

    /// Plain field replacement. Status is never touched here.
    pub async fn update_fields(
        &self,
        id: i64,
        update: TransactionUpdate,
    ) -> Result<Transaction, AppError> {
        if update.is_empty() {
            return Ok(self.transactions.get_by_id(id).await?);
        }

        let update = TransactionUpdate {
            customer_name: update
                .customer_name
                .map(|v| validation::required_text("customer_name", &v, CUSTOMER_NAME_MAX_LEN))
                .transpose()?,
            customer_phone: update
                .customer_phone
                .map(|v| validation::required_text("customer_phone", &v, CUSTOMER_PHONE_MAX_LEN))
                .transpose()?,
            customer_address: update
                .customer_address
                .map(|v| validation::sanitize_string(&v)),
            notes: update.notes.map(|v| v.trim().to_string()),
            ..update
        };

        let updated = self.transactions.update_fields(id, &update).await?;
        tracing::info!(transaction_id = id, is_paid = updated.is_paid, "Transaction updated");
        Ok(updated)
    }

    /// Soft delete. Line items and history go with the order.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.transactions.soft_delete(id).await?;
        tracing::info!(transaction_id = id, "Transaction deleted");
        Ok(())
    }

    pub async fn history(&self, id: i64) -> Result<Vec<StatusHistoryEntry>, AppError> {
        let transaction = self.transactions.get_by_id(id).await?;
        self.history.list_for(transaction.id).await
    }
}
