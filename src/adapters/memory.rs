//! In-memory implementation of both persistence ports.
//!
//! Useful for tests and local development. A single write lock is held across
//! every multi-step mutation, which gives the same all-or-nothing behaviour the
//! Postgres adapter gets from database transactions.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    DashboardStats, LineItem, NewHistoryEntry, NewTransaction, StatusHistoryEntry, Transaction,
    TransactionStatus, TransactionUpdate,
};
use crate::ports::{
    HistoryRepository, ListFilter, RepositoryError, RepositoryResult, TransactionRepository,
    TransitionOutcome,
};

#[derive(Default)]
struct State {
    next_id: i64,
    next_item_id: i64,
    next_history_id: i64,
    transactions: BTreeMap<i64, Stored>,
    history: Vec<StatusHistoryEntry>,
}

struct Stored {
    transaction: Transaction,
    deleted: bool,
}

impl State {
    fn live(&self, id: i64) -> RepositoryResult<&Transaction> {
        self.transactions
            .get(&id)
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.transaction)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    fn live_mut(&mut self, id: i64) -> RepositoryResult<&mut Transaction> {
        self.transactions
            .get_mut(&id)
            .filter(|stored| !stored.deleted)
            .map(|stored| &mut stored.transaction)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    fn push_history(&mut self, entry: &NewHistoryEntry) -> StatusHistoryEntry {
        self.next_history_id += 1;
        let stored = StatusHistoryEntry {
            id: self.next_history_id,
            transaction_id: entry.transaction_id,
            previous_status: entry.previous_status,
            new_status: entry.new_status,
            changed_by: entry.changed_by.clone(),
            reason: entry.reason.clone(),
            created_at: Utc::now(),
        };
        self.history.push(stored.clone());
        stored
    }
}

/// Shared in-memory store. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    fail_history_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent history write fail with a storage error.
    pub fn fail_history_writes(&self, fail: bool) {
        self.fail_history_writes.store(fail, Ordering::SeqCst);
    }

    fn history_write_guard(&self) -> RepositoryResult<()> {
        if self.fail_history_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(
                "history write failed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;

        if state
            .transactions
            .values()
            .any(|stored| stored.transaction.tracking_code == tx.tracking_code)
        {
            return Err(RepositoryError::Conflict(format!(
                "tracking code {} already exists",
                tx.tracking_code
            )));
        }

        state.next_id += 1;
        let id = state.next_id;

        let mut items = Vec::with_capacity(tx.items.len());
        for item in &tx.items {
            state.next_item_id += 1;
            items.push(LineItem {
                id: state.next_item_id,
                transaction_id: id,
                service_type: item.service_type.clone(),
                item_name: item.item_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.clone(),
                subtotal: item.subtotal(),
            });
        }

        let now = Utc::now();
        let transaction = Transaction {
            id,
            tracking_code: tx.tracking_code.clone(),
            customer_name: tx.customer_name.clone(),
            customer_phone: tx.customer_phone.clone(),
            customer_address: tx.customer_address.clone(),
            notes: tx.notes.clone(),
            status: tx.status(),
            total: tx.total.clone(),
            is_paid: false,
            pickup_date: tx.pickup_date,
            completed_at: None,
            operator_id: tx.operator_id,
            items,
            created_at: now,
            updated_at: now,
        };

        state.transactions.insert(
            id,
            Stored {
                transaction: transaction.clone(),
                deleted: false,
            },
        );
        Ok(transaction)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        let state = self.state.read().await;
        state.live(id).cloned()
    }

    async fn get_by_code(&self, code: &str) -> RepositoryResult<Transaction> {
        let state = self.state.read().await;
        state
            .transactions
            .values()
            .find(|stored| !stored.deleted && stored.transaction.tracking_code == code)
            .map(|stored| stored.transaction.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", code)))
    }

    async fn list(&self, filter: &ListFilter) -> RepositoryResult<(Vec<Transaction>, i64)> {
        let state = self.state.read().await;
        let matching: Vec<&Transaction> = state
            .transactions
            .values()
            .rev()
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.transaction)
            .filter(|tx| filter.status.map_or(true, |s| tx.status == s))
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_fields(
        &self,
        id: i64,
        update: &TransactionUpdate,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        let tx = state.live_mut(id)?;
        update.apply_to(tx);
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn soft_delete(&self, id: i64) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        state.live(id)?;
        if let Some(stored) = state.transactions.get_mut(&id) {
            stored.deleted = true;
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: i64,
        next: TransactionStatus,
        actor: &str,
        reason: &str,
    ) -> RepositoryResult<TransitionOutcome> {
        let mut state = self.state.write().await;
        let current = state.live(id)?.status;
        current.transition_to(next)?;

        // Nothing is mutated until every step is known to succeed.
        self.history_write_guard()?;

        let entry = state.push_history(&NewHistoryEntry::transition(
            id, current, next, actor, reason,
        ));
        let tx = state.live_mut(id)?;
        tx.status = next;
        tx.updated_at = entry.created_at;
        if next == TransactionStatus::Completed {
            tx.completed_at = Some(entry.created_at);
        }

        Ok(TransitionOutcome {
            transaction: tx.clone(),
            entry,
        })
    }

    async fn dashboard_stats(&self) -> RepositoryResult<DashboardStats> {
        let state = self.state.read().await;
        let mut stats = DashboardStats::default();

        for tx in state
            .transactions
            .values()
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.transaction)
        {
            match tx.status {
                TransactionStatus::Queued => stats.queued += 1,
                TransactionStatus::Washing => stats.washing += 1,
                TransactionStatus::Ironing => stats.ironing += 1,
                TransactionStatus::ReadyForPickup => stats.ready_for_pickup += 1,
                TransactionStatus::Completed => stats.completed += 1,
            }
            stats.total += 1;
            if tx.is_paid {
                stats.total_revenue += &tx.total;
            } else {
                stats.unpaid_amount += &tx.total;
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl HistoryRepository for MemoryStore {
    async fn append(&self, entry: &NewHistoryEntry) -> RepositoryResult<StatusHistoryEntry> {
        self.history_write_guard()?;
        let mut state = self.state.write().await;
        if !state.transactions.contains_key(&entry.transaction_id) {
            return Err(RepositoryError::NotFound(format!(
                "transaction {}",
                entry.transaction_id
            )));
        }
        Ok(state.push_history(entry))
    }

    async fn list_for(&self, transaction_id: i64) -> RepositoryResult<Vec<StatusHistoryEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<StatusHistoryEntry> = state
            .history
            .iter()
            .filter(|entry| entry.transaction_id == transaction_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewLineItem;
    use bigdecimal::BigDecimal;

    fn new_tx(code: &str) -> NewTransaction {
        NewTransaction {
            tracking_code: code.to_string(),
            customer_name: "Budi".to_string(),
            customer_phone: "0813".to_string(),
            customer_address: String::new(),
            notes: String::new(),
            total: BigDecimal::from(5000),
            pickup_date: None,
            operator_id: 1,
            items: vec![NewLineItem {
                service_type: "regular".to_string(),
                item_name: "shirt".to_string(),
                quantity: 1,
                unit_price: BigDecimal::from(5000),
            }],
        }
    }

    #[tokio::test]
    async fn duplicate_tracking_code_is_a_conflict() {
        let store = MemoryStore::new();
        store.insert(&new_tx("CHRN-20250101-AAAAA")).await.unwrap();
        let err = store.insert(&new_tx("CHRN-20250101-AAAAA")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_hidden() {
        let store = MemoryStore::new();
        let tx = store.insert(&new_tx("CHRN-20250101-BBBBB")).await.unwrap();
        store.soft_delete(tx.id).await.unwrap();

        assert!(matches!(
            store.get_by_id(tx.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            store.soft_delete(tx.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        let (page, total) = store
            .list(&ListFilter {
                status: None,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn failed_history_write_leaves_status_untouched() {
        let store = MemoryStore::new();
        let tx = store.insert(&new_tx("CHRN-20250101-CCCCC")).await.unwrap();

        store.fail_history_writes(true);
        let err = store
            .transition_status(tx.id, TransactionStatus::Washing, "op", "")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));

        let reloaded = store.get_by_id(tx.id).await.unwrap();
        assert_eq!(reloaded.status, TransactionStatus::Queued);
        assert!(store.list_for(tx.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryStore::new();
        let first = store.insert(&new_tx("CHRN-20250101-DDDDD")).await.unwrap();
        let second = store.insert(&new_tx("CHRN-20250101-EEEEE")).await.unwrap();

        let (page, total) = store
            .list(&ListFilter {
                status: None,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, second.id);
        assert_eq!(page[1].id, first.id);
    }
}
