//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use super::parse_status;
use super::postgres_history_repository::insert_entry;
use crate::domain::{
    DashboardStats, LineItem, NewHistoryEntry, NewTransaction, Transaction, TransactionStatus,
    TransactionUpdate,
};
use crate::ports::{
    ListFilter, RepositoryError, RepositoryResult, TransactionRepository, TransitionOutcome,
};

const TRANSACTION_COLUMNS: &str = "id, tracking_code, customer_name, customer_phone, \
    customer_address, notes, status, total, is_paid, pickup_date, completed_at, operator_id, \
    created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, ids: &[i64]) -> RepositoryResult<HashMap<i64, Vec<LineItem>>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, transaction_id, service_type, item_name, quantity, unit_price, subtotal
            FROM transaction_items
            WHERE transaction_id = ANY($1) AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut grouped: HashMap<i64, Vec<LineItem>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.transaction_id)
                .or_default()
                .push(row.into_domain());
        }
        Ok(grouped)
    }

    async fn with_items(&self, row: TransactionRow) -> RepositoryResult<Transaction> {
        let mut items = self.load_items(&[row.id]).await?;
        let own = items.remove(&row.id).unwrap_or_default();
        row.into_domain(own)
    }

    async fn fetch_one_where(&self, clause: &str, key: Key<'_>) -> RepositoryResult<Transaction> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE {} AND deleted_at IS NULL",
            TRANSACTION_COLUMNS, clause
        );
        let query = sqlx::query_as::<_, TransactionRow>(&sql);
        let query = match key {
            Key::Id(id) => query.bind(id),
            Key::Code(code) => query.bind(code),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", key)))?;

        self.with_items(row).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Key<'a> {
    Id(i64),
    Code(&'a str),
}

impl std::fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{}", id),
            Key::Code(code) => write!(f, "{}", code),
        }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO transactions (
                tracking_code, customer_name, customer_phone, customer_address, notes,
                status, total, pickup_date, operator_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(&tx.tracking_code)
            .bind(&tx.customer_name)
            .bind(&tx.customer_phone)
            .bind(&tx.customer_address)
            .bind(&tx.notes)
            .bind(tx.status().as_str())
            .bind(&tx.total)
            .bind(tx.pickup_date)
            .bind(tx.operator_id)
            .fetch_one(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;

        let mut items = Vec::with_capacity(tx.items.len());
        for item in &tx.items {
            let item_row = sqlx::query_as::<_, ItemRow>(
                r#"
                INSERT INTO transaction_items (
                    transaction_id, service_type, item_name, quantity, unit_price, subtotal
                ) VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, transaction_id, service_type, item_name, quantity, unit_price, subtotal
                "#,
            )
            .bind(row.id)
            .bind(&item.service_type)
            .bind(&item.item_name)
            .bind(item.quantity)
            .bind(&item.unit_price)
            .bind(item.subtotal())
            .fetch_one(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;
            items.push(item_row.into_domain());
        }

        db_tx.commit().await?;
        row.into_domain(items)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        self.fetch_one_where("id = $1", Key::Id(id)).await
    }

    async fn get_by_code(&self, code: &str) -> RepositoryResult<Transaction> {
        self.fetch_one_where("tracking_code = $1", Key::Code(code))
            .await
    }

    async fn list(&self, filter: &ListFilter) -> RepositoryResult<(Vec<Transaction>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)
            "#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;

        let transactions = rows
            .into_iter()
            .map(|row| {
                let own = items.remove(&row.id).unwrap_or_default();
                row.into_domain(own)
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok((transactions, total))
    }

    async fn update_fields(
        &self,
        id: i64,
        update: &TransactionUpdate,
    ) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            UPDATE transactions SET
                customer_name = COALESCE($2, customer_name),
                customer_phone = COALESCE($3, customer_phone),
                customer_address = COALESCE($4, customer_address),
                notes = COALESCE($5, notes),
                pickup_date = COALESCE($6, pickup_date),
                is_paid = COALESCE($7, is_paid),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(update.customer_name.as_deref())
            .bind(update.customer_phone.as_deref())
            .bind(update.customer_address.as_deref())
            .bind(update.notes.as_deref())
            .bind(update.pickup_date)
            .bind(update.is_paid)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;

        self.with_items(row).await
    }

    async fn soft_delete(&self, id: i64) -> RepositoryResult<()> {
        let mut db_tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE transactions SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            db_tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("transaction {}", id)));
        }

        sqlx::query(
            "UPDATE transaction_items SET deleted_at = NOW() WHERE transaction_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        db_tx.commit().await?;
        Ok(())
    }

    async fn transition_status(
        &self,
        id: i64,
        next: TransactionStatus,
        actor: &str,
        reason: &str,
    ) -> RepositoryResult<TransitionOutcome> {
        let mut db_tx = self.pool.begin().await?;

        // Row lock: a concurrent transition on the same order waits here and
        // then validates against the status this one committed.
        let current: Option<String> = sqlx::query_scalar(
            "SELECT status FROM transactions WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        let current = match current {
            Some(raw) => parse_status(&raw)?,
            None => {
                db_tx.rollback().await?;
                return Err(RepositoryError::NotFound(format!("transaction {}", id)));
            }
        };

        if let Err(e) = current.transition_to(next) {
            db_tx.rollback().await?;
            return Err(e.into());
        }

        let sql = format!(
            r#"
            UPDATE transactions SET
                status = $2,
                completed_at = CASE WHEN $3 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(next.as_str())
            .bind(next == TransactionStatus::Completed)
            .fetch_one(&mut *db_tx)
            .await
            .map_err(RepositoryError::from)?;

        let entry = insert_entry(
            &mut db_tx,
            &NewHistoryEntry::transition(id, current, next, actor, reason),
        )
        .await?;

        db_tx.commit().await?;

        let transaction = self.with_items(row).await?;
        Ok(TransitionOutcome { transaction, entry })
    }

    async fn dashboard_stats(&self) -> RepositoryResult<DashboardStats> {
        let row = sqlx::query_as::<_, DashboardRow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'washing') AS washing,
                COUNT(*) FILTER (WHERE status = 'ironing') AS ironing,
                COUNT(*) FILTER (WHERE status = 'ready_for_pickup') AS ready_for_pickup,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) AS total_count,
                COALESCE(SUM(total) FILTER (WHERE is_paid), 0) AS total_revenue,
                COALESCE(SUM(total) FILTER (WHERE NOT is_paid), 0) AS unpaid_amount
            FROM transactions
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(DashboardStats {
            queued: row.queued,
            washing: row.washing,
            ironing: row.ironing,
            ready_for_pickup: row.ready_for_pickup,
            completed: row.completed,
            total: row.total_count,
            total_revenue: row.total_revenue,
            unpaid_amount: row.unpaid_amount,
        })
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    tracking_code: String,
    customer_name: String,
    customer_phone: String,
    customer_address: String,
    notes: String,
    status: String,
    total: BigDecimal,
    is_paid: bool,
    pickup_date: Option<NaiveDate>,
    completed_at: Option<DateTime<Utc>>,
    operator_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self, items: Vec<LineItem>) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            tracking_code: self.tracking_code,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_address: self.customer_address,
            notes: self.notes,
            status: parse_status(&self.status)?,
            total: self.total,
            is_paid: self.is_paid,
            pickup_date: self.pickup_date,
            completed_at: self.completed_at,
            operator_id: self.operator_id,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    transaction_id: i64,
    service_type: String,
    item_name: String,
    quantity: i32,
    unit_price: BigDecimal,
    subtotal: BigDecimal,
}

impl ItemRow {
    fn into_domain(self) -> LineItem {
        LineItem {
            id: self.id,
            transaction_id: self.transaction_id,
            service_type: self.service_type,
            item_name: self.item_name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DashboardRow {
    queued: i64,
    washing: i64,
    ironing: i64,
    ready_for_pickup: i64,
    completed: i64,
    total_count: i64,
    total_revenue: BigDecimal,
    unpaid_amount: BigDecimal,
}
