//! Postgres implementation of HistoryRepository.
//!
//! `insert_entry` is the only statement that writes `transaction_history`; the
//! transaction repository reuses it inside its own unit of work.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};

use super::parse_status;
use crate::domain::{NewHistoryEntry, StatusHistoryEntry};
use crate::ports::{HistoryRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresHistoryRepository {
    pool: PgPool,
}

impl PostgresHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_entry(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &NewHistoryEntry,
) -> RepositoryResult<StatusHistoryEntry> {
    let row = sqlx::query_as::<_, HistoryRow>(
        r#"
        INSERT INTO transaction_history (
            transaction_id, previous_status, new_status, changed_by, reason
        ) VALUES ($1, $2, $3, $4, $5)
        RETURNING id, transaction_id, previous_status, new_status, changed_by, reason, created_at
        "#,
    )
    .bind(entry.transaction_id)
    .bind(entry.previous_status.map(|s| s.as_str()))
    .bind(entry.new_status.as_str())
    .bind(&entry.changed_by)
    .bind(&entry.reason)
    .fetch_one(&mut **executor)
    .await
    .map_err(RepositoryError::from)?;

    row.into_domain()
}

#[async_trait]
impl HistoryRepository for PostgresHistoryRepository {
    async fn append(&self, entry: &NewHistoryEntry) -> RepositoryResult<StatusHistoryEntry> {
        let mut tx = self.pool.begin().await?;
        let inserted = insert_entry(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_for(&self, transaction_id: i64) -> RepositoryResult<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, transaction_id, previous_status, new_status, changed_by, reason, created_at
            FROM transaction_history
            WHERE transaction_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(HistoryRow::into_domain).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    transaction_id: i64,
    previous_status: Option<String>,
    new_status: String,
    changed_by: String,
    reason: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl HistoryRow {
    fn into_domain(self) -> RepositoryResult<StatusHistoryEntry> {
        Ok(StatusHistoryEntry {
            id: self.id,
            transaction_id: self.transaction_id,
            previous_status: self.previous_status.as_deref().map(parse_status).transpose()?,
            new_status: parse_status(&self.new_status)?,
            changed_by: self.changed_by,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}
