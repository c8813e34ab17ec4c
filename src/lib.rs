pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::adapters::{MemoryStore, PostgresHistoryRepository, PostgresTransactionRepository};
use crate::middleware::AuthKeys;
use crate::ports::{HistoryRepository, TransactionRepository};
use crate::services::{DashboardAggregator, HistoryRecorder, OrderLedger};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<OrderLedger>,
    pub dashboard: Arc<DashboardAggregator>,
    pub auth: Arc<AuthKeys>,
    /// Present when backed by Postgres; used by the health check.
    pub db: Option<sqlx::PgPool>,
}

impl AppState {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        history: Arc<dyn HistoryRepository>,
        auth: AuthKeys,
    ) -> Self {
        Self {
            ledger: Arc::new(OrderLedger::new(
                Arc::clone(&transactions),
                HistoryRecorder::new(history),
            )),
            dashboard: Arc::new(DashboardAggregator::new(transactions)),
            auth: Arc::new(auth),
            db: None,
        }
    }

    pub fn postgres(pool: sqlx::PgPool, auth: AuthKeys) -> Self {
        let mut state = Self::new(
            Arc::new(PostgresTransactionRepository::new(pool.clone())),
            Arc::new(PostgresHistoryRepository::new(pool.clone())),
            auth,
        );
        state.db = Some(pool);
        state
    }

    pub fn in_memory(store: MemoryStore, auth: AuthKeys) -> Self {
        Self::new(Arc::new(store.clone()), Arc::new(store), auth)
    }
}

pub fn create_app(state: AppState) -> Router {
    use handlers::transactions;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/track/:code", get(handlers::tracking::track_transaction))
        .route(
            "/api/v1/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route(
            "/api/v1/transactions/:id",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route(
            "/api/v1/transactions/:id/status",
            patch(transactions::update_status),
        )
        .route(
            "/api/v1/transactions/:id/history",
            get(transactions::transaction_history),
        )
        .route("/api/v1/dashboard/stats", get(handlers::dashboard::stats))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
