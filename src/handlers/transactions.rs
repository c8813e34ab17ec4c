use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{NewLineItem, TransactionStatus, TransactionUpdate};
use crate::error::AppError;
use crate::middleware::AuthenticatedOperator;
use crate::services::CreateTransactionInput;
use crate::validation::{parse_pickup_date, ValidationError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_address: String,
    #[serde(default)]
    pub notes: String,
    pub total: Option<BigDecimal>,
    pub pickup_date: Option<String>,
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub service_type: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

/// Status and total are deliberately absent: they only change through the
/// state machine or at creation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTransactionRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub notes: Option<String>,
    pub pickup_date: Option<String>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub new_status: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

fn parse_status(field: &'static str, raw: &str) -> Result<TransactionStatus, AppError> {
    raw.trim()
        .parse::<TransactionStatus>()
        .map_err(|e| ValidationError::new(field, e.to_string()).into())
}

fn optional_date(raw: Option<String>) -> Result<Option<chrono::NaiveDate>, AppError> {
    match raw {
        Some(raw) => Ok(parse_pickup_date(&raw)?),
        None => Ok(None),
    }
}

pub async fn create_transaction(
    State(state): State<AppState>,
    AuthenticatedOperator(operator): AuthenticatedOperator,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = CreateTransactionInput {
        customer_name: payload.customer_name,
        customer_phone: payload.customer_phone,
        customer_address: payload.customer_address,
        notes: payload.notes,
        total: payload.total,
        pickup_date: optional_date(payload.pickup_date)?,
        items: payload
            .items
            .into_iter()
            .map(|item| NewLineItem {
                service_type: item.service_type,
                item_name: item.item_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    };

    let detail = state.ledger.create_transaction(input, &operator).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedOperator(_operator): AuthenticatedOperator,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let status = match params.status.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_status("status", raw)?),
        _ => None,
    };

    let page = state.ledger.list(status, params.page, params.limit).await?;
    Ok(Json(page))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    AuthenticatedOperator(_operator): AuthenticatedOperator,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.ledger.get_by_id(id).await?;
    Ok(Json(detail))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    AuthenticatedOperator(operator): AuthenticatedOperator,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let update = TransactionUpdate {
        customer_name: payload.customer_name,
        customer_phone: payload.customer_phone,
        customer_address: payload.customer_address,
        notes: payload.notes,
        pickup_date: optional_date(payload.pickup_date)?,
        is_paid: payload.is_paid,
    };

    tracing::debug!(transaction_id = id, operator = %operator.username, "Updating transaction");
    let updated = state.ledger.update_fields(id, update).await?;
    Ok(Json(updated))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    AuthenticatedOperator(operator): AuthenticatedOperator,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.delete(id).await?;
    tracing::info!(transaction_id = id, operator = %operator.username, "Deleted by operator");
    Ok(Json(json!({ "id": id, "deleted": true })))
}

pub async fn update_status(
    State(state): State<AppState>,
    AuthenticatedOperator(operator): AuthenticatedOperator,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let next = parse_status("new_status", &payload.new_status)?;

    let outcome = state
        .ledger
        .transition_status(id, next, &operator.username, &payload.reason)
        .await?;

    Ok(Json(json!({
        "id": id,
        "status": outcome.transaction.status,
        "history_entry": outcome.entry,
    })))
}

pub async fn transaction_history(
    State(state): State<AppState>,
    AuthenticatedOperator(_operator): AuthenticatedOperator,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.ledger.history(id).await?;
    Ok(Json(history))
}
