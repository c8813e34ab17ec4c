use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::fmt;

use crate::domain::NewLineItem;

pub const CUSTOMER_NAME_MAX_LEN: usize = 255;
pub const CUSTOMER_PHONE_MAX_LEN: usize = 32;
pub const SERVICE_TYPE_MAX_LEN: usize = 50;
pub const ITEM_NAME_MAX_LEN: usize = 100;
pub const ACTOR_MAX_LEN: usize = 255;
pub const PICKUP_DATE_FORMAT: &str = "%Y-%m-%d";
/// Money columns are NUMERIC(14, 2).
pub const MONEY_SCALE: i64 = 2;
pub const MONEY_INTEGER_DIGITS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Sanitizes, then checks presence and length. Returns the cleaned value.
pub fn required_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

/// Rejects amounts the money columns cannot hold exactly: more than two
/// decimal places, or a magnitude of 10^12 or more.
pub fn validate_money_scale(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount.with_scale(MONEY_SCALE) != *amount {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} decimal places", MONEY_SCALE),
        ));
    }

    let limit = BigDecimal::from(10_i64.pow(MONEY_INTEGER_DIGITS));
    if amount.abs() >= limit {
        return Err(ValidationError::new(field, format!("must be less than {}", limit)));
    }

    Ok(())
}

pub fn validate_non_negative_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(())
}

pub fn validate_quantity(quantity: i32) -> ValidationResult {
    if quantity <= 0 {
        return Err(ValidationError::new("quantity", "must be greater than zero"));
    }

    Ok(())
}

/// Empty input means "no pickup date".
pub fn parse_pickup_date(raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    NaiveDate::parse_from_str(raw, PICKUP_DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::new("pickup_date", "must use the YYYY-MM-DD format"))
}

/// Checks every line item and returns the sum of their subtotals.
pub fn validate_line_items(items: &[NewLineItem]) -> Result<BigDecimal, ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new("items", "must contain at least one item"));
    }

    let mut sum = BigDecimal::from(0);
    for item in items {
        validate_required("service_type", &item.service_type)?;
        validate_max_len("service_type", &item.service_type, SERVICE_TYPE_MAX_LEN)?;
        validate_required("item_name", &item.item_name)?;
        validate_max_len("item_name", &item.item_name, ITEM_NAME_MAX_LEN)?;
        validate_quantity(item.quantity)?;
        validate_non_negative_amount("unit_price", &item.unit_price)?;
        validate_money_scale("unit_price", &item.unit_price)?;

        let subtotal = item.subtotal();
        validate_money_scale("subtotal", &subtotal)?;
        sum += subtotal;
    }

    validate_money_scale("total", &sum)?;
    Ok(sum)
}

/// A supplied total must equal the line-item sum; a missing one takes the sum.
pub fn resolve_total(
    supplied: Option<BigDecimal>,
    items_sum: BigDecimal,
) -> Result<BigDecimal, ValidationError> {
    let total = match supplied {
        Some(total) if total != items_sum => {
            return Err(ValidationError::new(
                "total",
                format!("must equal the sum of item subtotals ({})", items_sum),
            ));
        }
        Some(total) => total,
        None => items_sum,
    };
    validate_positive_amount("total", &total)?;
    validate_money_scale("total", &total)?;
    Ok(total)
}
