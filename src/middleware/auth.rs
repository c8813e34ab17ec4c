//! Operator authentication. Tokens are issued elsewhere; this module only
//! verifies the bearer token and exposes the operator it names.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::Operator;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Operator id.
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Operator, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Expired token".to_string())
                }
                _ => AppError::Unauthorized("Invalid credentials".to_string()),
            }
        })?;

        let id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

        Ok(Operator {
            id,
            username: data.claims.username,
        })
    }
}

/// Extractor for handlers that require a logged-in operator.
#[derive(Debug, Clone)]
pub struct AuthenticatedOperator(pub Operator);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedOperator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        let operator = state.auth.verify(token.trim()).map_err(|e| {
            tracing::warn!(error = %e, "Operator authentication failed");
            e
        })?;

        Ok(AuthenticatedOperator(operator))
    }
}
