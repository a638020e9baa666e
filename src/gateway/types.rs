//! Request and response bodies
//!
//! Monetary fields are exact decimals. Requests may send them as JSON strings
//! (`"10.50"`) or JSON integers (`10`). Fractional JSON numbers (`10.5`) are
//! rejected with the invalid-format error because they decode through a
//! binary float first. Responses always carry strings with two decimals.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountId};
use crate::error::AppError;
use crate::ledger::LedgerEntry;
use crate::money::Money;

pub const INVALID_BODY_MESSAGE: &str =
    "Invalid request format. Please check your input and try again";
pub const INVALID_ACCOUNT_ID_MESSAGE: &str =
    "Invalid account ID. Please provide a valid account number";

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub account_id: AccountId,
    #[serde(default)]
    pub initial_balance: Money,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Money,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account_id: AccountId,
    pub balance: Money,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.account_id,
            balance: account.balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: i64,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for TransactionResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            transaction_id: entry.id,
            source_account_id: entry.source_account_id,
            destination_account_id: entry.destination_account_id,
            amount: entry.amount,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Error mapping
// ============================================================================

/// HTTP form of an [`AppError`]
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                code: "VALIDATION_ERROR".to_string(),
                message: message.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        if let AppError::Internal(detail) = &e {
            tracing::error!(error = %detail, "unhandled error");
        }
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            body: ErrorResponse {
                code: e.code().to_string(),
                message: e.public_message(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_account_balance_defaults_to_zero() {
        let req: CreateAccountRequest = serde_json::from_str(r#"{"account_id": 4}"#).unwrap();
        assert_eq!(req.account_id, 4);
        assert_eq!(req.initial_balance, Money::ZERO);
    }

    #[test]
    fn test_transaction_request_rejects_float_amount() {
        let result: Result<CreateTransactionRequest, _> = serde_json::from_str(
            r#"{"source_account_id": 1, "destination_account_id": 2, "amount": 10.5}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_api_error_from_app_error() {
        let err = ApiError::from(AppError::InsufficientBalance { account_id: 1 });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body.code, "INSUFFICIENT_BALANCE");

        let err = ApiError::from(AppError::Internal("pool timed out".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.message, "internal server error");
    }

    #[test]
    fn test_account_response_shape() {
        let json = serde_json::to_value(AccountResponse {
            account_id: 1,
            balance: Money::from_cents(6000),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"account_id": 1, "balance": "60.00"}));
    }
}
