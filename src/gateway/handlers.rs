//! Route handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::state::AppState;
use super::types::{
    AccountResponse, ApiError, CreateAccountRequest, CreateTransactionRequest, HealthResponse,
    INVALID_ACCOUNT_ID_MESSAGE, INVALID_BODY_MESSAGE, TransactionResponse,
};
use crate::account::AccountId;

/// POST /accounts
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected account body");
        ApiError::bad_request(INVALID_BODY_MESSAGE)
    })?;

    let account = state
        .accounts
        .create_account(req.account_id, req.initial_balance)
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET /accounts/{account_id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    account_id: Result<Path<AccountId>, PathRejection>,
) -> Result<Json<AccountResponse>, ApiError> {
    let Path(account_id) =
        account_id.map_err(|_| ApiError::bad_request(INVALID_ACCOUNT_ID_MESSAGE))?;

    let account = state.accounts.get_account(account_id).await?;
    Ok(Json(account.into()))
}

/// POST /transactions
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected transaction body");
        ApiError::bad_request(INVALID_BODY_MESSAGE)
    })?;

    let entry = state
        .transfers
        .transfer_within(
            state.request_timeout,
            req.source_account_id,
            req.destination_account_id,
            req.amount,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// GET /health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.health.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                version: crate::VERSION.to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!("[HEALTH] store ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    version: crate::VERSION.to_string(),
                }),
            )
        }
    }
}
