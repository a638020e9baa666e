//! Account orchestrator

use std::sync::Arc;

use async_trait::async_trait;

use super::models::{Account, AccountId};
use crate::error::{AppError, BALANCE_LIMIT_MESSAGE};
use crate::money::Money;
use crate::store::AccountStore;

/// Account operations as seen by the HTTP layer
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn create_account(
        &self,
        account_id: AccountId,
        initial_balance: Money,
    ) -> Result<Account, AppError>;

    async fn get_account(&self, account_id: AccountId) -> Result<Account, AppError>;
}

pub struct AccountService<A> {
    accounts: Arc<A>,
}

impl<A: AccountStore> AccountService<A> {
    pub fn new(accounts: Arc<A>) -> Self {
        Self { accounts }
    }
}

fn validate_account_id(account_id: AccountId) -> Result<(), AppError> {
    if account_id <= 0 {
        return Err(AppError::validation("Please provide a valid account number"));
    }
    Ok(())
}

#[async_trait]
impl<A: AccountStore> AccountApi for AccountService<A> {
    async fn create_account(
        &self,
        account_id: AccountId,
        initial_balance: Money,
    ) -> Result<Account, AppError> {
        validate_account_id(account_id)?;
        if initial_balance.is_negative() {
            return Err(AppError::validation("Initial balance cannot be negative"));
        }
        if initial_balance.exceeds_scale() {
            return Err(AppError::validation(
                "Initial balance can only have up to 2 decimal places (e.g., 100.50)",
            ));
        }
        if !initial_balance.is_storable() {
            return Err(AppError::validation(BALANCE_LIMIT_MESSAGE));
        }

        let account = self
            .accounts
            .create(account_id, initial_balance)
            .await
            .map_err(|e| AppError::from_store("creating account", e))?;

        tracing::info!(
            account_id,
            balance = %account.balance,
            "account created"
        );
        Ok(account)
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Account, AppError> {
        validate_account_id(account_id)?;
        self.accounts
            .get_by_id(account_id)
            .await
            .map_err(|e| AppError::from_store("reading account", e))
    }
}
