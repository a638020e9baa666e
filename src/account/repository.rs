//! PostgreSQL account store

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::models::{Account, AccountId};
use crate::db::PgUnitOfWork;
use crate::error::StoreError;
use crate::money::Money;
use crate::store::AccountStore;

/// Account repository backed by the `accounts` table
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let balance: Decimal = row.try_get("balance").map_err(StoreError::from_sqlx)?;
    Ok(Account {
        account_id: row.try_get("account_id").map_err(StoreError::from_sqlx)?,
        balance: Money::from(balance),
        created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(StoreError::from_sqlx)?,
    })
}

fn not_found(account_id: AccountId) -> StoreError {
    StoreError::NotFound {
        entity: "account",
        id: account_id,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    type Unit = PgUnitOfWork;

    async fn create(&self, account_id: AccountId, balance: Money) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"INSERT INTO accounts (account_id, balance)
               VALUES ($1, $2)
               RETURNING account_id, balance, created_at, updated_at"#,
        )
        .bind(account_id)
        .bind(balance.as_decimal())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx_insert(e, "account", account_id))?;

        row_to_account(&row)
    }

    async fn get_by_id(&self, account_id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"SELECT account_id, balance, created_at, updated_at
               FROM accounts WHERE account_id = $1"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(not_found(account_id)),
        }
    }

    async fn get_by_id_for_update(
        &self,
        unit: &mut PgUnitOfWork,
        account_id: AccountId,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"SELECT account_id, balance, created_at, updated_at
               FROM accounts WHERE account_id = $1
               FOR UPDATE"#,
        )
        .bind(account_id)
        .fetch_optional(unit.conn())
        .await
        .map_err(StoreError::from_sqlx)?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(not_found(account_id)),
        }
    }

    async fn update_balance(
        &self,
        unit: &mut PgUnitOfWork,
        account_id: AccountId,
        balance: Money,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE accounts SET balance = $1, updated_at = NOW()
               WHERE account_id = $2"#,
        )
        .bind(balance.as_decimal())
        .bind(account_id)
        .execute(unit.conn())
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(not_found(account_id));
        }
        Ok(())
    }
}
