//! PostgreSQL ledger store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::LedgerEntry;
use crate::account::AccountId;
use crate::db::PgUnitOfWork;
use crate::error::StoreError;
use crate::money::Money;
use crate::store::LedgerStore;

/// Ledger repository backed by the `transactions` table
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Entries touching an account, newest first
    pub async fn list_for_account(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, source_account_id, destination_account_id, amount, created_at
               FROM transactions
               WHERE source_account_id = $1 OR destination_account_id = $1
               ORDER BY id DESC
               LIMIT $2"#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.iter()
            .map(|row| {
                let amount: rust_decimal::Decimal =
                    row.try_get("amount").map_err(StoreError::from_sqlx)?;
                Ok(LedgerEntry {
                    id: row.try_get("id").map_err(StoreError::from_sqlx)?,
                    source_account_id: row
                        .try_get("source_account_id")
                        .map_err(StoreError::from_sqlx)?,
                    destination_account_id: row
                        .try_get("destination_account_id")
                        .map_err(StoreError::from_sqlx)?,
                    amount: Money::from(amount),
                    created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Unit = PgUnitOfWork;

    async fn append(
        &self,
        unit: &mut PgUnitOfWork,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, StoreError> {
        let row = sqlx::query(
            r#"INSERT INTO transactions (source_account_id, destination_account_id, amount)
               VALUES ($1, $2, $3)
               RETURNING id, created_at"#,
        )
        .bind(source_account_id)
        .bind(destination_account_id)
        .bind(amount.as_decimal())
        .fetch_one(unit.conn())
        .await
        .map_err(StoreError::from_sqlx)?;

        let id: i64 = row.try_get("id").map_err(StoreError::from_sqlx)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(StoreError::from_sqlx)?;

        Ok(LedgerEntry {
            id,
            source_account_id,
            destination_account_id,
            amount,
            created_at,
        })
    }
}
