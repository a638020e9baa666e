//! Store capability sets
//!
//! The transfer orchestrator is written against these traits only, so the
//! PostgreSQL stores and the in-memory double are interchangeable.
//!
//! # Unit of work
//!
//! A [`UnitOfWork`] scopes account locks, balance updates and the ledger
//! append so they apply together or not at all. `commit` and `rollback`
//! consume the unit, and dropping an uncommitted unit rolls it back and
//! releases its locks. That covers error paths, panics and cancelled futures
//! alike.

pub mod memory;

pub use memory::{MemoryStore, MemoryUnit};

use async_trait::async_trait;

use crate::account::{Account, AccountId};
use crate::error::StoreError;
use crate::ledger::LedgerEntry;
use crate::money::Money;

#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UnitOfWorkProvider: Send + Sync {
    type Unit: UnitOfWork;

    /// Open a new unit of work.
    async fn begin(&self) -> Result<Self::Unit, StoreError>;
}

/// Durable account rows.
#[async_trait]
pub trait AccountStore: Send + Sync {
    type Unit: UnitOfWork;

    /// Insert a new account. An existing id yields [`StoreError::Duplicate`].
    async fn create(&self, account_id: AccountId, balance: Money) -> Result<Account, StoreError>;

    /// Plain committed read, takes no lock.
    async fn get_by_id(&self, account_id: AccountId) -> Result<Account, StoreError>;

    /// Read and exclusively lock the row for the lifetime of `unit`.
    async fn get_by_id_for_update(
        &self,
        unit: &mut Self::Unit,
        account_id: AccountId,
    ) -> Result<Account, StoreError>;

    /// Set the balance inside `unit`. Zero matched rows is [`StoreError::NotFound`].
    async fn update_balance(
        &self,
        unit: &mut Self::Unit,
        account_id: AccountId,
        balance: Money,
    ) -> Result<(), StoreError>;
}

/// Append-only ledger rows.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Unit: UnitOfWork;

    async fn append(
        &self,
        unit: &mut Self::Unit,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, StoreError>;
}

/// Liveness check for the backing store.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}
