//! In-memory store
//!
//! Implements every store capability without a database. Behaves like a
//! row-locking relational store:
//! - `get_by_id` reads the last committed row and never blocks
//! - `get_by_id_for_update` / `update_balance` take a per-row async lock that
//!   the unit holds until commit, rollback or drop
//! - writes are staged in the unit and become visible only on commit
//! - ledger ids come from a sequence at append time, so rolled-back units
//!   leave gaps like a database sequence does
//!
//! [`MemoryStore::inject_write_conflicts`] makes the next commits fail with
//! [`StoreError::WriteConflict`] to drive the transfer retry path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::debug;

use super::{AccountStore, HealthProbe, LedgerStore, UnitOfWork, UnitOfWorkProvider};
use crate::account::{Account, AccountId};
use crate::error::StoreError;
use crate::ledger::LedgerEntry;
use crate::money::Money;

struct Row {
    account: Account,
    lock: Arc<RowLock<()>>,
}

#[derive(Default)]
struct Shared {
    rows: Mutex<BTreeMap<AccountId, Row>>,
    ledger: Mutex<Vec<LedgerEntry>>,
    ledger_seq: AtomicI64,
    pending_conflicts: AtomicUsize,
}

impl Shared {
    fn rows(&self) -> MutexGuard<'_, BTreeMap<AccountId, Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledger(&self) -> MutexGuard<'_, Vec<LedgerEntry>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, account_id: AccountId) -> Result<Arc<RowLock<()>>, StoreError> {
        self.rows()
            .get(&account_id)
            .map(|row| row.lock.clone())
            .ok_or(StoreError::NotFound {
                entity: "account",
                id: account_id,
            })
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Shared in-memory account and ledger store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` commits with a write conflict.
    pub fn inject_write_conflicts(&self, n: usize) {
        self.shared.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Committed balance of an account
    pub fn balance_of(&self, account_id: AccountId) -> Option<Money> {
        self.shared
            .rows()
            .get(&account_id)
            .map(|row| row.account.balance)
    }

    /// Sum of all committed balances, `None` if the sum overflows
    pub fn total_balance(&self) -> Option<Money> {
        self.shared
            .rows()
            .values()
            .try_fold(Money::ZERO, |acc, row| acc.checked_add(row.account.balance))
    }

    /// Committed ledger entries in commit order
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.shared.ledger().clone()
    }
}

/// Unit of work over a [`MemoryStore`]
pub struct MemoryUnit {
    shared: Arc<Shared>,
    locks: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    staged_balances: BTreeMap<AccountId, Money>,
    staged_ledger: Vec<LedgerEntry>,
}

impl MemoryUnit {
    async fn lock_row(&mut self, account_id: AccountId) -> Result<(), StoreError> {
        if self.locks.contains_key(&account_id) {
            return Ok(());
        }
        let lock = self.shared.row_lock(account_id)?;
        let guard = lock.lock_owned().await;
        self.locks.insert(account_id, guard);
        Ok(())
    }

    /// Latest committed row overlaid with this unit's staged balance.
    fn read(&self, account_id: AccountId) -> Result<Account, StoreError> {
        let mut account = self
            .shared
            .rows()
            .get(&account_id)
            .map(|row| row.account.clone())
            .ok_or(StoreError::NotFound {
                entity: "account",
                id: account_id,
            })?;
        if let Some(balance) = self.staged_balances.get(&account_id) {
            account.balance = *balance;
        }
        Ok(account)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn commit(mut self) -> Result<(), StoreError> {
        if self.shared.take_conflict() {
            return Err(StoreError::WriteConflict(
                "could not serialize access due to concurrent update".into(),
            ));
        }

        let now = Utc::now();
        let mut rows = self.shared.rows();
        for (account_id, balance) in &self.staged_balances {
            if let Some(row) = rows.get_mut(account_id) {
                row.account.balance = *balance;
                row.account.updated_at = now;
            }
        }
        self.shared.ledger().append(&mut self.staged_ledger);
        drop(rows);

        // Row locks are released when `self` drops here.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        debug!(
            locked = self.locks.len(),
            staged = self.staged_balances.len(),
            "memory unit rolled back"
        );
        Ok(())
    }
}

#[async_trait]
impl UnitOfWorkProvider for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, StoreError> {
        Ok(MemoryUnit {
            shared: self.shared.clone(),
            locks: BTreeMap::new(),
            staged_balances: BTreeMap::new(),
            staged_ledger: Vec::new(),
        })
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn create(&self, account_id: AccountId, balance: Money) -> Result<Account, StoreError> {
        let mut rows = self.shared.rows();
        if rows.contains_key(&account_id) {
            return Err(StoreError::Duplicate {
                entity: "account",
                id: account_id,
            });
        }
        let account = Account::opened(account_id, balance, Utc::now());
        rows.insert(
            account_id,
            Row {
                account: account.clone(),
                lock: Arc::new(RowLock::new(())),
            },
        );
        Ok(account)
    }

    async fn get_by_id(&self, account_id: AccountId) -> Result<Account, StoreError> {
        self.shared
            .rows()
            .get(&account_id)
            .map(|row| row.account.clone())
            .ok_or(StoreError::NotFound {
                entity: "account",
                id: account_id,
            })
    }

    async fn get_by_id_for_update(
        &self,
        unit: &mut MemoryUnit,
        account_id: AccountId,
    ) -> Result<Account, StoreError> {
        unit.lock_row(account_id).await?;
        unit.read(account_id)
    }

    async fn update_balance(
        &self,
        unit: &mut MemoryUnit,
        account_id: AccountId,
        balance: Money,
    ) -> Result<(), StoreError> {
        unit.lock_row(account_id).await?;
        unit.staged_balances.insert(account_id, balance);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn append(
        &self,
        unit: &mut MemoryUnit,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, StoreError> {
        let id = self.shared.ledger_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = LedgerEntry {
            id,
            source_account_id,
            destination_account_id,
            amount,
            created_at: Utc::now(),
        };
        unit.staged_ledger.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
