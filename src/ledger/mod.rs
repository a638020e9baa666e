//! Ledger module
//!
//! Append-only record of committed transfers. One [`LedgerEntry`] is written
//! per successful transfer, inside the same unit of work as the two balance
//! updates, and is never mutated afterwards.

pub mod repository;

pub use repository::PgLedgerStore;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::AccountId;
use crate::money::Money;

/// Store-assigned sequential ledger identifier
pub type LedgerEntryId = i64;

/// Immutable record of one completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}
