//! Atomic account-to-account transfers
//!
//! # Protocol
//!
//! 1. Validate the request without touching the store.
//! 2. Open a unit of work and lock both accounts, lower id first.
//! 3. Check funds on the source, then write both balances and one ledger
//!    entry.
//! 4. Commit.
//!
//! A store write conflict at any step of 2–4 abandons the unit and starts
//! again from step 2, up to [`RetryPolicy::max_attempts`] in total. Every
//! other failure is final.
//!
//! # Safety Invariants
//!
//! 1. **Ordered Locking**: two transfers sharing accounts always lock them in
//!    the same order, so they cannot wait on each other in a cycle
//! 2. **All or Nothing**: both balances and the ledger entry land in one
//!    commit; any failure or cancellation rolls the unit back
//! 3. **Conservation**: the source loses exactly what the destination gains

pub mod service;
pub mod state;

pub use service::{RetryPolicy, TransferApi, TransferLimits, TransferService, lock_order};
pub use state::TransferPhase;
