//! Transfer Ledger - account balances with atomic transfers
//!
//! # Modules
//!
//! - [`money`] - Fixed-point monetary amount
//! - [`error`] - Store and application error types
//! - [`store`] - Store capability traits and the in-memory store
//! - [`account`] - Account model, PostgreSQL store, account service
//! - [`ledger`] - Ledger entries and their PostgreSQL store
//! - [`transfer`] - Transfer orchestration with ordered locking and retry
//! - [`db`] - Connection pool, migrations, units of work
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup
//! - [`gateway`] - HTTP routes

pub mod money;
pub mod error;

pub mod store;
pub mod account;
pub mod ledger;
pub mod transfer;
pub mod db;

pub mod config;
pub mod logging;
pub mod gateway;

// Convenient re-exports at crate root
pub use account::{Account, AccountApi, AccountId, AccountService};
pub use error::{AppError, StoreError};
pub use ledger::LedgerEntry;
pub use money::Money;
pub use transfer::{RetryPolicy, TransferApi, TransferLimits, TransferService};

/// Package version plus the git hash stamped at build time
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("GIT_HASH"));
