//! Account management module
//!
//! Account creation and balance lookup over any [`AccountStore`].
//!
//! [`AccountStore`]: crate::store::AccountStore

pub mod models;
pub mod repository;
pub mod service;

pub use models::{Account, AccountId};
pub use repository::PgAccountStore;
pub use service::{AccountApi, AccountService};
