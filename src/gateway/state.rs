use std::sync::Arc;
use std::time::Duration;

use crate::account::{AccountApi, AccountService, PgAccountStore};
use crate::config::AppConfig;
use crate::db::{Database, PgUnitOfWorkProvider};
use crate::ledger::PgLedgerStore;
use crate::store::{HealthProbe, MemoryStore};
use crate::transfer::{RetryPolicy, TransferApi, TransferLimits, TransferService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountApi>,
    pub transfers: Arc<dyn TransferApi>,
    pub health: Arc<dyn HealthProbe>,
    /// Deadline for one `POST /transactions`
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountApi>,
        transfers: Arc<dyn TransferApi>,
        health: Arc<dyn HealthProbe>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            transfers,
            health,
            request_timeout,
        }
    }

    /// Wire the PostgreSQL stores into both services
    pub fn with_postgres(db: &Database, config: &AppConfig) -> Self {
        let pool = db.pool().clone();
        let accounts = Arc::new(PgAccountStore::new(pool.clone()));
        let ledger = Arc::new(PgLedgerStore::new(pool.clone()));
        let units = Arc::new(PgUnitOfWorkProvider::new(pool, config.database.isolation));

        let transfers = TransferService::new(
            accounts.clone(),
            ledger,
            units,
            config.transfer.limits(),
            config.transfer.retry_policy(),
        );

        Self::new(
            Arc::new(AccountService::new(accounts)),
            Arc::new(transfers),
            Arc::new(db.clone()),
            config.request_timeout(),
        )
    }

    /// Both services over one in-memory store
    pub fn in_memory(
        store: MemoryStore,
        limits: TransferLimits,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        let store = Arc::new(store);
        let transfers =
            TransferService::new(store.clone(), store.clone(), store.clone(), limits, retry);

        Self::new(
            Arc::new(AccountService::new(store.clone())),
            Arc::new(transfers),
            store,
            request_timeout,
        )
    }
}
