//! Transfer orchestrator

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::state::TransferPhase;
use crate::account::AccountId;
use crate::error::{AppError, BALANCE_LIMIT_MESSAGE, StoreError};
use crate::ledger::LedgerEntry;
use crate::money::Money;
use crate::store::{AccountStore, LedgerStore, UnitOfWork, UnitOfWorkProvider};

/// Amount bounds for a single transfer, both inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    pub min_amount: Money,
    pub max_amount: Money,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            min_amount: Money::from_cents(1_00),
            max_amount: Money::from_cents(200_000_00),
        }
    }
}

impl TransferLimits {
    /// Check a request before any store access. Rules apply in a fixed order
    /// and the first failing one is reported.
    pub fn validate(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<(), AppError> {
        if source <= 0 || destination <= 0 {
            return Err(AppError::validation("Please provide valid account numbers"));
        }
        if source == destination {
            return Err(AppError::validation(
                "Cannot transfer to the same account. Please choose a different destination account",
            ));
        }
        if amount < self.min_amount {
            return Err(AppError::validation(format!(
                "Transfer amount must be at least ${}",
                self.min_amount
            )));
        }
        if amount > self.max_amount {
            return Err(AppError::validation(format!(
                "Transfer amount cannot exceed ${}",
                self.max_amount
            )));
        }
        if amount.exceeds_scale() {
            return Err(AppError::validation(
                "Transfer amount can only have up to 2 decimal places (e.g., 10.50)",
            ));
        }
        Ok(())
    }
}

/// Write-conflict retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Pause before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(5),
        }
    }
}

/// The two ids in the order their rows must be locked.
///
/// Ascending by id, whichever side is the source.
#[inline]
pub fn lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Transfer operations as seen by the HTTP layer
#[async_trait]
pub trait TransferApi: Send + Sync {
    /// Move `amount` from `source` to `destination` atomically.
    async fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AppError>;

    /// [`TransferApi::transfer`] bounded by `deadline`. On expiry the
    /// in-flight unit of work is rolled back and `Overloaded` is returned.
    async fn transfer_within(
        &self,
        deadline: Duration,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AppError>;
}

/// A transfer that ended in `FAILED`, tagged with the phase that stopped it
#[derive(Debug)]
struct Rejection {
    phase: TransferPhase,
    error: AppError,
}

impl Rejection {
    fn new(phase: TransferPhase, error: AppError) -> Self {
        Self { phase, error }
    }
}

/// Outcome of one failed attempt
#[derive(Debug)]
enum AttemptError {
    /// Store write conflict; a fresh attempt may succeed
    Conflict {
        phase: TransferPhase,
        reason: String,
    },
    Rejected(Rejection),
}

impl AttemptError {
    fn store(phase: TransferPhase, op: &str, e: StoreError) -> Self {
        if e.is_write_conflict() {
            return AttemptError::Conflict {
                phase,
                reason: e.to_string(),
            };
        }
        let error = AppError::from_store(&format!("{} ({})", op, phase), e);
        AttemptError::Rejected(Rejection::new(phase, error))
    }

    fn rejected(phase: TransferPhase, error: AppError) -> Self {
        AttemptError::Rejected(Rejection::new(phase, error))
    }
}

pub struct TransferService<A, L, P> {
    accounts: Arc<A>,
    ledger: Arc<L>,
    units: Arc<P>,
    limits: TransferLimits,
    retry: RetryPolicy,
}

impl<A, L, P> TransferService<A, L, P>
where
    P: UnitOfWorkProvider,
    A: AccountStore<Unit = P::Unit>,
    L: LedgerStore<Unit = P::Unit>,
{
    pub fn new(
        accounts: Arc<A>,
        ledger: Arc<L>,
        units: Arc<P>,
        limits: TransferLimits,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            accounts,
            ledger,
            units,
            limits,
            retry,
        }
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }

    async fn execute(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AppError> {
        match self.run(source, destination, amount).await {
            Ok((entry, attempt)) => {
                info!(
                    source,
                    destination,
                    amount = %amount,
                    ledger_id = entry.id,
                    attempt,
                    phase = %TransferPhase::Succeeded,
                    "transfer completed"
                );
                Ok(entry)
            }
            Err(Rejection { phase, error }) => {
                debug!(
                    source,
                    destination,
                    code = error.code(),
                    phase = %phase,
                    outcome = %TransferPhase::Failed,
                    "transfer rejected"
                );
                Err(error)
            }
        }
    }

    /// Validate, then attempt until success, a rejection or an exhausted
    /// conflict budget. Returns the entry with the attempt that produced it.
    async fn run(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<(LedgerEntry, u32), Rejection> {
        self.limits
            .validate(source, destination, amount)
            .map_err(|e| Rejection::new(TransferPhase::Validating, e))?;

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_phase = TransferPhase::OpeningUnit;
        for attempt in 1..=max_attempts {
            match self.attempt(source, destination, amount).await {
                Ok(entry) => return Ok((entry, attempt)),
                Err(AttemptError::Rejected(rejection)) => return Err(rejection),
                Err(AttemptError::Conflict { phase, reason }) => {
                    warn!(
                        source,
                        destination,
                        attempt,
                        max_attempts,
                        phase = %phase,
                        reason = %reason,
                        "write conflict, retrying transfer"
                    );
                    last_phase = phase;
                    if attempt < max_attempts && !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff * attempt).await;
                    }
                }
            }
        }

        error!(
            source,
            destination,
            max_attempts,
            phase = %last_phase,
            "transfer retries exhausted"
        );
        Err(Rejection::new(last_phase, AppError::Overloaded))
    }

    /// One unit of work. Rolled back explicitly on any failure.
    async fn attempt(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AttemptError> {
        let mut unit = self.units.begin().await.map_err(|e| {
            AttemptError::store(TransferPhase::OpeningUnit, "opening unit of work", e)
        })?;

        match self.apply(&mut unit, source, destination, amount).await {
            Ok(entry) => {
                unit.commit().await.map_err(|e| {
                    AttemptError::store(TransferPhase::Committing, "committing transfer", e)
                })?;
                Ok(entry)
            }
            Err(e) => {
                if let Err(rb) = unit.rollback().await {
                    warn!(source, destination, error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        unit: &mut P::Unit,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AttemptError> {
        let (first_id, second_id) = lock_order(source, destination);
        let first = self
            .accounts
            .get_by_id_for_update(unit, first_id)
            .await
            .map_err(|e| AttemptError::store(TransferPhase::LockingAccounts, "locking account", e))?;
        let second = self
            .accounts
            .get_by_id_for_update(unit, second_id)
            .await
            .map_err(|e| AttemptError::store(TransferPhase::LockingAccounts, "locking account", e))?;

        let (source_account, destination_account) = if first_id == source {
            (first, second)
        } else {
            (second, first)
        };

        if source_account.balance < amount {
            return Err(AttemptError::rejected(
                TransferPhase::CheckingFunds,
                AppError::InsufficientBalance { account_id: source },
            ));
        }

        let new_source_balance = source_account.balance.checked_sub(amount).ok_or_else(|| {
            AttemptError::rejected(
                TransferPhase::Mutating,
                AppError::internal("computing source balance", "decimal overflow"),
            )
        })?;
        // Must still fit the balance column once credited.
        let new_destination_balance = destination_account
            .balance
            .checked_add(amount)
            .filter(Money::is_storable)
            .ok_or_else(|| {
                AttemptError::rejected(
                    TransferPhase::Mutating,
                    AppError::validation(BALANCE_LIMIT_MESSAGE),
                )
            })?;

        self.accounts
            .update_balance(unit, source, new_source_balance)
            .await
            .map_err(|e| AttemptError::store(TransferPhase::Mutating, "debiting source", e))?;
        self.accounts
            .update_balance(unit, destination, new_destination_balance)
            .await
            .map_err(|e| AttemptError::store(TransferPhase::Mutating, "crediting destination", e))?;

        let entry = self
            .ledger
            .append(unit, source, destination, amount)
            .await
            .map_err(|e| AttemptError::store(TransferPhase::Mutating, "recording ledger entry", e))?;

        Ok(entry)
    }
}

#[async_trait]
impl<A, L, P> TransferApi for TransferService<A, L, P>
where
    P: UnitOfWorkProvider,
    A: AccountStore<Unit = P::Unit>,
    L: LedgerStore<Unit = P::Unit>,
{
    async fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AppError> {
        self.execute(source, destination, amount).await
    }

    async fn transfer_within(
        &self,
        deadline: Duration,
        source: AccountId,
        destination: AccountId,
        amount: Money,
    ) -> Result<LedgerEntry, AppError> {
        match tokio::time::timeout(deadline, self.execute(source, destination, amount)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    source,
                    destination,
                    deadline_ms = deadline.as_millis() as u64,
                    "transfer deadline expired"
                );
                Err(AppError::Overloaded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::store::{MemoryStore, MemoryUnit};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type MemoryTransfers = TransferService<MemoryStore, MemoryStore, MemoryStore>;

    fn money(d: rust_decimal::Decimal) -> Money {
        Money::from(d)
    }

    fn service_with(store: &MemoryStore, limits: TransferLimits) -> MemoryTransfers {
        let shared = Arc::new(store.clone());
        TransferService::new(
            shared.clone(),
            shared.clone(),
            shared,
            limits,
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
        )
    }

    async fn setup(balances: &[(AccountId, Money)]) -> (MemoryTransfers, MemoryStore) {
        let store = MemoryStore::new();
        for (id, balance) in balances {
            store.create(*id, *balance).await.unwrap();
        }
        (service_with(&store, TransferLimits::default()), store)
    }

    fn pool_timeout() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }

    /// Ledger whose every append fails with a driver error
    #[derive(Default)]
    struct BrokenLedger {
        appends: AtomicUsize,
    }

    #[async_trait]
    impl LedgerStore for BrokenLedger {
        type Unit = MemoryUnit;

        async fn append(
            &self,
            _unit: &mut MemoryUnit,
            _source: AccountId,
            _destination: AccountId,
            _amount: Money,
        ) -> Result<LedgerEntry, StoreError> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            Err(pool_timeout())
        }
    }

    /// Accounts whose row `vanished` disappears between lock and update
    struct VanishingAccounts {
        inner: MemoryStore,
        vanished: AccountId,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl AccountStore for VanishingAccounts {
        type Unit = MemoryUnit;

        async fn create(&self, account_id: AccountId, balance: Money) -> Result<Account, StoreError> {
            self.inner.create(account_id, balance).await
        }

        async fn get_by_id(&self, account_id: AccountId) -> Result<Account, StoreError> {
            self.inner.get_by_id(account_id).await
        }

        async fn get_by_id_for_update(
            &self,
            unit: &mut MemoryUnit,
            account_id: AccountId,
        ) -> Result<Account, StoreError> {
            self.inner.get_by_id_for_update(unit, account_id).await
        }

        async fn update_balance(
            &self,
            unit: &mut MemoryUnit,
            account_id: AccountId,
            balance: Money,
        ) -> Result<(), StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if account_id == self.vanished {
                return Err(StoreError::NotFound {
                    entity: "account",
                    id: account_id,
                });
            }
            self.inner.update_balance(unit, account_id, balance).await
        }
    }

    /// Provider that cannot open a unit, like an exhausted pool
    #[derive(Default)]
    struct UnavailableUnits {
        begins: AtomicUsize,
    }

    #[async_trait]
    impl UnitOfWorkProvider for UnavailableUnits {
        type Unit = MemoryUnit;

        async fn begin(&self) -> Result<MemoryUnit, StoreError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Err(pool_timeout())
        }
    }

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_lock_order_is_ascending() {
        assert_eq!(lock_order(1, 2), (1, 2));
        assert_eq!(lock_order(2, 1), (1, 2));
        assert_eq!(lock_order(10, 3), (3, 10));
    }

    #[test]
    fn test_validation_order() {
        let limits = TransferLimits::default();
        // id check wins over self transfer and amount
        let err = limits.validate(0, 0, Money::ZERO).unwrap_err();
        assert_eq!(err, AppError::validation("Please provide valid account numbers"));
        // self transfer wins over amount
        let err = limits.validate(1, 1, Money::ZERO).unwrap_err();
        assert!(err.to_string().starts_with("Cannot transfer to the same account"));
        let err = limits.validate(1, 2, money(dec!(0.999))).unwrap_err();
        assert_eq!(err.to_string(), "Transfer amount must be at least $1.00");
        let err = limits.validate(1, 2, money(dec!(200000.01))).unwrap_err();
        assert_eq!(err.to_string(), "Transfer amount cannot exceed $200000.00");
        let err = limits.validate(1, 2, money(dec!(10.505))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transfer amount can only have up to 2 decimal places (e.g., 10.50)"
        );
    }

    #[test]
    fn test_limits_are_inclusive() {
        let limits = TransferLimits::default();
        assert!(limits.validate(1, 2, money(dec!(1.00))).is_ok());
        assert!(limits.validate(1, 2, money(dec!(200000.00))).is_ok());
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let (svc, store) = setup(&[(1, money(dec!(100.00))), (2, Money::ZERO)]).await;

        let entry = svc.transfer(1, 2, money(dec!(40.00))).await.unwrap();
        assert_eq!(entry.source_account_id, 1);
        assert_eq!(entry.destination_account_id, 2);
        assert_eq!(entry.amount.to_string(), "40.00");

        assert_eq!(store.balance_of(1).unwrap().to_string(), "60.00");
        assert_eq!(store.balance_of(2).unwrap().to_string(), "40.00");
        assert_eq!(store.ledger_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_from_higher_id_locks_in_order() {
        let (svc, store) = setup(&[(1, Money::ZERO), (2, money(dec!(50.00)))]).await;

        svc.transfer(2, 1, money(dec!(20.00))).await.unwrap();
        assert_eq!(store.balance_of(1).unwrap().to_string(), "20.00");
        assert_eq!(store.balance_of(2).unwrap().to_string(), "30.00");
    }

    #[tokio::test]
    async fn test_full_balance_drains_to_zero() {
        let (svc, store) = setup(&[(1, money(dec!(75.25))), (2, Money::ZERO)]).await;

        svc.transfer(1, 2, money(dec!(75.25))).await.unwrap();
        assert_eq!(store.balance_of(1).unwrap().to_string(), "0.00");
        assert_eq!(store.balance_of(2).unwrap().to_string(), "75.25");
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let (svc, store) = setup(&[(1, money(dec!(10.00))), (2, Money::ZERO)]).await;

        let err = svc.transfer(1, 2, money(dec!(10.01))).await.unwrap_err();
        assert_eq!(err, AppError::InsufficientBalance { account_id: 1 });
        assert_eq!(store.balance_of(1).unwrap().to_string(), "10.00");
        assert_eq!(store.balance_of(2).unwrap(), Money::ZERO);
        assert!(store.ledger_entries().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_not_retried() {
        let (svc, store) = setup(&[(1, money(dec!(5.00))), (2, Money::ZERO)]).await;
        store.inject_write_conflicts(1);

        let err = svc.transfer(1, 2, money(dec!(50.00))).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
        // conflict was never consumed: the attempt stopped before commit
        svc.transfer(1, 2, money(dec!(1.00))).await.unwrap();
        assert_eq!(store.balance_of(1).unwrap().to_string(), "4.00");
    }

    #[tokio::test]
    async fn test_amount_above_ceiling_rejected() {
        let store = MemoryStore::new();
        store.create(1, money(dec!(500000.00))).await.unwrap();
        store.create(2, Money::ZERO).await.unwrap();
        let svc = service_with(
            &store,
            TransferLimits {
                min_amount: money(dec!(1.00)),
                max_amount: money(dec!(10000.00)),
            },
        );

        let err = svc.transfer(1, 2, money(dec!(10000.01))).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "Transfer amount cannot exceed $10000.00");
        assert_eq!(store.balance_of(1).unwrap().to_string(), "500000.00");

        svc.transfer(1, 2, money(dec!(10000.00))).await.unwrap();
    }

    #[tokio::test]
    async fn test_nonexistent_account() {
        let (svc, store) = setup(&[(1, money(dec!(100.00)))]).await;

        let err = svc.transfer(1, 999, money(dec!(10.00))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { id: 999, .. }));
        assert_eq!(err.http_status(), 404);
        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        assert!(store.ledger_entries().is_empty());
    }

    #[tokio::test]
    async fn test_boundary_amounts_rejected_before_store() {
        // no accounts exist: validation must fail first
        let (svc, _) = setup(&[]).await;
        for amount in [dec!(0.999), dec!(0), dec!(-5.00)] {
            let err = svc.transfer(1, 2, money(amount)).await.unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "amount {}", amount);
        }
        let err = svc.transfer(3, 3, money(dec!(10.00))).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_write_conflict_is_retried() {
        let (svc, store) = setup(&[(1, money(dec!(100.00))), (2, Money::ZERO)]).await;
        store.inject_write_conflicts(2);

        let entry = svc.transfer(1, 2, money(dec!(30.00))).await.unwrap();
        assert_eq!(entry.amount.to_string(), "30.00");
        assert_eq!(store.balance_of(1).unwrap().to_string(), "70.00");
        assert_eq!(store.ledger_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_overloaded() {
        let (svc, store) = setup(&[(1, money(dec!(100.00))), (2, Money::ZERO)]).await;
        store.inject_write_conflicts(3);

        let err = svc.transfer(1, 2, money(dec!(30.00))).await.unwrap_err();
        assert_eq!(err, AppError::Overloaded);
        assert!(err.is_retryable());
        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        assert_eq!(store.balance_of(2).unwrap(), Money::ZERO);
        assert!(store.ledger_entries().is_empty());

        // budget consumed, the next request goes through
        svc.transfer(1, 2, money(dec!(30.00))).await.unwrap();
    }

    #[tokio::test]
    async fn test_deadline_rolls_back_and_releases_locks() {
        let (svc, store) = setup(&[(1, money(dec!(100.00))), (2, Money::ZERO)]).await;

        // hold account 2 so the transfer blocks on its second lock
        let mut blocker = store.begin().await.unwrap();
        store.get_by_id_for_update(&mut blocker, 2).await.unwrap();

        let err = svc
            .transfer_within(Duration::from_millis(50), 1, 2, money(dec!(10.00)))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Overloaded);
        blocker.rollback().await.unwrap();

        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        // account 1 was released by the cancelled attempt
        svc.transfer_within(Duration::from_secs(1), 1, 2, money(dec!(10.00)))
            .await
            .unwrap();
        assert_eq!(store.balance_of(1).unwrap().to_string(), "90.00");
    }

    #[tokio::test]
    async fn test_transfer_and_return_sequence() {
        let (svc, store) = setup(&[(1, money(dec!(100.00))), (2, Money::ZERO)]).await;

        svc.transfer(1, 2, money(dec!(40.00))).await.unwrap();
        let err = svc.transfer(2, 1, money(dec!(50.00))).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
        svc.transfer(2, 1, money(dec!(40.00))).await.unwrap();

        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        assert_eq!(store.balance_of(2).unwrap().to_string(), "0.00");
        let ids: Vec<_> = store.ledger_entries().iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_internal_and_not_retried() {
        let store = MemoryStore::new();
        store.create(1, money(dec!(100.00))).await.unwrap();
        store.create(2, Money::ZERO).await.unwrap();
        let shared = Arc::new(store.clone());
        let ledger = Arc::new(BrokenLedger::default());
        let svc = TransferService::new(
            shared.clone(),
            ledger.clone(),
            shared,
            TransferLimits::default(),
            no_backoff(),
        );

        let err = svc.transfer(1, 2, money(dec!(25.00))).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)), "got {:?}", err);
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.to_string().contains("recording ledger entry (MUTATING)"));
        assert_eq!(ledger.appends.load(Ordering::SeqCst), 1);

        // staged debit and credit were rolled back, locks released
        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        assert_eq!(store.balance_of(2).unwrap(), Money::ZERO);
        assert!(store.ledger_entries().is_empty());
        let mut unit = store.begin().await.unwrap();
        store.get_by_id_for_update(&mut unit, 1).await.unwrap();
        store.get_by_id_for_update(&mut unit, 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_row_missing_on_update_is_not_found_and_rolled_back() {
        let store = MemoryStore::new();
        store.create(1, money(dec!(100.00))).await.unwrap();
        store.create(2, Money::ZERO).await.unwrap();
        let accounts = Arc::new(VanishingAccounts {
            inner: store.clone(),
            vanished: 2,
            updates: AtomicUsize::new(0),
        });
        let shared = Arc::new(store.clone());
        let svc = TransferService::new(
            accounts.clone(),
            shared.clone(),
            shared,
            TransferLimits::default(),
            no_backoff(),
        );

        let err = svc.transfer(1, 2, money(dec!(10.00))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { id: 2, .. }), "got {:?}", err);
        // debit of 1, then the failing credit of 2; no second attempt
        assert_eq!(accounts.updates.load(Ordering::SeqCst), 2);
        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        assert!(store.ledger_entries().is_empty());
    }

    #[tokio::test]
    async fn test_begin_failure_reported_as_opening_unit() {
        let store = MemoryStore::new();
        store.create(1, money(dec!(100.00))).await.unwrap();
        store.create(2, Money::ZERO).await.unwrap();
        let shared = Arc::new(store.clone());
        let units = Arc::new(UnavailableUnits::default());
        let svc = TransferService::new(
            shared.clone(),
            shared,
            units.clone(),
            TransferLimits::default(),
            no_backoff(),
        );

        let rejection = svc.run(1, 2, money(dec!(10.00))).await.unwrap_err();
        assert_eq!(rejection.phase, TransferPhase::OpeningUnit);
        match &rejection.error {
            AppError::Internal(msg) => {
                assert!(msg.starts_with("opening unit of work (OPENING_UNIT)"), "{}", msg)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(units.begins.load(Ordering::SeqCst), 1);

        let err = svc.transfer(1, 2, money(dec!(10.00))).await.unwrap_err();
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
    }

    #[tokio::test]
    async fn test_rejection_phases() {
        let (svc, store) = setup(&[(1, money(dec!(10.00))), (2, Money::ZERO)]).await;

        let r = svc.run(1, 1, money(dec!(5.00))).await.unwrap_err();
        assert_eq!(r.phase, TransferPhase::Validating);

        let r = svc.run(1, 99, money(dec!(5.00))).await.unwrap_err();
        assert_eq!(r.phase, TransferPhase::LockingAccounts);
        assert!(matches!(r.error, AppError::NotFound { id: 99, .. }));

        let r = svc.run(1, 2, money(dec!(50.00))).await.unwrap_err();
        assert_eq!(r.phase, TransferPhase::CheckingFunds);
        assert_eq!(r.error, AppError::InsufficientBalance { account_id: 1 });

        store.inject_write_conflicts(3);
        let r = svc.run(1, 2, money(dec!(5.00))).await.unwrap_err();
        assert_eq!(r.phase, TransferPhase::Committing);
        assert_eq!(r.error, AppError::Overloaded);

        let (entry, attempt) = svc.run(1, 2, money(dec!(5.00))).await.unwrap();
        assert_eq!(entry.amount.to_string(), "5.00");
        assert_eq!(attempt, 1);
    }

    #[tokio::test]
    async fn test_conflict_inside_unit_reports_its_phase() {
        let (svc, store) = setup(&[(1, money(dec!(10.00))), (2, Money::ZERO)]).await;
        store.inject_write_conflicts(1);

        match svc.attempt(1, 2, money(dec!(5.00))).await {
            Err(AttemptError::Conflict { phase, .. }) => {
                assert_eq!(phase, TransferPhase::Committing)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.balance_of(1).unwrap().to_string(), "10.00");
    }

    #[tokio::test]
    async fn test_credit_beyond_column_range_rejected() {
        let near_max = Money::max_storable().checked_sub(money(dec!(0.50))).unwrap();
        let (svc, store) = setup(&[(1, money(dec!(100.00))), (2, near_max)]).await;

        let r = svc.run(1, 2, money(dec!(1.00))).await.unwrap_err();
        assert_eq!(r.phase, TransferPhase::Mutating);
        assert_eq!(r.error, AppError::validation(BALANCE_LIMIT_MESSAGE));
        assert_eq!(r.error.http_status(), 400);
        assert_eq!(store.balance_of(1).unwrap().to_string(), "100.00");
        assert_eq!(store.balance_of(2).unwrap(), near_max);
        assert!(store.ledger_entries().is_empty());

        // exactly filling the column is fine
        svc.transfer(1, 2, money(dec!(0.50))).await.unwrap();
        assert_eq!(store.balance_of(2).unwrap(), Money::max_storable());
    }
}
