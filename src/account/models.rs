//! Data models for account management

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::money::Money;

/// Positive integer account identifier
pub type AccountId = i64;

/// Account row
///
/// `balance` is never negative outside an in-flight unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub account_id: AccountId,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A freshly created account, both timestamps set to `now`.
    pub fn opened(account_id: AccountId, balance: Money, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opened_sets_both_timestamps() {
        let now = Utc::now();
        let account = Account::opened(7, Money::from_cents(1050), now);
        assert_eq!(account.account_id, 7);
        assert_eq!(account.balance.to_string(), "10.50");
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn test_serializes_balance_as_string() {
        let account = Account::opened(1, Money::from_cents(10000), Utc::now());
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["account_id"], 1);
        assert_eq!(json["balance"], "100.00");
    }
}
