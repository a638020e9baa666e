//! Transfer state machine phases
//!
//! A transfer moves forward through these phases. The phase an attempt
//! stopped in is carried on its error, written to the rejection log line and
//! prefixed to internal error context, so a failure can be traced to the
//! step that produced it.
//!
//! ```text
//! VALIDATING → OPENING_UNIT → LOCKING_ACCOUNTS → CHECKING_FUNDS → MUTATING → COMMITTING → SUCCEEDED
//!      ↓             ↓*               ↓*                ↓             ↓*           ↓*
//!   FAILED        FAILED           FAILED            FAILED        FAILED       FAILED
//! ```
//!
//! `*` phases may instead end the attempt with a write conflict, which sends
//! the orchestrator back to `OPENING_UNIT` with a fresh unit of work.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPhase {
    Validating,
    OpeningUnit,
    LockingAccounts,
    CheckingFunds,
    Mutating,
    Committing,
    Succeeded,
    Failed,
}

impl TransferPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Validating => "VALIDATING",
            TransferPhase::OpeningUnit => "OPENING_UNIT",
            TransferPhase::LockingAccounts => "LOCKING_ACCOUNTS",
            TransferPhase::CheckingFunds => "CHECKING_FUNDS",
            TransferPhase::Mutating => "MUTATING",
            TransferPhase::Committing => "COMMITTING",
            TransferPhase::Succeeded => "SUCCEEDED",
            TransferPhase::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TransferPhase::OpeningUnit.to_string(), "OPENING_UNIT");
        assert_eq!(TransferPhase::LockingAccounts.to_string(), "LOCKING_ACCOUNTS");
        assert_eq!(format!("{}", TransferPhase::Succeeded), "SUCCEEDED");
    }
}
