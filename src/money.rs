//! Money Module
//!
//! Exact fixed-point representation for every balance and transfer amount.
//! All monetary values crossing the core go through [`Money`].
//!
//! ## Design Principles
//! 1. Exact arithmetic: backed by `rust_decimal::Decimal`, never `f64`
//! 2. Explicit precision: values keep the scale they were supplied with, so a
//!    precision violation is reported instead of silently rounded away
//! 3. String transport: JSON output is always a string with two decimals
//!
//! ## Usage
//! ```rust
//! use std::str::FromStr;
//! use transfer_ledger::money::Money;
//!
//! let amount = Money::from_str("40.00").unwrap();
//! let balance = Money::from_str("100").unwrap();
//! assert_eq!(balance.checked_sub(amount).unwrap().to_string(), "60.00");
//! assert!(Money::from_str("0.999").unwrap().exceeds_scale());
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fractional digits allowed on balances and amounts.
pub const MONEY_SCALE: u32 = 2;

/// Total digits a stored balance may have (`NUMERIC(20,2)`).
pub const MONEY_PRECISION: u32 = 20;

// ============================================================================
// Error Types
// ============================================================================

/// Money parsing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount cannot be empty")]
    Empty,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Money
// ============================================================================

/// Fixed-point monetary value with a two-decimal contract.
///
/// Equality and ordering compare numeric value (`1.5 == 1.50`), while
/// [`Money::exceeds_scale`] inspects the scale the value was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build from an integer number of cents (`1050` -> `10.50`).
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_SCALE))
    }

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Number of fractional digits as supplied.
    #[inline]
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// True when the value carries more than [`MONEY_SCALE`] fractional digits.
    #[inline]
    pub fn exceeds_scale(&self) -> bool {
        self.0.scale() > MONEY_SCALE
    }

    /// Largest value the balance column can hold, `999…999.99`.
    pub fn max_storable() -> Money {
        let cents = 10i128.pow(MONEY_PRECISION) - 1;
        Money(Decimal::from_i128_with_scale(cents, MONEY_SCALE))
    }

    /// True when the value fits the balance column.
    #[inline]
    pub fn is_storable(&self) -> bool {
        self.0.abs() <= Self::max_storable().0
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.scale() <= MONEY_SCALE {
            write!(f, "{:.2}", self.0)
        } else {
            // Out-of-contract values are shown as supplied, never rounded.
            write!(f, "{}", self.0)
        }
    }
}

// ============================================================================
// Parse: Client -> Internal
// ============================================================================

impl FromStr for Money {
    type Err = MoneyError;

    /// Strict parse that keeps the supplied scale.
    ///
    /// Rejects `.5`, `5.`, `+5`, `1e3` and empty input. Negative values parse
    /// so that business validation can report them with a precise message.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }
        if s.starts_with('.') || s.starts_with("-.") {
            return Err(MoneyError::InvalidFormat("use 0.5 not .5".into()));
        }
        if s.ends_with('.') {
            return Err(MoneyError::InvalidFormat("use 5.0 not 5.".into()));
        }
        if s.contains('e') || s.contains('E') {
            return Err(MoneyError::InvalidFormat(
                "scientific notation not allowed".into(),
            ));
        }
        if s.starts_with('+') {
            return Err(MoneyError::InvalidFormat("+ prefix not allowed".into()));
        }

        Decimal::from_str(s)
            .map(Money)
            .map_err(|e| MoneyError::InvalidFormat(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MoneyVisitor;

        impl serde::de::Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string such as \"10.50\" or an integer")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Money, E> {
                Money::from_str(v).map_err(E::custom)
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Money, E> {
                Ok(Money(Decimal::from(v)))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Money, E> {
                Ok(Money(Decimal::from(v)))
            }

            // JSON fractions arrive as f64 and have already lost their exact
            // value and scale.
            fn visit_f64<E: serde::de::Error>(self, _v: f64) -> Result<Money, E> {
                Err(E::custom(
                    "fractional amounts must be sent as strings, e.g. \"10.50\"",
                ))
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
