//! Fixed-point money amounts.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of fractional digits kept for every amount (NUMERIC(10,2)).
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound of a NUMERIC(10,2) column.
const MONEY_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// A monetary amount in the store's currency, rounded to cents.
///
/// Deserialization goes through [`Money::new`], so amounts from request bodies
/// are rounded exactly like amounts parsed in code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wrap a decimal, rounding half-away-from-zero to cents.
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(
            MONEY_SCALE,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// Build an amount from integer cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Reject amounts a NUMERIC(10,2) column cannot hold, negatives included.
    pub fn bounded(self, field: &str) -> DomainResult<Self> {
        if self.is_negative() {
            return Err(DomainError::validation(format!("{field} cannot be negative")));
        }
        if self.0 >= MONEY_LIMIT {
            return Err(DomainError::validation(format!("{field} must be less than {MONEY_LIMIT}")));
        }
        Ok(self)
    }

    /// Line total: `self × quantity`.
    pub fn times(&self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money::new)
            .ok_or_else(overflow)
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Money> {
        self.0.checked_add(rhs.0).map(Money).ok_or_else(overflow)
    }

    /// Sum of amounts, failing instead of overflowing.
    pub fn total<I: IntoIterator<Item = DomainResult<Money>>>(amounts: I) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m?))
    }
}

fn overflow() -> DomainError {
    DomainError::validation("amount is too large")
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money::new)
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
