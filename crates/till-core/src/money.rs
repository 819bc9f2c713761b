//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A drawer reports $100.10 withdrawn, treasury counts $100.10:           │
//! │    100.1 - 100.1 summed over thousands of withdrawals in floats        │
//! │    drifts away from zero and a "CONFIRMED" turns into "PARTIAL".       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    10010 - 10010 = 0, always.                                           │
//! │    The reconciliation tolerance (0.01) becomes exactly 1 cent.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let expected = Money::from_cents(10_000); // $100.00
//! let received = Money::from_cents(9_500);  // $95.00
//!
//! assert!(!expected.within_tolerance(received));
//! assert_eq!((received - expected).cents(), -500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

/// Maximum difference at which two amounts are still considered equal.
///
/// Applies to withdrawal confirmation (CONFIRMED vs PARTIAL) and to orphan
/// payment matching (AMOUNT_MISMATCH).
pub const AMOUNT_TOLERANCE: Money = Money::from_cents(1);

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Differences and balances can be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │  Sale payment ──► session method total ──► withdrawal (drawer → safe)   │
/// │                                                 │                       │
/// │                                                 ▼                       │
/// │                         pending withdrawal.amount (expected)            │
/// │                                                 │  treasury count       │
/// │                                                 ▼                       │
/// │                         confirmed amount ──► treasury balance           │
/// │                                                 ▲                       │
/// │                         treasury movements ─────┘ (subtracted)          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let amount = Money::from_cents(25_000); // $250.00
    /// assert_eq!(amount.cents(), 25_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2_500);
    /// assert_eq!(unit_price.multiply_quantity(4).cents(), 10_000);
    /// ```
    ///
    /// For validated amounts only; raw input goes through
    /// [`Money::checked_multiply_quantity`].
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_multiply_quantity(2), Some(Money::from_cents(500)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums `amounts`, returning `None` if any partial sum overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Returns true when `self` and `other` differ by at most [`AMOUNT_TOLERANCE`].
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let expected = Money::from_cents(10_000);
    /// assert!(expected.within_tolerance(Money::from_cents(9_999)));
    /// assert!(!expected.within_tolerance(Money::from_cents(9_998)));
    /// ```
    #[inline]
    pub fn within_tolerance(&self, other: Money) -> bool {
        self.0.abs_diff(other.0) <= AMOUNT_TOLERANCE.0.unsigned_abs()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering; the UI formats money with its own locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((b - a).cents(), -500);
        assert_eq!(a.multiply_quantity(3).cents(), 3000);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let max = Money::from_cents(i64::MAX);

        assert_eq!(max.checked_multiply_quantity(2), None);
        assert_eq!(max.checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::checked_sum([max, max, Money::from_cents(25_002)]),
            None
        );
        assert_eq!(
            Money::checked_sum([Money::from_cents(100), Money::from_cents(250)]),
            Some(Money::from_cents(350))
        );
    }

    #[test]
    fn test_tolerance_is_one_cent() {
        let expected = Money::from_cents(10_000);

        assert!(expected.within_tolerance(expected));
        assert!(expected.within_tolerance(Money::from_cents(10_001)));
        assert!(expected.within_tolerance(Money::from_cents(9_999)));
        assert!(!expected.within_tolerance(Money::from_cents(10_002)));
        assert!(!expected.within_tolerance(Money::from_cents(9_500)));
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(100), Money::from_cents(250)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.cents(), 350);

        let empty: Vec<Money> = Vec::new();
        assert!(empty.into_iter().sum::<Money>().is_zero());
    }
}
