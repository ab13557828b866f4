//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  An order ledger that drifts by a paisa per operation stops             │
//! │  reconciling with its wallet transactions within a day.                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    ₹10.99 is stored as 1099 paise (i64)                                 │
//! │    Percentage math rounds half-up at the paisa, exactly once            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! // Create from paise (preferred)
//! let price = Money::from_paise(109900); // ₹1099.00
//!
//! // Arithmetic operations
//! let line = price * 2;                        // ₹2198.00
//! let gst = line.percent_bps(1800);            // 18% GST
//!
//! // NEVER do this:
//! // let bad = Money::from_float(1099.0); // NO SUCH METHOD EXISTS!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (paise).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results (refund deltas) can dip negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Round-half-up**: all percentage math rounds half-up at the paisa,
///   matching how the storefront quantizes to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let price = Money::from_paise(1099); // ₹10.99
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let threshold = Money::from_rupees(1000);
    /// assert_eq!(threshold.paise(), 100_000);
    /// ```
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise (smallest currency unit).
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
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

    /// Clamps a negative value up to zero.
    ///
    /// Grand totals and recomputed order totals are floored at zero;
    /// a coupon can never make an order pay the customer.
    #[inline]
    pub const fn floor_at_zero(&self) -> Self {
        if self.0 < 0 {
            Money::zero()
        } else {
            *self
        }
    }

    /// Computes a basis-point fraction of this amount, rounding half-up
    /// at the paisa.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`.
    /// The +5000 provides the half-up rounding (5000/10000 = 0.5).
    /// i128 intermediates prevent overflow on large carts.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let subtotal = Money::from_paise(120_000); // ₹1200.00
    /// let gst = subtotal.percent_bps(1800);      // 18%
    /// assert_eq!(gst.paise(), 21_600);           // ₹216.00
    /// ```
    pub fn percent_bps(&self, bps: u32) -> Money {
        let part = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_paise(part as i64)
    }

    /// Calculates tax on this amount at the given rate.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use bazaar_core::types::TaxRate;
    ///
    /// let taxable = Money::from_paise(108_000); // ₹1080.00
    /// let gst = taxable.tax(TaxRate::from_bps(1800));
    /// assert_eq!(gst.paise(), 19_440);          // ₹194.40
    /// ```
    #[inline]
    pub fn tax(&self, rate: TaxRate) -> Money {
        self.percent_bps(rate.bps())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let unit_price = Money::from_paise(30_000); // ₹300.00
    /// assert_eq!(unit_price.multiply_quantity(2).paise(), 60_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. Presentation layers own real formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

/// Default money is zero.
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

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Summation over line totals.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paise() {
        let money = Money::from_paise(1099);
        assert_eq!(money.paise(), 1099);
        assert_eq!(money.rupees(), 10);
        assert_eq!(money.paise_part(), 99);
    }

    #[test]
    fn test_from_rupees() {
        assert_eq!(Money::from_rupees(1000).paise(), 100_000);
        assert_eq!(Money::from_rupees(-5).paise(), -500);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_paise(1099)), "₹10.99");
        assert_eq!(format!("{}", Money::from_paise(500)), "₹5.00");
        assert_eq!(format!("{}", Money::from_paise(-550)), "-₹5.50");
        assert_eq!(format!("{}", Money::from_paise(0)), "₹0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(500);

        assert_eq!((a + b).paise(), 1500);
        assert_eq!((a - b).paise(), 500);
        assert_eq!((a * 3).paise(), 3000);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        // 25 paise × 18% = 4.5 paise → 5 paise with half-up.
        assert_eq!(Money::from_paise(25).percent_bps(1800).paise(), 5);
        // 18% of ₹0.24 = 4.32 paise → 4 paise.
        assert_eq!(Money::from_paise(24).percent_bps(1800).paise(), 4);
    }

    #[test]
    fn test_gst_on_spec_amounts() {
        // ₹1200.00 at 18% = ₹216.00
        assert_eq!(Money::from_rupees(1200).percent_bps(1800).paise(), 21_600);
        // ₹800.00 at 18% = ₹144.00
        assert_eq!(Money::from_rupees(800).percent_bps(1800).paise(), 14_400);
        // ₹1080.00 at 18% = ₹194.40
        assert_eq!(Money::from_rupees(1080).percent_bps(1800).paise(), 19_440);
    }

    #[test]
    fn test_floor_at_zero() {
        assert_eq!(Money::from_paise(-100).floor_at_zero(), Money::zero());
        assert_eq!(Money::from_paise(100).floor_at_zero().paise(), 100);
    }

    #[test]
    fn test_sum() {
        let total: Money = [500, 700]
            .iter()
            .map(|r| Money::from_rupees(*r))
            .sum();
        assert_eq!(total.paise(), 120_000);
    }

    #[test]
    fn test_min() {
        let a = Money::from_paise(100);
        let b = Money::from_paise(200);
        assert_eq!(a.min(b), a);
        assert_eq!(b.min(a), a);
    }
}
