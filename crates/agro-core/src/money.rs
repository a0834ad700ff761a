//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  The shop sells in VND, which has no minor unit, so one unit of         │
//! │  Money is one đồng. Other currencies use their smallest unit.          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    150000 × 2 = 300000 exactly, every time                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use agro_core::money::Money;
//!
//! let price = Money::from_minor(150_000); // 150.000 ₫
//! let line = price * 2;
//! assert_eq!(line.minor(), 300_000);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::VatRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: a discount larger than the subtotal yields a negative
///   total, which the cart projection reports instead of hiding
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  VariantPrice.amount ──► CartLine.unit_price ──► line total            │
/// │                                                                         │
/// │  Σ line totals ──► subtotal ──► VAT ──► − discount + shipping ──► total │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (đồng for VND).
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
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
    /// use agro_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(150_000);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 450_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Calculates VAT on this amount.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, the +5000 rounds half up.
    ///
    /// ```rust
    /// use agro_core::money::Money;
    /// use agro_core::types::VatRate;
    ///
    /// let subtotal = Money::from_minor(300_000);
    /// assert_eq!(subtotal.calculate_vat(VatRate::from_bps(1000)).minor(), 30_000);
    /// assert!(subtotal.calculate_vat(VatRate::zero()).is_zero());
    /// ```
    pub fn calculate_vat(&self, rate: VatRate) -> Money {
        // i128 keeps large wholesale orders from overflowing
        let vat = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_minor(vat as i64)
    }

    /// Returns `percent`% of this amount, rounded half up.
    ///
    /// ```rust
    /// use agro_core::money::Money;
    ///
    /// let subtotal = Money::from_minor(300_000);
    /// assert_eq!(subtotal.percentage(20).minor(), 60_000);
    /// ```
    pub fn percentage(&self, percent: u32) -> Money {
        let part = (self.0 as i128 * percent as i128 * 100 + 5000) / 10000;
        Money::from_minor(part as i64)
    }
}

/// Deserializes a gateway amount that may arrive as an integer, a float or a
/// numeric string (`150000`, `150000.0`, `"150000"`).
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(Money::from_minor(v)),
        Raw::Float(v) => Ok(Money::from_minor(v.round() as i64)),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(|v| Money::from_minor(v.round() as i64))
            .map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount with dot thousands separators and the đồng sign.
///
/// ## Note
/// This is for logs and the terminal shell. A graphical front end formats
/// with its own locale rules.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{} ₫", sign, grouped)
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
