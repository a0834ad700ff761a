//! # Vouchers and Manual Discount
//!
//! Two ways for a cashier to change the discount of a tab:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Discount Paths                                       │
//! │                                                                         │
//! │  Voucher list ──► select_voucher() ──┐                                  │
//! │   (one selected per tab)             │                                  │
//! │                                      ├──► DiscountState.discount        │
//! │  Manual input ──► manual.apply() ────┘    (last writer wins)            │
//! │   (percent ⇄ amount toggle)                                             │
//! │                                                                         │
//! │  FreeShipping voucher also zeroes the shipping fee.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing stacks: selecting a voucher overwrites the previous discount, and
//! a manual entry overwrites a voucher's discount.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Voucher
// =============================================================================

/// What a voucher does when selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VoucherEffect {
    /// Waives the shipping fee.
    FreeShipping,
    /// Percentage of the subtotal (0..=100).
    Percent(u32),
    /// Fixed amount off.
    Fixed(Money),
}

/// A promotion the cashier can pick from the static list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Voucher {
    pub code: String,
    pub label: String,
    pub effect: VoucherEffect,
    /// Upper bound for percentage vouchers.
    #[serde(default)]
    pub max_discount: Option<Money>,
}

/// Discount-related state of a tab after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountOutcome {
    pub discount: Money,
    pub shipping_fee: Money,
}

impl Voucher {
    /// Applies the voucher to a tab with the given subtotal and shipping fee.
    pub fn apply(&self, subtotal: Money, shipping_fee: Money) -> DiscountOutcome {
        match &self.effect {
            VoucherEffect::FreeShipping => DiscountOutcome {
                discount: Money::zero(),
                shipping_fee: Money::zero(),
            },
            VoucherEffect::Percent(percent) => {
                let mut discount = subtotal.percentage(*percent);
                if let Some(cap) = self.max_discount {
                    discount = discount.min(cap);
                }
                DiscountOutcome {
                    discount,
                    shipping_fee,
                }
            }
            VoucherEffect::Fixed(amount) => DiscountOutcome {
                discount: *amount,
                shipping_fee,
            },
        }
    }

    /// Checks the voucher definition itself.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "voucher code".to_string(),
            });
        }
        match &self.effect {
            VoucherEffect::Percent(p) if *p > 100 => Err(ValidationError::OutOfRange {
                field: format!("voucher {} percent", self.code),
                min: 0,
                max: 100,
            }),
            VoucherEffect::Fixed(amount) if amount.is_negative() => {
                Err(ValidationError::MustBePositive {
                    field: format!("voucher {} amount", self.code),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Looks up a voucher by code (case-insensitive).
pub fn find_voucher<'a>(vouchers: &'a [Voucher], code: &str) -> CoreResult<&'a Voucher> {
    vouchers
        .iter()
        .find(|v| v.code.eq_ignore_ascii_case(code.trim()))
        .ok_or_else(|| CoreError::UnknownVoucher(code.to_string()))
}

/// Rejects a voucher list with duplicate codes or invalid entries.
pub fn validate_vouchers(vouchers: &[Voucher]) -> Result<(), ValidationError> {
    for (i, voucher) in vouchers.iter().enumerate() {
        voucher.validate()?;
        if vouchers[..i]
            .iter()
            .any(|v| v.code.eq_ignore_ascii_case(&voucher.code))
        {
            return Err(ValidationError::Duplicate {
                field: "voucher code".to_string(),
                value: voucher.code.clone(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Manual Discount
// =============================================================================

/// Interpretation of the raw manual discount value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountMode {
    /// Raw value is a percentage of the subtotal.
    Percent,
    /// Raw value is an amount in minor units.
    Amount,
}

impl DiscountMode {
    pub fn toggled(self) -> DiscountMode {
        match self {
            DiscountMode::Percent => DiscountMode::Amount,
            DiscountMode::Amount => DiscountMode::Percent,
        }
    }
}

/// The value the cashier typed plus the mode it was typed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManualDiscount {
    pub mode: DiscountMode,
    pub raw: i64,
}

impl ManualDiscount {
    /// Validates and builds a manual discount.
    pub fn new(mode: DiscountMode, raw: i64) -> Result<Self, ValidationError> {
        match mode {
            DiscountMode::Percent if !(0..=100).contains(&raw) => {
                Err(ValidationError::OutOfRange {
                    field: "discount percent".to_string(),
                    min: 0,
                    max: 100,
                })
            }
            DiscountMode::Amount if raw < 0 => Err(ValidationError::OutOfRange {
                field: "discount amount".to_string(),
                min: 0,
                max: i64::MAX,
            }),
            _ => Ok(ManualDiscount { mode, raw }),
        }
    }

    /// Discount for a subtotal under the current mode.
    pub fn amount(&self, subtotal: Money) -> Money {
        match self.mode {
            DiscountMode::Percent => subtotal.percentage(self.raw.clamp(0, 100) as u32),
            DiscountMode::Amount => Money::from_minor(self.raw.max(0)),
        }
    }

    /// Same raw value read under the other mode.
    ///
    /// A raw value above 100 cannot be a percentage, so toggling an amount
    /// like 50000 into percent mode clamps it to 100.
    pub fn toggled(&self) -> ManualDiscount {
        let mode = self.mode.toggled();
        let raw = match mode {
            DiscountMode::Percent => self.raw.clamp(0, 100),
            DiscountMode::Amount => self.raw,
        };
        ManualDiscount { mode, raw }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
