//! # Domain Types
//!
//! Small value types shared by the cart, the tabs and the checkout.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    VatRate      │   │    Customer     │   │  Fulfillment    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  name           │   │  Pickup         │       │
//! │  │  0 by default   │   │  phone          │   │  Delivery {     │       │
//! │  └─────────────────┘   │  address        │   │   fee, partner }│       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │ PaymentMethod   │                                                   │
//! │  │  Cash | Qr      │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// VAT Rate
// =============================================================================

/// VAT rate represented in basis points (bps).
///
/// 1 basis point = 0.01%. The shop currently charges no VAT at the till, so
/// the configured default is zero; the field is kept for a future tax policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VatRate(u32);

impl VatRate {
    /// Creates a VAT rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        VatRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero VAT.
    #[inline]
    pub const fn zero() -> Self {
        VatRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        VatRate::zero()
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Customer attached to an order tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
}

// =============================================================================
// Fulfillment
// =============================================================================

/// How the goods leave the shop.
///
/// Shipping fee and partner only exist for deliveries, so they live inside
/// the variant instead of as loose optional fields on the tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fulfillment {
    /// Customer takes the goods at the counter.
    Pickup,
    /// Shipped by a partner (e.g. a local courier).
    Delivery {
        shipping_fee: Money,
        shipping_partner: Option<String>,
    },
}

impl Fulfillment {
    /// Shipping fee charged on the order (zero for pickup).
    pub fn shipping_fee(&self) -> Money {
        match self {
            Fulfillment::Pickup => Money::zero(),
            Fulfillment::Delivery { shipping_fee, .. } => *shipping_fee,
        }
    }

    /// Shipping partner name, if any.
    pub fn shipping_partner(&self) -> Option<&str> {
        match self {
            Fulfillment::Pickup => None,
            Fulfillment::Delivery {
                shipping_partner, ..
            } => shipping_partner.as_deref(),
        }
    }

    /// Returns the same fulfillment with the shipping fee replaced.
    /// Pickup stays pickup.
    pub fn with_shipping_fee(&self, fee: Money) -> Fulfillment {
        match self {
            Fulfillment::Pickup => Fulfillment::Pickup,
            Fulfillment::Delivery {
                shipping_partner, ..
            } => Fulfillment::Delivery {
                shipping_fee: fee,
                shipping_partner: shipping_partner.clone(),
            },
        }
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self, Fulfillment::Delivery { .. })
    }
}

impl Default for Fulfillment {
    fn default() -> Self {
        Fulfillment::Pickup
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a draft order was paid at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash at the counter.
    Cash,
    /// Bank transfer by scanning a QR code.
    Qr,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Qr => write!(f, "qr"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vat_rate() {
        let rate = VatRate::from_bps(1000);
        assert_eq!(rate.bps(), 1000);
        assert!((rate.percentage() - 10.0).abs() < 0.001);
        assert!(VatRate::default().is_zero());
    }

    #[test]
    fn test_fulfillment_shipping_fee() {
        assert!(Fulfillment::Pickup.shipping_fee().is_zero());

        let delivery = Fulfillment::Delivery {
            shipping_fee: Money::from_minor(30_000),
            shipping_partner: Some("GHTK".into()),
        };
        assert_eq!(delivery.shipping_fee().minor(), 30_000);
        assert_eq!(delivery.shipping_partner(), Some("GHTK"));

        let waived = delivery.with_shipping_fee(Money::zero());
        assert!(waived.shipping_fee().is_zero());
        assert_eq!(waived.shipping_partner(), Some("GHTK"));
        assert_eq!(Fulfillment::Pickup.with_shipping_fee(Money::from_minor(1)), Fulfillment::Pickup);
    }

    #[test]
    fn test_fulfillment_serde_tag() {
        let json = serde_json::to_string(&Fulfillment::Pickup).unwrap();
        assert_eq!(json, r#"{"kind":"pickup"}"#);
    }
}
