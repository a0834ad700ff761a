//! # agro-core: Pure Business Logic for Agro POS
//!
//! Everything the point-of-sale engine computes without touching the network:
//! cart lines and their uniqueness rule, the cart projection, vouchers and
//! manual discounts, and the disease-to-remedy matching used by search.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Agro POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    pos-shell (CLI front end)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        agro-pos: tabs, edit sessions, checkout, history         │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────────┐  ┌────────────▼───────────────┐   │
//! │  │     ★ agro-core (THIS CRATE) ★  │  │  agro-gateway (HTTP/JSON)  │   │
//! │  │                                 │  │  commerce backend client   │   │
//! │  │  money  cart  discount  disease │  └────────────────────────────┘   │
//! │  │  catalog  text  validation      │                                    │
//! │  │                                 │                                    │
//! │  │  NO I/O • NO TIMERS • PURE      │                                    │
//! │  └─────────────────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type in minor units (integer only)
//! - [`types`] - VAT rate, customer, fulfillment, payment method
//! - [`cart`] - Cart lines, merge rule and the totals projection
//! - [`discount`] - Vouchers and the manual percent/amount discount
//! - [`catalog`] - Product/variant model and variant-to-line conversion
//! - [`disease`] - Disease reference data and remedy ranking
//! - [`text`] - Case and diacritics folding for search
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use agro_core::cart::project;
//! use agro_core::money::Money;
//! use agro_core::types::VatRate;
//!
//! let totals = project(&[], Money::from_minor(10_000), Money::zero(), VatRate::zero());
//! assert_eq!(totals.total.minor(), -10_000);
//! assert!(totals.is_negative_total());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod discount;
pub mod disease;
pub mod error;
pub mod money;
pub mod text;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals, LineKey, LineSync};
pub use catalog::{Product, ProductVariant};
pub use discount::{DiscountMode, ManualDiscount, Voucher, VoucherEffect};
pub use disease::{DiseaseIndex, DiseaseRecord, RankedProduct};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in one tab.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches a mistyped quantity (1000 instead of 10) before it reaches the
/// backend.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Currency used when the region does not name one.
pub const DEFAULT_CURRENCY: &str = "vnd";
