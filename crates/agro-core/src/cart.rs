//! # Cart Lines and Projection
//!
//! The line items of one order tab and the pure totals computed from them.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Cart Method             Line Change           │
//! │  ──────────────           ───────────             ───────────           │
//! │                                                                         │
//! │  Pick variant ───────────► add_line() ──────────► push or qty += n     │
//! │                                                                         │
//! │  [+] / [-] ──────────────► change_quantity() ───► qty ± 1 (min 1)      │
//! │                                                                         │
//! │  Type quantity ──────────► set_quantity() ──────► qty = n              │
//! │                                                                         │
//! │  Click remove ───────────► remove() ────────────► line dropped         │
//! │                                                                         │
//! │  Any change ─────────────► project() ───────────► CartTotals           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by [`LineKey`] `(product_id, variant_label, tech_specs)`
//! - Quantity is always in `1..=MAX_LINE_QUANTITY`; decrement stops at 1
//! - At most `MAX_CART_LINES` lines

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::VatRate;
use crate::validation::validate_quantity;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Line Key
// =============================================================================

/// Uniqueness key of a cart line.
///
/// Two picks of the same product are the same line only when the variant
/// label and the technical spec text (concentration, origin, ...) match too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineKey {
    pub product_id: String,
    pub variant_label: String,
    pub tech_specs: String,
}

impl LineKey {
    pub fn new(
        product_id: impl Into<String>,
        variant_label: impl Into<String>,
        tech_specs: impl Into<String>,
    ) -> Self {
        LineKey {
            product_id: product_id.into(),
            variant_label: variant_label.into(),
            tech_specs: tech_specs.into(),
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.variant_label)?;
        if !self.tech_specs.is_empty() {
            write!(f, " [{}]", self.tech_specs)?;
        }
        Ok(())
    }
}

// =============================================================================
// Line Sync State
// =============================================================================

/// Remote state of a line after its last mutation.
///
/// The local quantity is applied before the gateway answers; this records
/// whether the gateway has caught up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LineSync {
    /// A remote call for this line is in flight.
    Pending,
    /// The gateway reflects the local line.
    Synced,
    /// The last remote call failed; the local line was kept as is.
    Failed { reason: String },
}

impl LineSync {
    pub fn is_failed(&self) -> bool {
        matches!(self, LineSync::Failed { .. })
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One distinct (product, variant, tech spec) entry in an order tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,

    /// Remote variant id, used when adding the line to the draft order.
    pub variant_id: String,

    /// Remote line-item id; absent until the first add round trip succeeds.
    pub line_item_id: Option<String>,

    pub name: String,

    /// Price frozen at pick time.
    pub unit_price: Money,

    pub quantity: i64,

    pub variant_label: String,

    pub image: Option<String>,

    /// Free-text variant disambiguator (concentration, origin, ...).
    pub tech_specs: String,

    pub sync: LineSync,
}

impl CartLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(&self.product_id, &self.variant_label, &self.tech_specs)
    }

    pub fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id
            && self.variant_label == key.variant_label
            && self.tech_specs == key.tech_specs
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// What `Cart::add_line` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended at this index.
    Inserted { index: usize },
    /// An existing line absorbed the quantity.
    Merged { index: usize, quantity: i64 },
}

/// Quantity before and after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityChange {
    pub before: i64,
    pub after: i64,
}

impl QuantityChange {
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Ordered line items of one tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Builds a cart from authoritative remote lines.
    ///
    /// Lines sharing a key are folded into the first one so the uniqueness
    /// invariant holds even if the backend returns duplicates.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Cart::new();
        for line in lines {
            match cart.lines.iter_mut().find(|l| l.matches(&line.key())) {
                Some(existing) => existing.quantity += line.quantity,
                None => cart.lines.push(line),
            }
        }
        cart
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(key))
    }

    pub fn line_mut(&mut self, key: &LineKey) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.matches(key))
    }

    /// Adds a line, or merges its quantity into the line with the same key.
    pub fn add_line(&mut self, line: CartLine) -> CoreResult<AddOutcome> {
        validate_quantity(line.quantity)?;

        let key = line.key();
        if let Some(index) = self.lines.iter().position(|l| l.matches(&key)) {
            let existing = &mut self.lines[index];
            let quantity = existing.quantity + line.quantity;
            if quantity > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: quantity,
                    max: MAX_LINE_QUANTITY,
                });
            }
            existing.quantity = quantity;
            return Ok(AddOutcome::Merged { index, quantity });
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }

        self.lines.push(line);
        Ok(AddOutcome::Inserted {
            index: self.lines.len() - 1,
        })
    }

    /// Applies a quantity delta. Decrements stop at 1.
    pub fn change_quantity(&mut self, key: &LineKey, delta: i64) -> CoreResult<QuantityChange> {
        let line = self
            .line_mut(key)
            .ok_or_else(|| CoreError::LineNotFound(key.to_string()))?;

        let before = line.quantity;
        let after = (before + delta).max(1);
        if after > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: after,
                max: MAX_LINE_QUANTITY,
            });
        }
        line.quantity = after;
        Ok(QuantityChange { before, after })
    }

    /// Sets an absolute quantity (must be in `1..=MAX_LINE_QUANTITY`).
    pub fn set_quantity(&mut self, key: &LineKey, quantity: i64) -> CoreResult<QuantityChange> {
        validate_quantity(quantity)?;
        let line = self
            .line_mut(key)
            .ok_or_else(|| CoreError::LineNotFound(key.to_string()))?;

        let before = line.quantity;
        line.quantity = quantity;
        Ok(QuantityChange {
            before,
            after: quantity,
        })
    }

    /// Removes a line and returns it.
    pub fn remove(&mut self, key: &LineKey) -> CoreResult<CartLine> {
        let index = self
            .lines
            .iter()
            .position(|l| l.matches(key))
            .ok_or_else(|| CoreError::LineNotFound(key.to_string()))?;
        Ok(self.lines.remove(index))
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all quantities.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Σ unit price × quantity.
    pub fn subtotal(&self) -> Money {
        subtotal(&self.lines)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Projection
// =============================================================================

/// Totals shown under the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub vat: Money,
    pub discount: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

impl CartTotals {
    /// True when the discount outweighs everything else.
    ///
    /// The total is reported as is rather than clamped to zero; callers flag
    /// it to the cashier.
    pub fn is_negative_total(&self) -> bool {
        self.total.is_negative()
    }
}

/// Σ unit price × quantity over a slice of lines.
pub fn subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_total).sum()
}

/// Computes the cart totals.
///
/// ```text
/// subtotal = Σ unit_price × quantity
/// vat      = subtotal × vat_rate
/// total    = subtotal + vat − discount + shipping_fee
/// ```
///
/// Pure: the same inputs always give the same totals.
pub fn project(
    lines: &[CartLine],
    discount: Money,
    shipping_fee: Money,
    vat_rate: VatRate,
) -> CartTotals {
    let subtotal = subtotal(lines);
    let vat = subtotal.calculate_vat(vat_rate);
    CartTotals {
        line_count: lines.len(),
        total_quantity: lines.iter().map(|l| l.quantity).sum(),
        subtotal,
        vat,
        discount,
        shipping_fee,
        total: subtotal + vat - discount + shipping_fee,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
