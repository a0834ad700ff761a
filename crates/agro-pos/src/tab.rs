//! # Order Tabs
//!
//! One tab per draft order the cashier has open. A tab carries its own
//! status fields instead of the registry keeping side lists of "loading" or
//! "deleting" ids.
//!
//! ## Session State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            select / reopen                                              │
//! │   Idle ─────────────────► Opening ──────► Open ───────► Confirming      │
//! │    ▲                         │ fail         │  quiet       │           │
//! │    │◄────────────────────────┘              │  period      │ ok: reopen │
//! │    │                                        │              ▼           │
//! │    │◄──────────── Cancelling ◄──────────────┘          Opening         │
//! │         (another tab selected)                                          │
//! │                                                                         │
//! │  At most one tab is Opening, Open or Confirming at any instant.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use agro_core::cart::{project, Cart, CartTotals};
use agro_core::discount::ManualDiscount;
use agro_core::money::Money;
use agro_core::types::{Customer, Fulfillment, VatRate};
use agro_gateway::DraftOrder;
use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// Status Fields
// =============================================================================

/// Whether the tab accepts edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
    Ready,
    /// Remote delete in flight; the tab bar shows it disabled.
    Deleting,
}

/// Remote edit-session state of a draft order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Opening,
    Open,
    Confirming,
    Cancelling,
}

impl SessionState {
    /// True while the tab owns the single remote edit session.
    pub fn holds_session(&self) -> bool {
        matches!(
            self,
            SessionState::Opening | SessionState::Open | SessionState::Confirming
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Confirming => "confirming",
            SessionState::Cancelling => "cancelling",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Order Tab
// =============================================================================

/// A draft order being edited at the counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTab {
    /// Remote draft order id.
    pub id: String,
    /// Display ordinal ("Đơn 3"); not unique across reloads.
    pub label: u32,
    pub display_id: Option<i64>,
    pub cart: Cart,
    pub customer: Option<Customer>,
    /// Discount currently applied, in minor units.
    pub discount: Money,
    /// Voucher that produced `discount`, if any.
    pub selected_voucher: Option<String>,
    /// Manual entry that produced `discount`, if any.
    pub manual_discount: Option<ManualDiscount>,
    pub fulfillment: Fulfillment,
    pub status: TabStatus,
    pub session: SessionState,
    /// Remote line-item calls not yet answered.
    pub in_flight: u32,
    pub created_at: DateTime<Utc>,
}

impl OrderTab {
    /// A tab for a draft the backend just returned.
    pub fn from_draft(draft: &DraftOrder, label: u32) -> Self {
        OrderTab {
            id: draft.id.clone(),
            label,
            display_id: draft.display_id,
            cart: Cart::from_lines(draft.cart_lines()),
            customer: None,
            discount: Money::zero(),
            selected_voucher: None,
            manual_discount: None,
            fulfillment: Fulfillment::Pickup,
            status: TabStatus::Ready,
            session: SessionState::Idle,
            in_flight: 0,
            created_at: draft.created_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn shipping_fee(&self) -> Money {
        self.fulfillment.shipping_fee()
    }

    pub fn totals(&self, vat_rate: VatRate) -> CartTotals {
        project(
            self.cart.lines(),
            self.discount,
            self.shipping_fee(),
            vat_rate,
        )
    }

    /// Drives the "syncing" indicator.
    pub fn is_syncing(&self) -> bool {
        self.in_flight > 0
            || matches!(
                self.session,
                SessionState::Opening | SessionState::Confirming | SessionState::Cancelling
            )
    }

    pub fn has_failed_lines(&self) -> bool {
        self.cart.lines().iter().any(|l| l.sync.is_failed())
    }

    pub fn summary(&self, active: bool, vat_rate: VatRate) -> TabSummary {
        TabSummary {
            id: self.id.clone(),
            label: self.label,
            active,
            status: self.status,
            session: self.session,
            line_count: self.cart.line_count(),
            total: self.totals(vat_rate).total,
            syncing: self.is_syncing(),
            has_failed_lines: self.has_failed_lines(),
        }
    }
}

/// Tab bar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub id: String,
    pub label: u32,
    pub active: bool,
    pub status: TabStatus,
    pub session: SessionState,
    pub line_count: usize,
    pub total: Money,
    pub syncing: bool,
    pub has_failed_lines: bool,
}
