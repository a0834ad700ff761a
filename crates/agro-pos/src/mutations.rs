//! # Tab Mutations
//!
//! Every cart edit is applied to the local tab first, under the registry
//! lock, and only then sent to the backend.
//!
//! ## Line Sync Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  local edit ──► plan ──┬── line has remote id ──────► update(quantity)  │
//! │  (sync=Pending)        ├── add already in flight ───► nothing (merged   │
//! │                        │                               when add lands)  │
//! │                        └── no remote id ────────────► add(line)         │
//! │                                                                         │
//! │  ensure_session ──► call gateway ──► settle                             │
//! │                                       ok:  Synced, confirm re-armed     │
//! │                                       err: Failed{reason}, emitted      │
//! │                                                                         │
//! │  When an add lands: record the remote id; if the quantity moved in the  │
//! │  meantime send one update; if the line was removed, remove it remotely. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Local state is never rolled back. Quantities are sent as absolute values,
//! so the last call to land wins on the backend.

use agro_core::cart::{CartLine, LineKey, LineSync};
use agro_core::discount::{find_voucher, DiscountMode, ManualDiscount, VoucherEffect};
use agro_core::money::Money;
use agro_core::types::{Customer, Fulfillment};
use agro_core::validation::{validate_customer, validate_shipping_fee};
use agro_gateway::{LineItem, NewLineItem};
use tracing::{debug, info, warn};

use crate::engine::PosEngine;
use crate::error::{PosError, PosResult};
use crate::registry::TabEntry;
use crate::tab::OrderTab;

/// Remote call that brings a line in step with the local cart.
#[derive(Debug, Clone, PartialEq)]
enum LineCall {
    Add(NewLineItem),
    Update { line_item_id: String, quantity: i64 },
    Remove { line_item_id: String },
}

impl LineCall {
    fn name(&self) -> &'static str {
        match self {
            LineCall::Add(_) => "add",
            LineCall::Update { .. } => "update",
            LineCall::Remove { .. } => "remove",
        }
    }
}

/// Picks the call for a line that was just edited and marks it pending.
fn plan_line_call(entry: &mut TabEntry, key: &LineKey) -> Option<LineCall> {
    let line = entry.tab.cart.line_mut(key)?;

    let call = match &line.line_item_id {
        Some(id) => LineCall::Update {
            line_item_id: id.clone(),
            quantity: line.quantity,
        },
        None if entry.adding.contains(key) => {
            line.sync = LineSync::Pending;
            return None;
        }
        None => {
            entry.adding.insert(key.clone());
            LineCall::Add(NewLineItem::from_cart_line(line))
        }
    };

    line.sync = LineSync::Pending;
    entry.tab.in_flight += 1;
    Some(call)
}

/// Drops a line locally and picks the call that removes it remotely.
fn plan_remove(entry: &mut TabEntry, key: &LineKey) -> PosResult<Option<LineCall>> {
    let removed = entry.tab.cart.remove(key)?;
    match removed.line_item_id {
        Some(line_item_id) => {
            entry.tab.in_flight += 1;
            Ok(Some(LineCall::Remove { line_item_id }))
        }
        // The pending add removes it on landing
        None => {
            if entry.adding.contains(key) {
                entry.removed_while_adding.insert(key.clone());
            }
            Ok(None)
        }
    }
}

/// Applies a remote result to the tab and returns the follow-up call, if
/// the line moved while the call was in flight.
fn settle_line_call(
    entry: &mut TabEntry,
    key: &LineKey,
    call: &LineCall,
    result: &PosResult<Option<LineItem>>,
) -> Option<LineCall> {
    entry.tab.in_flight = entry.tab.in_flight.saturating_sub(1);
    let removed_by_user = match call {
        LineCall::Add(_) => {
            entry.adding.remove(key);
            entry.removed_while_adding.remove(key)
        }
        _ => false,
    };

    let added = match result {
        Err(err) => {
            if let Some(line) = entry.tab.cart.line_mut(key) {
                line.sync = LineSync::Failed {
                    reason: err.to_string(),
                };
            }
            return None;
        }
        Ok(added) => added,
    };

    let follow_up = match (call, added) {
        (LineCall::Add(_), Some(item)) => match entry.tab.cart.line_mut(key) {
            None if removed_by_user => Some(LineCall::Remove {
                line_item_id: item.id.clone(),
            }),
            // Dropped by a reload, not by the user: the backend copy stands
            None => {
                if entry.tab.cart.add_line(item.to_cart_line()).is_err() {
                    debug!(line = %key, "Landed line no longer fits the cart");
                }
                None
            }
            Some(line) => {
                line.line_item_id = Some(item.id.clone());
                if line.quantity != item.quantity {
                    Some(LineCall::Update {
                        line_item_id: item.id.clone(),
                        quantity: line.quantity,
                    })
                } else {
                    line.sync = LineSync::Synced;
                    None
                }
            }
        },
        (LineCall::Update { .. }, _) => {
            if let Some(line) = entry.tab.cart.line_mut(key) {
                line.sync = LineSync::Synced;
            }
            None
        }
        _ => None,
    };

    if follow_up.is_some() {
        entry.tab.in_flight += 1;
    }
    follow_up
}

impl PosEngine {
    // =========================================================================
    // Cart Edits
    // =========================================================================

    /// Adds a picked line to the active tab, merging with an existing line of
    /// the same key.
    pub async fn add_to_cart(&self, line: CartLine) -> PosResult<()> {
        let key = line.key();
        let (tab_id, call) = {
            let mut reg = self.inner.registry.write().await;
            let entry = reg.active_entry_mut()?;
            entry.tab.cart.add_line(line)?;
            (entry.tab.id.clone(), plan_line_call(entry, &key))
        };
        debug!(tab_id = %tab_id, line = %key, "Added to cart");
        self.sync_line(&tab_id, &key, call).await;
        Ok(())
    }

    /// Applies a quantity delta (`+1` / `-1` buttons). Decrements stop at 1.
    pub async fn change_quantity(&self, key: &LineKey, delta: i64) -> PosResult<()> {
        let (tab_id, call) = {
            let mut reg = self.inner.registry.write().await;
            let entry = reg.active_entry_mut()?;
            let change = entry.tab.cart.change_quantity(key, delta)?;
            if change.is_noop() {
                return Ok(());
            }
            (entry.tab.id.clone(), plan_line_call(entry, key))
        };
        self.sync_line(&tab_id, key, call).await;
        Ok(())
    }

    /// Sets an absolute quantity.
    pub async fn set_quantity(&self, key: &LineKey, quantity: i64) -> PosResult<()> {
        let (tab_id, call) = {
            let mut reg = self.inner.registry.write().await;
            let entry = reg.active_entry_mut()?;
            let change = entry.tab.cart.set_quantity(key, quantity)?;
            if change.is_noop() {
                return Ok(());
            }
            (entry.tab.id.clone(), plan_line_call(entry, key))
        };
        self.sync_line(&tab_id, key, call).await;
        Ok(())
    }

    /// Drops a line from the active tab.
    pub async fn remove_line(&self, key: &LineKey) -> PosResult<()> {
        let (tab_id, call) = {
            let mut reg = self.inner.registry.write().await;
            let entry = reg.active_entry_mut()?;
            let call = plan_remove(entry, key)?;
            (entry.tab.id.clone(), call)
        };
        self.sync_line(&tab_id, key, call).await;
        Ok(())
    }

    /// Sends a line call and any follow-ups, then re-arms the confirm.
    async fn sync_line(&self, tab_id: &str, key: &LineKey, call: Option<LineCall>) {
        self.emit_tabs().await;
        self.warn_on_negative_total().await;

        let mut next = call;
        while let Some(call) = next {
            self.inner.emitter.emit_syncing(tab_id, true);

            let result = match self.ensure_session(tab_id).await {
                Ok(()) => self.send_line_call(tab_id, &call).await,
                Err(err) => Err(err),
            };

            let syncing = {
                let mut reg = self.inner.registry.write().await;
                let Some(entry) = reg.get_mut(tab_id) else {
                    debug!(tab_id, "Tab gone before line sync settled");
                    return;
                };
                next = settle_line_call(entry, key, &call, &result);
                if result.is_ok() && next.is_none() {
                    self.schedule_confirm(entry);
                }
                entry.tab.is_syncing()
            };

            if let Err(err) = &result {
                warn!(tab_id, line = %key, call = call.name(), error = %err, "Line sync failed");
                self.inner.emitter.emit_error(&err.report());
            }
            self.inner.emitter.emit_syncing(tab_id, syncing);
            self.emit_tabs().await;
        }
    }

    async fn send_line_call(&self, tab_id: &str, call: &LineCall) -> PosResult<Option<LineItem>> {
        let gateway = &self.inner.gateway;
        let result = match call {
            LineCall::Add(item) => gateway.add_line_item(tab_id, item).await.map(Some),
            LineCall::Update {
                line_item_id,
                quantity,
            } => gateway
                .update_line_item(tab_id, line_item_id, *quantity)
                .await
                .map(|_| None),
            LineCall::Remove { line_item_id } => gateway
                .remove_line_item(tab_id, line_item_id)
                .await
                .map(|_| None),
        };
        Ok(result?)
    }

    async fn warn_on_negative_total(&self) {
        if let Some(totals) = self.active_totals().await {
            if totals.is_negative_total() {
                warn!(total = totals.total.minor(), discount = totals.discount.minor(), "Discount exceeds order value");
            }
        }
    }

    // =========================================================================
    // Discounts
    // =========================================================================

    /// Applies a voucher from the configured list to the active tab.
    ///
    /// Replaces any earlier voucher or manual discount.
    pub async fn select_voucher(&self, code: &str) -> PosResult<OrderTab> {
        let voucher = find_voucher(&self.inner.settings.vouchers, code)?.clone();

        let tab = self
            .update_active(|tab| {
                let outcome = voucher.apply(tab.cart.subtotal(), tab.shipping_fee());
                tab.discount = outcome.discount;
                if voucher.effect == VoucherEffect::FreeShipping {
                    tab.fulfillment = tab.fulfillment.with_shipping_fee(outcome.shipping_fee);
                }
                tab.selected_voucher = Some(voucher.code.clone());
                tab.manual_discount = None;
                Ok(())
            })
            .await?;

        info!(tab_id = %tab.id, voucher = %voucher.code, discount = tab.discount.minor(), "Voucher applied");
        Ok(tab)
    }

    pub async fn clear_voucher(&self) -> PosResult<OrderTab> {
        self.update_active(|tab| {
            if tab.selected_voucher.take().is_some() {
                tab.discount = Money::zero();
            }
            Ok(())
        })
        .await
    }

    /// Sets the manual discount. Replaces any selected voucher.
    pub async fn set_manual_discount(&self, mode: DiscountMode, raw: i64) -> PosResult<OrderTab> {
        let manual = ManualDiscount::new(mode, raw)?;
        self.update_active(|tab| {
            tab.discount = manual.amount(tab.cart.subtotal());
            tab.manual_discount = Some(manual);
            tab.selected_voucher = None;
            Ok(())
        })
        .await
    }

    /// Flips percent and amount, recomputing the discount from the same raw
    /// value. Without a manual discount the tab is left as is.
    pub async fn toggle_manual_mode(&self) -> PosResult<OrderTab> {
        self.update_active(|tab| {
            let Some(manual) = tab.manual_discount.map(|m| m.toggled()) else {
                return Ok(());
            };
            tab.discount = manual.amount(tab.cart.subtotal());
            tab.manual_discount = Some(manual);
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Customer and Fulfillment
    // =========================================================================

    pub async fn set_customer(&self, customer: Customer) -> PosResult<OrderTab> {
        validate_customer(&customer)?;
        self.update_active(move |tab| {
            tab.customer = Some(customer);
            Ok(())
        })
        .await
    }

    pub async fn clear_customer(&self) -> PosResult<OrderTab> {
        self.update_active(|tab| {
            tab.customer = None;
            Ok(())
        })
        .await
    }

    pub async fn set_fulfillment(&self, fulfillment: Fulfillment) -> PosResult<OrderTab> {
        validate_shipping_fee(fulfillment.shipping_fee().minor())?;
        self.update_active(move |tab| {
            tab.fulfillment = fulfillment;
            Ok(())
        })
        .await
    }

    /// Runs a local-only edit on the active tab and returns the result.
    async fn update_active<F>(&self, edit: F) -> PosResult<OrderTab>
    where
        F: FnOnce(&mut OrderTab) -> PosResult<()>,
    {
        let tab = {
            let mut reg = self.inner.registry.write().await;
            let entry = reg.active_entry_mut()?;
            edit(&mut entry.tab)?;
            entry.tab.clone()
        };
        self.emit_tabs().await;
        self.warn_on_negative_total().await;
        Ok(tab)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::OrderTab;
    use agro_gateway::DraftOrder;

    fn entry() -> TabEntry {
        let draft: DraftOrder = serde_json::from_value(serde_json::json!({ "id": "d1" })).unwrap();
        TabEntry::new(OrderTab::from_draft(&draft, 1))
    }

    fn line(qty: i64) -> CartLine {
        CartLine {
            product_id: "p1".into(),
            variant_id: "v1".into(),
            line_item_id: None,
            name: "Amistar".into(),
            unit_price: Money::from_minor(150_000),
            quantity: qty,
            variant_label: "100ml".into(),
            image: None,
            tech_specs: String::new(),
            sync: LineSync::Pending,
        }
    }

    fn item(id: &str, qty: i64) -> LineItem {
        serde_json::from_value(serde_json::json!({
            "id": id, "variant_id": "v1", "product_id": "p1", "variant_title": "100ml",
            "quantity": qty, "unit_price": 150000
        }))
        .unwrap()
    }

    #[test]
    fn test_second_edit_during_add_sends_nothing() {
        let mut entry = entry();
        entry.tab.cart.add_line(line(1)).unwrap();
        let key = line(1).key();

        let first = plan_line_call(&mut entry, &key);
        assert!(matches!(first, Some(LineCall::Add(_))));

        entry.tab.cart.change_quantity(&key, 1).unwrap();
        assert_eq!(plan_line_call(&mut entry, &key), None);
        assert_eq!(entry.tab.in_flight, 1);

        // The add lands with quantity 1; one update reconciles to 2
        let follow = settle_line_call(&mut entry, &key, &first.unwrap(), &Ok(Some(item("li_1", 1))));
        assert_eq!(
            follow,
            Some(LineCall::Update {
                line_item_id: "li_1".into(),
                quantity: 2
            })
        );
        assert_eq!(entry.tab.cart.line(&key).unwrap().line_item_id.as_deref(), Some("li_1"));
        assert!(entry.adding.is_empty());
    }

    #[test]
    fn test_removed_during_add_is_removed_remotely() {
        let mut entry = entry();
        entry.tab.cart.add_line(line(1)).unwrap();
        let key = line(1).key();
        let add = plan_line_call(&mut entry, &key).unwrap();

        assert_eq!(plan_remove(&mut entry, &key).unwrap(), None);
        let follow = settle_line_call(&mut entry, &key, &add, &Ok(Some(item("li_9", 1))));
        assert_eq!(
            follow,
            Some(LineCall::Remove {
                line_item_id: "li_9".into()
            })
        );
        assert!(entry.removed_while_adding.is_empty());
    }

    #[test]
    fn test_line_dropped_by_reload_is_kept_when_add_lands() {
        let mut entry = entry();
        entry.tab.cart.add_line(line(1)).unwrap();
        let key = line(1).key();
        let add = plan_line_call(&mut entry, &key).unwrap();

        // Cart overwritten without the user touching the line
        entry.tab.cart = agro_core::cart::Cart::new();
        let follow = settle_line_call(&mut entry, &key, &add, &Ok(Some(item("li_3", 1))));
        assert_eq!(follow, None);
        let restored = entry.tab.cart.line(&key).unwrap();
        assert_eq!(restored.line_item_id.as_deref(), Some("li_3"));
        assert_eq!(entry.tab.in_flight, 0);
    }

    #[test]
    fn test_readding_after_remove_keeps_the_line() {
        let mut entry = entry();
        entry.tab.cart.add_line(line(1)).unwrap();
        let key = line(1).key();
        let add = plan_line_call(&mut entry, &key).unwrap();

        plan_remove(&mut entry, &key).unwrap();
        entry.tab.cart.add_line(line(2)).unwrap();
        assert_eq!(plan_line_call(&mut entry, &key), None);

        let follow = settle_line_call(&mut entry, &key, &add, &Ok(Some(item("li_4", 1))));
        assert_eq!(
            follow,
            Some(LineCall::Update {
                line_item_id: "li_4".into(),
                quantity: 2
            })
        );
        assert!(entry.removed_while_adding.is_empty());
    }

    #[test]
    fn test_failed_add_is_retried_as_add() {
        let mut entry = entry();
        entry.tab.cart.add_line(line(1)).unwrap();
        let key = line(1).key();
        let add = plan_line_call(&mut entry, &key).unwrap();

        let err = Err(PosError::from(agro_gateway::GatewayError::Timeout));
        assert_eq!(settle_line_call(&mut entry, &key, &add, &err), None);
        assert!(entry.tab.cart.line(&key).unwrap().sync.is_failed());
        assert_eq!(entry.tab.in_flight, 0);

        entry.tab.cart.change_quantity(&key, 1).unwrap();
        match plan_line_call(&mut entry, &key) {
            Some(LineCall::Add(item)) => assert_eq!(item.quantity, 2),
            other => panic!("expected add, got {:?}", other),
        }
    }
}
