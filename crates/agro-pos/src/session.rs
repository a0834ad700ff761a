//! # Edit-Session Coordinator
//!
//! The backend only accepts line-item changes on a draft whose edit session
//! is open, and the POS keeps at most one session open across all tabs.
//!
//! ## Handoff
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  select_tab(B) while A holds the session                                │
//! │                                                                         │
//! │  handoff lock ─┬─ A: Cancelling, confirm timer cleared                  │
//! │                ├─ await cancel_edit(A)     (failure logged, ignored)    │
//! │                ├─ A: Idle                                               │
//! │                ├─ B: Opening, await begin_edit(B)                       │
//! │                │      ok   → B: Open                                    │
//! │                │      fail → B: Idle, error emitted and returned        │
//! │                └─ await get_draft(B), merge into B's items              │
//! │                                                                         │
//! │  The confirm cycle (Open → Confirming → Opening → Open) takes the same  │
//! │  lock, so a confirm never interleaves with a handoff.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use agro_core::cart::{Cart, CartLine, LineSync};
use tracing::{debug, info, warn};

use crate::engine::PosEngine;
use crate::error::{PosError, PosResult};
use crate::registry::TabEntry;
use crate::tab::SessionState;

impl PosEngine {
    // =========================================================================
    // Handoff
    // =========================================================================

    /// Makes `tab_id` the active tab and moves the edit session to it.
    pub async fn select_tab(&self, tab_id: &str) -> PosResult<()> {
        let _handoff = self.inner.handoff.lock().await;

        let previous = {
            let mut reg = self.inner.registry.write().await;
            reg.editable_mut(tab_id)?;

            let holder = reg.session_holder().map(str::to_string);
            reg.set_active(Some(tab_id.to_string()));

            match holder {
                Some(holder) if holder == tab_id => None,
                Some(holder) => {
                    if let Some(entry) = reg.get_mut(&holder) {
                        entry.tab.session = SessionState::Cancelling;
                        entry.confirm.cancel();
                    }
                    Some(holder)
                }
                None => None,
            }
        };

        let already_open = previous.is_none()
            && self.session_state(tab_id).await == Some(SessionState::Open);
        if already_open {
            self.emit_tabs().await;
            return Ok(());
        }

        if let Some(previous) = previous {
            self.inner.emitter.emit_syncing(&previous, true);
            if let Err(e) = self.inner.gateway.cancel_edit(&previous).await {
                warn!(tab_id = %previous, error = %e, "Cancel edit failed, continuing handoff");
            }
            self.inner
                .registry
                .write()
                .await
                .set_session(&previous, SessionState::Idle);
            self.inner.emitter.emit_syncing(&previous, false);
            debug!(from = %previous, to = tab_id, "Released edit session");
        }

        if let Err(err) = self.open_session_locked(tab_id).await {
            self.inner.emitter.emit_error(&err.report());
            self.emit_tabs().await;
            return Err(err);
        }

        self.load_remote_items(tab_id).await;
        self.emit_tabs().await;
        Ok(())
    }

    /// Opens the session for a tab. Caller holds the handoff lock.
    async fn open_session_locked(&self, tab_id: &str) -> PosResult<()> {
        self.inner
            .registry
            .write()
            .await
            .set_session(tab_id, SessionState::Opening);
        self.inner.emitter.emit_syncing(tab_id, true);

        let result = self.inner.gateway.begin_edit(tab_id).await;

        let state = if result.is_ok() {
            SessionState::Open
        } else {
            SessionState::Idle
        };
        self.inner.registry.write().await.set_session(tab_id, state);
        self.inner.emitter.emit_syncing(tab_id, false);

        match result {
            Ok(()) => {
                info!(tab_id, "Opened edit session");
                Ok(())
            }
            Err(e) => {
                warn!(tab_id, error = %e, "Failed to open edit session");
                Err(PosError::SessionUnavailable {
                    tab_id: tab_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Replaces a tab's items with the backend's copy, keeping local edits
    /// the backend has not seen yet. A failed fetch keeps the local items.
    async fn load_remote_items(&self, tab_id: &str) {
        match self.inner.gateway.get_draft(tab_id).await {
            Ok(draft) => {
                let mut reg = self.inner.registry.write().await;
                if let Some(entry) = reg.get_mut(tab_id) {
                    entry.tab.cart = merge_remote_lines(&entry.tab.cart, draft.cart_lines());
                    entry.tab.display_id = draft.display_id.or(entry.tab.display_id);
                    debug!(tab_id, lines = entry.tab.cart.line_count(), "Loaded remote items");
                }
            }
            Err(e) => warn!(tab_id, error = %e, "Failed to fetch draft items, keeping local cart"),
        }
    }

    // =========================================================================
    // Session Guard for Mutations
    // =========================================================================

    /// Waits until the tab's session is open, reopening it if an earlier
    /// open failed.
    pub(crate) async fn ensure_session(&self, tab_id: &str) -> PosResult<()> {
        if self.session_state(tab_id).await == Some(SessionState::Open) {
            return Ok(());
        }

        let _handoff = self.inner.handoff.lock().await;

        let (state, active) = {
            let reg = self.inner.registry.read().await;
            (reg.session(tab_id), reg.active_id() == Some(tab_id))
        };

        match state {
            None => Err(PosError::TabNotFound(tab_id.to_string())),
            Some(SessionState::Open) => Ok(()),
            Some(SessionState::Idle) if active => {
                info!(tab_id, "Reopening edit session before sync");
                self.open_session_locked(tab_id).await
            }
            Some(other) => Err(PosError::SessionUnavailable {
                tab_id: tab_id.to_string(),
                reason: format!("session is {}", other),
            }),
        }
    }

    pub(crate) async fn session_state(&self, tab_id: &str) -> Option<SessionState> {
        self.inner.registry.read().await.session(tab_id)
    }

    // =========================================================================
    // Debounced Confirm
    // =========================================================================

    /// Arms (or re-arms) the tab's confirm after the quiet period.
    pub(crate) fn schedule_confirm(&self, entry: &mut TabEntry) {
        let engine = Arc::downgrade(&self.inner);
        let tab_id = entry.tab.id.clone();

        entry
            .confirm
            .reschedule(self.inner.settings.confirm_delay, async move {
                if let Some(inner) = engine.upgrade() {
                    PosEngine { inner }.run_confirm(&tab_id).await;
                }
            });
    }

    /// Persists the tab's pending edits, then reopens the session.
    ///
    /// A failed confirm leaves the session open and is not retried until the
    /// next mutation re-arms the timer.
    pub(crate) async fn run_confirm(&self, tab_id: &str) {
        let _handoff = self.inner.handoff.lock().await;

        {
            let mut reg = self.inner.registry.write().await;
            match reg.session(tab_id) {
                Some(SessionState::Open) => reg.set_session(tab_id, SessionState::Confirming),
                state => {
                    debug!(tab_id, ?state, "Skipping confirm, session not open");
                    return;
                }
            }
        }
        self.inner.emitter.emit_syncing(tab_id, true);

        if let Err(e) = self.inner.gateway.confirm_edit(tab_id).await {
            warn!(tab_id, error = %e, "Failed to confirm edit session");
            self.inner
                .registry
                .write()
                .await
                .set_session(tab_id, SessionState::Open);
            self.inner.emitter.emit_syncing(tab_id, false);
            self.inner.emitter.emit_error(&PosError::from(e).report());
            self.emit_tabs().await;
            return;
        }
        info!(tab_id, "Confirmed edit session");

        if let Err(err) = self.open_session_locked(tab_id).await {
            self.inner.emitter.emit_error(&err.report());
        }
        self.emit_tabs().await;
    }

    /// Confirms pending edits of a tab about to be converted and releases
    /// its session. Caller converts right after.
    pub(crate) async fn flush_for_checkout(&self, tab_id: &str) -> PosResult<()> {
        let _handoff = self.inner.handoff.lock().await;

        let state = {
            let mut reg = self.inner.registry.write().await;
            let entry = reg.editable_mut(tab_id)?;
            entry.confirm.cancel();
            entry.tab.session
        };

        if state == SessionState::Open {
            self.inner
                .registry
                .write()
                .await
                .set_session(tab_id, SessionState::Confirming);
            let result = self.inner.gateway.confirm_edit(tab_id).await;
            let next = if result.is_ok() {
                SessionState::Idle
            } else {
                SessionState::Open
            };
            self.inner.registry.write().await.set_session(tab_id, next);
            if let Err(e) = result {
                warn!(tab_id, error = %e, "Failed to confirm edits before checkout");
                return Err(e.into());
            }
            debug!(tab_id, "Confirmed edits before checkout");
        }
        Ok(())
    }
}

/// The backend's lines with unsent local edits laid over them.
///
/// Local lines without a remote id are kept as they are; their add is still
/// queued. Remote lines with a pending local update keep the local quantity.
fn merge_remote_lines(local: &Cart, remote: Vec<CartLine>) -> Cart {
    let mut lines = Cart::from_lines(remote).lines().to_vec();

    for line in local.lines() {
        let key = line.key();
        match lines.iter_mut().find(|l| l.matches(&key)) {
            Some(remote) if line.sync == LineSync::Pending => {
                remote.quantity = line.quantity;
                remote.sync = LineSync::Pending;
            }
            Some(_) => {}
            None if line.line_item_id.is_none() => lines.push(line.clone()),
            None => {}
        }
    }

    Cart::from_lines(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agro_core::money::Money;

    fn line(product_id: &str, line_item_id: Option<&str>, quantity: i64, sync: LineSync) -> CartLine {
        CartLine {
            product_id: product_id.into(),
            variant_id: format!("{}_v1", product_id),
            line_item_id: line_item_id.map(str::to_string),
            name: product_id.into(),
            unit_price: Money::from_minor(10_000),
            quantity,
            variant_label: "1L".into(),
            image: None,
            tech_specs: String::new(),
            sync,
        }
    }

    #[test]
    fn test_merge_keeps_unsent_lines() {
        let local = Cart::from_lines(vec![
            line("p_new", None, 2, LineSync::Pending),
            line("p_gone", Some("li_1"), 1, LineSync::Synced),
        ]);
        let remote = vec![line("p_remote", Some("li_2"), 3, LineSync::Synced)];

        let merged = merge_remote_lines(&local, remote);
        let ids: Vec<&str> = merged.lines().iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p_remote", "p_new"]);
        assert_eq!(merged.lines()[1].quantity, 2);
    }

    #[test]
    fn test_merge_keeps_pending_quantity() {
        let local = Cart::from_lines(vec![line("p1", Some("li_1"), 5, LineSync::Pending)]);
        let remote = vec![line("p1", Some("li_1"), 1, LineSync::Synced)];

        let merged = merge_remote_lines(&local, remote);
        assert_eq!(merged.line_count(), 1);
        assert_eq!(merged.lines()[0].quantity, 5);
        assert_eq!(merged.lines()[0].sync, LineSync::Pending);
    }

    #[test]
    fn test_merge_takes_remote_for_synced_lines() {
        let local = Cart::from_lines(vec![line("p1", Some("li_1"), 5, LineSync::Synced)]);
        let remote = vec![line("p1", Some("li_1"), 2, LineSync::Synced)];

        let merged = merge_remote_lines(&local, remote);
        assert_eq!(merged.lines()[0].quantity, 2);
    }
}
