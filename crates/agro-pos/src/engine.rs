//! # POS Engine
//!
//! Owns the tab registry and drives every remote call that keeps it in step
//! with the commerce backend.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PosEngine (Clone)                              │
//! │                                                                         │
//! │   Arc<EngineInner>                                                      │
//! │   ├── registry: RwLock<TabRegistry>   never held across an await        │
//! │   ├── handoff:  Mutex<()>             serializes open/cancel/confirm    │
//! │   ├── gateway:  Arc<dyn CommerceGateway>                                │
//! │   ├── context:  AppContext            region / channel / currency       │
//! │   └── emitter:  Arc<dyn PosEventEmitter>                                │
//! │                                                                         │
//! │   engine.rs     lifecycle: bootstrap, refresh, create, remove, reads    │
//! │   session.rs    select_tab handoff, ensure_session, debounced confirm   │
//! │   mutations.rs  optimistic cart edits, discounts, customer, shipping    │
//! │                                                                         │
//! │   Confirm timers hold a Weak<EngineInner>; dropping the last engine     │
//! │   handle lets pending timers fire into nothing.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use agro_core::cart::CartTotals;
use agro_core::discount::Voucher;
use agro_core::types::VatRate;
use agro_gateway::{CommerceGateway, NewDraftOrder};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::PosConfig;
use crate::context::AppContext;
use crate::error::{PosError, PosResult};
use crate::events::{NoOpEmitter, PosEventEmitter};
use crate::registry::TabRegistry;
use crate::tab::{OrderTab, TabStatus, TabSummary};

// =============================================================================
// Settings
// =============================================================================

/// Engine knobs taken from [`PosConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Quiet period after the last mutation before the edit is confirmed.
    pub confirm_delay: Duration,
    pub vat_rate: VatRate,
    /// Vouchers the cashier can pick from.
    pub vouchers: Vec<Voucher>,
}

impl EngineSettings {
    pub fn from_config(config: &PosConfig) -> Self {
        EngineSettings {
            confirm_delay: config.confirm_delay(),
            vat_rate: config.vat_rate(),
            vouchers: config.vouchers.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            confirm_delay: Duration::from_secs(3),
            vat_rate: VatRate::zero(),
            vouchers: Vec::new(),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

pub(crate) struct EngineInner {
    pub gateway: Arc<dyn CommerceGateway>,
    pub context: AppContext,
    pub settings: EngineSettings,
    pub registry: RwLock<TabRegistry>,
    pub handoff: Mutex<()>,
    pub emitter: Arc<dyn PosEventEmitter>,
}

/// Handle to the POS engine. Cheap to clone.
#[derive(Clone)]
pub struct PosEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl std::fmt::Debug for PosEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosEngine")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl PosEngine {
    pub fn new(
        gateway: Arc<dyn CommerceGateway>,
        context: AppContext,
        settings: EngineSettings,
    ) -> Self {
        Self::with_emitter(gateway, context, settings, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        gateway: Arc<dyn CommerceGateway>,
        context: AppContext,
        settings: EngineSettings,
        emitter: Arc<dyn PosEventEmitter>,
    ) -> Self {
        PosEngine {
            inner: Arc::new(EngineInner {
                gateway,
                context,
                settings,
                registry: RwLock::new(TabRegistry::new()),
                handoff: Mutex::new(()),
                emitter,
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn context(&self) -> &AppContext {
        &self.inner.context
    }

    pub fn gateway(&self) -> Arc<dyn CommerceGateway> {
        self.inner.gateway.clone()
    }

    pub fn emitter(&self) -> Arc<dyn PosEventEmitter> {
        self.inner.emitter.clone()
    }

    pub fn vouchers(&self) -> &[Voucher] {
        &self.inner.settings.vouchers
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Fills in the context values that were not configured, then loads the
    /// outstanding drafts.
    pub async fn bootstrap(&self) -> PosResult<Vec<TabSummary>> {
        let snapshot = self.inner.context.snapshot().await;

        if snapshot.region_id.is_none() {
            let regions = self.inner.gateway.list_regions().await?;
            let region = regions
                .iter()
                .find(|r| r.currency_code.eq_ignore_ascii_case(&snapshot.currency))
                .or_else(|| regions.first())
                .ok_or(PosError::MissingContext("region"))?;
            info!(region_id = %region.id, currency = %region.currency_code, "Resolved region");
            self.inner
                .context
                .set_region(region.id.clone(), Some(region.currency_code.clone()))
                .await;
        }

        if snapshot.sales_channel_id.is_none() {
            let channel = self
                .inner
                .gateway
                .list_sales_channels()
                .await?
                .into_iter()
                .find(|c| !c.is_disabled)
                .ok_or(PosError::MissingContext("sales channel"))?;
            info!(sales_channel_id = %channel.id, name = %channel.name, "Resolved sales channel");
            self.inner.context.set_sales_channel(channel.id).await;
        }

        self.refresh().await
    }

    // =========================================================================
    // Tab Lifecycle
    // =========================================================================

    /// Reconciles the registry with the backend's outstanding drafts.
    ///
    /// Creates a tab when none is left and selects the first tab when none is
    /// active.
    pub async fn refresh(&self) -> PosResult<Vec<TabSummary>> {
        self.reconcile_with_gateway().await?;

        let empty = self.inner.registry.read().await.is_empty();
        if empty {
            info!("No outstanding drafts, creating a fresh tab");
            self.create_draft_tab().await?;
        }

        self.select_first_if_none().await;

        self.emit_tabs().await;
        Ok(self.tabs().await)
    }

    /// Opens a new empty draft and makes it the active tab.
    ///
    /// On failure nothing is added.
    pub async fn create_tab(&self) -> PosResult<OrderTab> {
        let id = self.create_draft_tab().await?;

        if let Err(e) = self.reconcile_with_gateway().await {
            warn!(error = %e, "Draft list refresh after create failed");
        }

        // A failed open leaves the tab Idle; the next mutation retries it
        match self.select_tab(&id).await {
            Err(PosError::TabNotFound(_)) => return Err(PosError::TabNotFound(id)),
            Err(e) => warn!(tab_id = %id, error = %e, "New tab created without an edit session"),
            Ok(()) => {}
        }

        self.emit_tabs().await;
        self.tab(&id).await.ok_or(PosError::TabNotFound(id))
    }

    /// Deletes a tab's draft. The tab stays visible, disabled, until the
    /// backend answers; a failed delete puts it back.
    pub async fn remove_tab(&self, tab_id: &str) -> PosResult<()> {
        {
            let mut reg = self.inner.registry.write().await;
            let entry = reg
                .get_mut(tab_id)
                .ok_or_else(|| PosError::TabNotFound(tab_id.to_string()))?;
            if entry.tab.status == TabStatus::Deleting {
                debug!(tab_id, "Tab already being deleted");
                return Ok(());
            }
            entry.tab.status = TabStatus::Deleting;
            entry.confirm.cancel();
        }
        self.emit_tabs().await;

        if let Err(e) = self.inner.gateway.delete_draft(tab_id).await {
            warn!(tab_id, error = %e, "Failed to delete draft order");
            if let Some(entry) = self.inner.registry.write().await.get_mut(tab_id) {
                entry.tab.status = TabStatus::Ready;
            }
            let err = PosError::from(e);
            self.inner.emitter.emit_error(&err.report());
            self.emit_tabs().await;
            return Err(err);
        }

        self.inner.registry.write().await.remove(tab_id);
        info!(tab_id, "Removed tab");

        // The draft is gone either way; a failed refresh only leaves the list stale
        if let Err(err) = self.refresh().await {
            warn!(tab_id, error = %err, "Tab list refresh after delete failed");
            self.inner.emitter.emit_error(&err.report());
            self.select_first_if_none().await;
            self.emit_tabs().await;
        }
        Ok(())
    }

    /// Selects the first ready tab when no tab is active.
    async fn select_first_if_none(&self) {
        let first = {
            let reg = self.inner.registry.read().await;
            match reg.active_id() {
                Some(_) => None,
                None => reg.first_ready().map(str::to_string),
            }
        };
        if let Some(id) = first {
            if let Err(e) = self.select_tab(&id).await {
                warn!(tab_id = %id, error = %e, "Could not open the first tab");
            }
        }
    }

    /// Creates a remote draft and appends its tab without selecting it.
    pub(crate) async fn create_draft_tab(&self) -> PosResult<String> {
        let (region_id, sales_channel_id) = self.inner.context.snapshot().await.draft_defaults()?;

        let draft = match self
            .inner
            .gateway
            .create_draft(&NewDraftOrder::empty(region_id, sales_channel_id))
            .await
        {
            Ok(draft) => draft,
            Err(e) => {
                warn!(error = %e, "Failed to create draft order");
                let err = PosError::from(e);
                self.inner.emitter.emit_error(&err.report());
                return Err(err);
            }
        };

        let mut reg = self.inner.registry.write().await;
        if reg.get(&draft.id).is_none() {
            let tab = reg.insert_draft(&draft);
            info!(tab_id = %tab.id, label = tab.label, "Created tab");
        }
        Ok(draft.id)
    }

    async fn reconcile_with_gateway(&self) -> PosResult<()> {
        let drafts = match self.inner.gateway.list_drafts().await {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!(error = %e, "Failed to list draft orders");
                return Err(e.into());
            }
        };

        let report = self.inner.registry.write().await.reconcile(&drafts);
        if !report.added.is_empty() || !report.dropped.is_empty() {
            info!(
                added = report.added.len(),
                dropped = report.dropped.len(),
                "Reconciled tabs with backend drafts"
            );
        }
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Tab bar entries in display order.
    pub async fn tabs(&self) -> Vec<TabSummary> {
        let reg = self.inner.registry.read().await;
        let active = reg.active_id();
        reg.tabs()
            .map(|t| t.summary(active == Some(t.id.as_str()), self.inner.settings.vat_rate))
            .collect()
    }

    pub async fn tab(&self, tab_id: &str) -> Option<OrderTab> {
        self.inner.registry.read().await.get(tab_id).map(|e| e.tab.clone())
    }

    pub async fn active_tab_id(&self) -> Option<String> {
        self.inner.registry.read().await.active_id().map(str::to_string)
    }

    pub async fn active_tab(&self) -> Option<OrderTab> {
        let reg = self.inner.registry.read().await;
        let id = reg.active_id()?;
        reg.get(id).map(|e| e.tab.clone())
    }

    pub async fn active_totals(&self) -> Option<CartTotals> {
        self.active_tab()
            .await
            .map(|t| t.totals(self.inner.settings.vat_rate))
    }

    /// Ids of tabs that currently hold an edit session.
    pub async fn open_sessions(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .await
            .tabs()
            .filter(|t| t.session.holds_session())
            .map(|t| t.id.clone())
            .collect()
    }

    /// True while a confirm is armed for the tab.
    pub async fn confirm_pending(&self, tab_id: &str) -> bool {
        self.inner
            .registry
            .read()
            .await
            .get(tab_id)
            .map(|e| e.confirm.is_armed())
            .unwrap_or(false)
    }

    pub(crate) async fn emit_tabs(&self) {
        let tabs = self.tabs().await;
        self.inner.emitter.emit_tabs(&tabs);
    }
}
