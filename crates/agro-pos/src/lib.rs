//! # agro-pos: Point-of-Sale Engine for Agro POS
//!
//! Owns the open order tabs of one terminal and keeps each of them in step
//! with a draft order on the commerce backend.
//!
//! ## Engine Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Agro POS Engine                                │
//! │                                                                         │
//! │   front end (shell / desktop bridge)                                    │
//! │        │ calls                         ▲ PosEventEmitter                │
//! │        ▼                               │ (tabs, syncing, checkout,      │
//! │  ┌────────────────────────────────────┐│  error)                        │
//! │  │ PosEngine                          ├┘                               │
//! │  │  TabRegistry ── OrderTab ×N        │                                 │
//! │  │  session handoff (one open edit)   │                                 │
//! │  │  Debouncer per tab (confirm after  │                                 │
//! │  │  a quiet period)                   │                                 │
//! │  └──────────────┬─────────────────────┘                                 │
//! │                 │            ┌───────────────────┐  ┌────────────────┐  │
//! │                 │            │ CatalogService    │  │ CheckoutFinal- │  │
//! │                 │            │ search + disease  │  │ izer + History │  │
//! │                 │            └─────────┬─────────┘  └───────┬────────┘  │
//! │                 ▼                      ▼                    ▼           │
//! │            Arc<dyn CommerceGateway>  (agro-gateway)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`engine`] - `PosEngine`: tab lifecycle and snapshots
//! - `session` - edit-session handoff and debounced confirm (on `PosEngine`)
//! - `mutations` - optimistic cart edits and discounts (on `PosEngine`)
//! - [`tab`] - `OrderTab` and its status fields
//! - [`catalog`] - product search with disease ranking
//! - [`checkout`] - cash and QR finalization
//! - [`history`] - recently finalized orders
//! - [`delayed`] - cancellable delayed tasks
//! - [`config`] / [`context`] - `pos.toml` and the shared context
//! - [`events`] / [`error`] - what the front end receives

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod context;
pub mod delayed;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod tab;

mod mutations;
mod registry;
mod session;

use std::sync::Arc;

use agro_gateway::CommerceGateway;

pub use catalog::{CatalogService, ProductDetail, SearchQuery, SearchResults};
pub use checkout::{CheckoutFinalizer, CheckoutSettings, CheckoutState, CheckoutStatus};
pub use config::PosConfig;
pub use context::{AppContext, ContextSnapshot};
pub use engine::{EngineSettings, PosEngine};
pub use error::{ErrorCode, ErrorReport, PosError, PosResult};
pub use events::{NoOpEmitter, PosEventEmitter};
pub use history::{FinalizedOrder, OrderHistory};
pub use tab::{OrderTab, SessionState, TabStatus, TabSummary};

/// Everything a front end needs, wired from one config.
#[derive(Clone)]
pub struct PosServices {
    pub context: AppContext,
    pub engine: PosEngine,
    pub catalog: CatalogService,
    pub checkout: CheckoutFinalizer,
}

impl PosServices {
    pub fn new(
        config: &PosConfig,
        gateway: Arc<dyn CommerceGateway>,
        emitter: Arc<dyn PosEventEmitter>,
    ) -> PosResult<Self> {
        let context = AppContext::from_config(config);
        let diseases = config.load_diseases()?;

        let engine = PosEngine::with_emitter(
            gateway.clone(),
            context.clone(),
            EngineSettings::from_config(config),
            emitter,
        );
        let catalog = CatalogService::new(
            gateway.clone(),
            context.clone(),
            diseases,
            config.catalog.page_size,
        );
        let history = OrderHistory::new(gateway, config.payment.history_limit);
        let checkout =
            CheckoutFinalizer::new(engine.clone(), history, CheckoutSettings::from_config(config));

        Ok(PosServices {
            context,
            engine,
            catalog,
            checkout,
        })
    }
}
