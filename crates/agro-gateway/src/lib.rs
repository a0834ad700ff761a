//! # agro-gateway: Commerce Backend Client
//!
//! The POS never owns products, inventory, customers or orders: the
//! commerce backend does. This crate is the single seam through which the
//! POS engine talks to it.
//!
//! ## Draft Order Edit Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create_draft ──► begin_edit ──► add / update / remove line items      │
//! │                        ▲                 │                              │
//! │                        │                 ▼                              │
//! │                        └──── confirm_edit (persist)                     │
//! │                                          or                             │
//! │                              cancel_edit  (discard pending changes)     │
//! │                                                                         │
//! │   convert_to_order ──► finalized Order                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line-item calls only make sense while an edit session is open on the
//! draft. The backend allows one open edit per draft; the POS additionally
//! keeps at most one open across all drafts.
//!
//! ## Implementations
//! - [`HttpGateway`]: JSON over HTTPS with a bearer token
//! - Tests in `agro-pos` use an in-memory recording fake

pub mod error;
pub mod http;
pub mod types;

use agro_core::catalog::Product;
use async_trait::async_trait;

pub use error::{GatewayError, GatewayResult};
pub use http::{HttpGateway, HttpGatewayConfig};
pub use types::{
    CustomerRecord, DraftOrder, LineItem, NewDraftOrder, NewLineItem, Order, ProductPage,
    ProductQuery, Region, SalesChannel,
};

// =============================================================================
// Gateway Trait
// =============================================================================

/// Operations the POS consumes from the commerce backend.
///
/// Every method is a single round trip. Implementations do not retry and do
/// not cache; the engine decides what a failure means.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    // ---- draft orders -------------------------------------------------------

    async fn create_draft(&self, draft: &NewDraftOrder) -> GatewayResult<DraftOrder>;

    /// Draft with its items, as currently persisted.
    async fn get_draft(&self, draft_id: &str) -> GatewayResult<DraftOrder>;

    /// Outstanding (not yet converted) drafts.
    async fn list_drafts(&self) -> GatewayResult<Vec<DraftOrder>>;

    async fn delete_draft(&self, draft_id: &str) -> GatewayResult<()>;

    async fn convert_to_order(&self, draft_id: &str) -> GatewayResult<Order>;

    // ---- line items (inside an edit session) --------------------------------

    /// Adds a line and returns it with its remote id.
    async fn add_line_item(&self, draft_id: &str, item: &NewLineItem) -> GatewayResult<LineItem>;

    /// Sets the absolute quantity of a line.
    async fn update_line_item(
        &self,
        draft_id: &str,
        line_item_id: &str,
        quantity: i64,
    ) -> GatewayResult<()>;

    async fn remove_line_item(&self, draft_id: &str, line_item_id: &str) -> GatewayResult<()>;

    // ---- edit session ---------------------------------------------------------

    async fn begin_edit(&self, draft_id: &str) -> GatewayResult<()>;

    async fn confirm_edit(&self, draft_id: &str) -> GatewayResult<()>;

    async fn cancel_edit(&self, draft_id: &str) -> GatewayResult<()>;

    // ---- catalog and reference data -------------------------------------------

    async fn search_products(&self, query: &ProductQuery) -> GatewayResult<ProductPage>;

    async fn get_product(&self, product_id: &str) -> GatewayResult<Product>;

    async fn list_customers(&self, q: Option<&str>) -> GatewayResult<Vec<CustomerRecord>>;

    async fn list_regions(&self) -> GatewayResult<Vec<Region>>;

    async fn list_sales_channels(&self) -> GatewayResult<Vec<SalesChannel>>;

    /// Most recent finalized orders, newest first.
    async fn list_orders(&self, limit: u32) -> GatewayResult<Vec<Order>>;
}
