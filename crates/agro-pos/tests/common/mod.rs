//! In-memory commerce backend for engine tests.
//!
//! Records every call with the (paused) tokio clock, enforces "line items
//! only inside an open edit", and can be told to fail or stall any
//! operation.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agro_core::catalog::Product;
use agro_core::money::Money;
use agro_gateway::{
    CommerceGateway, CustomerRecord, DraftOrder, GatewayError, GatewayResult, LineItem,
    NewDraftOrder, NewLineItem, Order, ProductPage, ProductQuery, Region, SalesChannel,
};
use agro_pos::{
    AppContext, CheckoutStatus, ContextSnapshot, EngineSettings, ErrorReport, PosEngine,
    PosEventEmitter, TabSummary,
};
use async_trait::async_trait;
use tokio::time::Instant;

// =============================================================================
// Call Log
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub draft_id: Option<String>,
    pub at: Instant,
}

#[derive(Default)]
struct FakeState {
    drafts: Vec<DraftOrder>,
    products: Vec<Product>,
    customers: Vec<CustomerRecord>,
    orders: Vec<Order>,
    open_edits: HashSet<String>,
    max_open_edits: usize,
    next_id: u64,
    calls: Vec<Call>,
    fail: HashMap<&'static str, u32>,
    delays: HashMap<&'static str, Duration>,
}

const ALWAYS: u32 = u32::MAX;

#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let fake = Self::new();
        fake.state.lock().unwrap().products = products;
        fake
    }

    /// Seeds an existing draft with the given items.
    pub fn seed_draft(&self, id: &str, items: Vec<LineItem>) {
        let mut state = self.state.lock().unwrap();
        state.drafts.push(draft(id, items));
    }

    pub fn seed_customer(&self, customer: CustomerRecord) {
        self.state.lock().unwrap().customers.push(customer);
    }

    /// Every later call of `op` fails.
    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().fail.insert(op, ALWAYS);
    }

    /// The next `times` calls of `op` fail.
    pub fn fail_times(&self, op: &'static str, times: u32) {
        self.state.lock().unwrap().fail.insert(op, times);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().unwrap().fail.remove(op);
    }

    /// Every later call of `op` takes `delay` before answering.
    pub fn stall(&self, op: &'static str, delay: Duration) {
        self.state.lock().unwrap().delays.insert(op, delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.op).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn calls_of(&self, op: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn draft(&self, id: &str) -> Option<DraftOrder> {
        self.state
            .lock()
            .unwrap()
            .drafts
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn draft_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .drafts
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn open_edits(&self) -> Vec<String> {
        self.state.lock().unwrap().open_edits.iter().cloned().collect()
    }

    /// Highest number of drafts ever open for editing at once.
    pub fn max_open_edits(&self) -> usize {
        self.state.lock().unwrap().max_open_edits
    }

    /// Logs the call, then sleeps and fails as configured.
    async fn enter(&self, op: &'static str, draft_id: Option<&str>) -> GatewayResult<()> {
        let (delay, fail) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call {
                op,
                draft_id: draft_id.map(str::to_string),
                at: Instant::now(),
            });
            let fail = match state.fail.get_mut(op) {
                Some(n) if *n == ALWAYS => true,
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            };
            (state.delays.get(op).copied(), fail)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(GatewayError::Connection(format!("{} unavailable", op)));
        }
        Ok(())
    }

    fn with_draft<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut DraftOrder) -> GatewayResult<T>,
    ) -> GatewayResult<T> {
        let mut state = self.state.lock().unwrap();
        let draft = state
            .drafts
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("draft {}", id)))?;
        f(draft)
    }

    fn require_edit(&self, id: &str) -> GatewayResult<()> {
        if self.state.lock().unwrap().open_edits.contains(id) {
            Ok(())
        } else {
            Err(GatewayError::Conflict(format!("draft {} is not being edited", id)))
        }
    }
}

#[async_trait]
impl CommerceGateway for FakeGateway {
    async fn create_draft(&self, _new: &NewDraftOrder) -> GatewayResult<DraftOrder> {
        self.enter("create_draft", None).await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = draft(&format!("dord_{:02}", state.next_id), Vec::new());
        state.drafts.push(created.clone());
        Ok(created)
    }

    async fn get_draft(&self, draft_id: &str) -> GatewayResult<DraftOrder> {
        self.enter("get_draft", Some(draft_id)).await?;
        self.with_draft(draft_id, |d| Ok(d.clone()))
    }

    async fn list_drafts(&self) -> GatewayResult<Vec<DraftOrder>> {
        self.enter("list_drafts", None).await?;
        Ok(self.state.lock().unwrap().drafts.clone())
    }

    async fn delete_draft(&self, draft_id: &str) -> GatewayResult<()> {
        self.enter("delete_draft", Some(draft_id)).await?;
        let mut state = self.state.lock().unwrap();
        state.drafts.retain(|d| d.id != draft_id);
        state.open_edits.remove(draft_id);
        Ok(())
    }

    async fn convert_to_order(&self, draft_id: &str) -> GatewayResult<Order> {
        self.enter("convert_to_order", Some(draft_id)).await?;
        let mut state = self.state.lock().unwrap();
        let index = state
            .drafts
            .iter()
            .position(|d| d.id == draft_id)
            .ok_or_else(|| GatewayError::NotFound(format!("draft {}", draft_id)))?;
        let converted = state.drafts.remove(index);
        state.open_edits.remove(draft_id);

        let total: Money = converted
            .items
            .iter()
            .map(|i| i.unit_price.multiply_quantity(i.quantity))
            .sum();
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": format!("order_{}", draft_id),
            "display_id": converted.display_id,
            "total": total.minor(),
        }))
        .unwrap();
        state.orders.insert(0, order.clone());
        Ok(order)
    }

    async fn add_line_item(&self, draft_id: &str, item: &NewLineItem) -> GatewayResult<LineItem> {
        self.enter("add_line_item", Some(draft_id)).await?;
        self.require_edit(draft_id)?;
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            format!("li_{:02}", state.next_id)
        };
        let (product_id, title, variant_title) = self
            .state
            .lock()
            .unwrap()
            .products
            .iter()
            .find_map(|p| {
                let variant = p.variant(&item.variant_id)?;
                Some((Some(p.id.clone()), p.title.clone(), Some(variant.title.clone())))
            })
            .unwrap_or_default();
        let line: LineItem = serde_json::from_value(serde_json::json!({
            "id": id,
            "variant_id": item.variant_id,
            "product_id": product_id,
            "title": title,
            "variant_title": variant_title,
            "quantity": item.quantity,
            "unit_price": item.unit_price,
            "metadata": item.metadata,
        }))
        .unwrap();
        self.with_draft(draft_id, |d| {
            d.items.push(line.clone());
            Ok(line)
        })
    }

    async fn update_line_item(
        &self,
        draft_id: &str,
        line_item_id: &str,
        quantity: i64,
    ) -> GatewayResult<()> {
        self.enter("update_line_item", Some(draft_id)).await?;
        self.require_edit(draft_id)?;
        self.with_draft(draft_id, |d| {
            let item = d
                .items
                .iter_mut()
                .find(|i| i.id == line_item_id)
                .ok_or_else(|| GatewayError::NotFound(format!("line item {}", line_item_id)))?;
            item.quantity = quantity;
            Ok(())
        })
    }

    async fn remove_line_item(&self, draft_id: &str, line_item_id: &str) -> GatewayResult<()> {
        self.enter("remove_line_item", Some(draft_id)).await?;
        self.require_edit(draft_id)?;
        self.with_draft(draft_id, |d| {
            d.items.retain(|i| i.id != line_item_id);
            Ok(())
        })
    }

    async fn begin_edit(&self, draft_id: &str) -> GatewayResult<()> {
        self.enter("begin_edit", Some(draft_id)).await?;
        let mut state = self.state.lock().unwrap();
        state.open_edits.insert(draft_id.to_string());
        state.max_open_edits = state.max_open_edits.max(state.open_edits.len());
        Ok(())
    }

    async fn confirm_edit(&self, draft_id: &str) -> GatewayResult<()> {
        self.enter("confirm_edit", Some(draft_id)).await?;
        self.require_edit(draft_id)?;
        self.state.lock().unwrap().open_edits.remove(draft_id);
        Ok(())
    }

    async fn cancel_edit(&self, draft_id: &str) -> GatewayResult<()> {
        self.enter("cancel_edit", Some(draft_id)).await?;
        self.state.lock().unwrap().open_edits.remove(draft_id);
        Ok(())
    }

    async fn search_products(&self, query: &ProductQuery) -> GatewayResult<ProductPage> {
        self.enter("search_products", None).await?;
        let state = self.state.lock().unwrap();
        let needle = query.q.as_deref().map(str::to_lowercase);
        let hits: Vec<Product> = state
            .products
            .iter()
            .filter(|p| match &needle {
                Some(n) => p.title.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        let count = hits.len() as u64;
        let products = hits
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(ProductPage {
            products,
            count,
            offset: query.offset as u64,
            limit: query.limit as u64,
        })
    }

    async fn get_product(&self, product_id: &str) -> GatewayResult<Product> {
        self.enter("get_product", None).await?;
        self.state
            .lock()
            .unwrap()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("product {}", product_id)))
    }

    async fn list_customers(&self, q: Option<&str>) -> GatewayResult<Vec<CustomerRecord>> {
        self.enter("list_customers", None).await?;
        let q = q.map(str::to_lowercase);
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .iter()
            .filter(|c| match &q {
                Some(q) => c.display_name().to_lowercase().contains(q)
                    || c.phone.as_deref().unwrap_or_default().contains(q.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_regions(&self) -> GatewayResult<Vec<Region>> {
        self.enter("list_regions", None).await?;
        Ok(vec![Region {
            id: "reg_vn".to_string(),
            name: "Việt Nam".to_string(),
            currency_code: "vnd".to_string(),
        }])
    }

    async fn list_sales_channels(&self) -> GatewayResult<Vec<SalesChannel>> {
        self.enter("list_sales_channels", None).await?;
        Ok(vec![
            SalesChannel {
                id: "sc_web".to_string(),
                name: "Web".to_string(),
                is_disabled: true,
            },
            SalesChannel {
                id: "sc_pos".to_string(),
                name: "Cửa hàng".to_string(),
                is_disabled: false,
            },
        ])
    }

    async fn list_orders(&self, limit: u32) -> GatewayResult<Vec<Order>> {
        self.enter("list_orders", None).await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Event Recorder
// =============================================================================

#[derive(Default)]
pub struct RecordingEmitter {
    pub errors: Mutex<Vec<ErrorReport>>,
    pub checkout: Mutex<Vec<CheckoutStatus>>,
    pub tab_events: Mutex<usize>,
}

impl RecordingEmitter {
    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl PosEventEmitter for RecordingEmitter {
    fn emit_tabs(&self, _tabs: &[TabSummary]) {
        *self.tab_events.lock().unwrap() += 1;
    }

    fn emit_syncing(&self, _tab_id: &str, _syncing: bool) {}

    fn emit_checkout(&self, status: &CheckoutStatus) {
        self.checkout.lock().unwrap().push(status.clone());
    }

    fn emit_error(&self, error: &ErrorReport) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn draft(id: &str, items: Vec<LineItem>) -> DraftOrder {
    let mut draft: DraftOrder = serde_json::from_value(serde_json::json!({
        "id": id,
        "region_id": "reg_vn",
        "sales_channel_id": "sc_pos",
    }))
    .unwrap();
    draft.items = items;
    draft
}

pub fn line_item(id: &str, product_id: &str, variant_id: &str, price: i64, qty: i64) -> LineItem {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "product_id": product_id,
        "variant_id": variant_id,
        "title": product_id,
        "variant_title": "1L",
        "quantity": qty,
        "unit_price": price,
    }))
    .unwrap()
}

/// A product with one variant priced in VND.
pub fn product(id: &str, title: &str, ingredient: &str, price: i64) -> Product {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": title,
        "metadata": { "active_ingredient": ingredient },
        "variants": [{
            "id": format!("{}_v1", id),
            "title": "1L",
            "prices": [{ "currency_code": "vnd", "amount": price }]
        }]
    }))
    .unwrap()
}

pub fn context() -> AppContext {
    AppContext::new(ContextSnapshot {
        terminal_name: "Quầy 1".to_string(),
        api_token: None,
        region_id: Some("reg_vn".to_string()),
        sales_channel_id: Some("sc_pos".to_string()),
        currency: "vnd".to_string(),
    })
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        confirm_delay: Duration::from_secs(3),
        ..EngineSettings::default()
    }
}

pub fn engine(fake: &FakeGateway) -> (PosEngine, Arc<RecordingEmitter>) {
    let emitter = Arc::new(RecordingEmitter::default());
    let engine = PosEngine::with_emitter(
        Arc::new(fake.clone()),
        context(),
        settings(),
        emitter.clone(),
    );
    (engine, emitter)
}

/// Lets spawned timer tasks run after the paused clock was advanced.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
