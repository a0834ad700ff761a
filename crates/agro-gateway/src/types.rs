//! # Gateway Data Transfer Objects
//!
//! Shapes of the JSON the commerce backend sends and receives. Only the
//! fields the POS reads are declared; everything else is ignored.
//!
//! Monetary amounts arrive as numbers or numeric strings depending on the
//! endpoint, so they all go through [`deserialize_amount`].

use agro_core::cart::{CartLine, LineSync};
use agro_core::catalog::Product;
use agro_core::money::{deserialize_amount, Money};
use agro_core::types::Customer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key the POS writes the tech spec of a line under.
pub const LINE_TECH_SPECS_KEY: &str = "tech_specs";

// =============================================================================
// Draft Orders
// =============================================================================

/// A line item of a draft order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub quantity: i64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub unit_price: Money,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl LineItem {
    /// Converts an authoritative remote line into a cart line.
    ///
    /// The line is `Synced`: it is exactly what the backend holds.
    pub fn to_cart_line(&self) -> CartLine {
        let tech_specs = self
            .metadata
            .as_ref()
            .and_then(|m| m.get(LINE_TECH_SPECS_KEY))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        CartLine {
            product_id: self
                .product_id
                .clone()
                .unwrap_or_else(|| self.id.clone()),
            variant_id: self.variant_id.clone().unwrap_or_default(),
            line_item_id: Some(self.id.clone()),
            name: self.title.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
            variant_label: self.variant_title.clone().unwrap_or_default(),
            image: self.thumbnail.clone(),
            tech_specs,
            sync: LineSync::Synced,
        }
    }
}

/// A draft order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftOrder {
    pub id: String,
    #[serde(default)]
    pub display_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub sales_channel_id: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl DraftOrder {
    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.items.iter().map(LineItem::to_cart_line).collect()
    }
}

/// Body of a create-draft call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDraftOrder {
    pub region_id: String,
    pub sales_channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub items: Vec<NewLineItem>,
}

impl NewDraftOrder {
    /// An empty draft in the given region and sales channel.
    pub fn empty(region_id: impl Into<String>, sales_channel_id: impl Into<String>) -> Self {
        NewDraftOrder {
            region_id: region_id.into(),
            sales_channel_id: sales_channel_id.into(),
            email: None,
            items: Vec::new(),
        }
    }
}

/// A line item to add to a draft order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLineItem {
    pub variant_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl NewLineItem {
    /// Add request for a local cart line at its current quantity.
    pub fn from_cart_line(line: &CartLine) -> Self {
        let metadata = if line.tech_specs.is_empty() {
            None
        } else {
            let mut map = Map::new();
            map.insert(
                LINE_TECH_SPECS_KEY.to_string(),
                Value::String(line.tech_specs.clone()),
            );
            Some(map)
        };

        NewLineItem {
            variant_id: line.variant_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price.minor(),
            metadata,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A finalized order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub display_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub total: Money,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Reference Data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_disabled: bool,
}

/// A customer as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CustomerRecord {
    /// Full name, falling back to the email.
    pub fn display_name(&self) -> String {
        let name = [self.last_name.as_deref(), self.first_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone().unwrap_or_default()
        } else {
            name
        }
    }

    /// The tab-side customer value. Address is not part of the record.
    pub fn to_customer(&self) -> Customer {
        Customer {
            name: self.display_name(),
            phone: self.phone.clone().unwrap_or_default(),
            address: None,
        }
    }
}

// =============================================================================
// Product Search
// =============================================================================

/// Product search parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<String>,
    pub sales_channel_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ProductQuery {
    /// Query-string pairs, skipping unset filters.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(q) = self.q.as_deref().filter(|q| !q.trim().is_empty()) {
            pairs.push(("q", q.trim().to_string()));
        }
        if let Some(category) = &self.category_id {
            pairs.push(("category_id[]", category.clone()));
        }
        if let Some(channel) = &self.sales_channel_id {
            pairs.push(("sales_channel_id[]", channel.clone()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

/// One page of product search results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
}

// =============================================================================
// Envelopes
// =============================================================================
// The backend wraps every payload in an object keyed by resource name.

#[derive(Debug, Deserialize)]
pub(crate) struct DraftOrderEnvelope {
    pub draft_order: DraftOrder,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftOrderListEnvelope {
    #[serde(default)]
    pub draft_orders: Vec<DraftOrder>,
}

/// Answer of edit-session item calls: the draft as it will look on confirm.
#[derive(Debug, Deserialize)]
pub(crate) struct DraftPreviewEnvelope {
    pub draft_order_preview: DraftOrder,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderEnvelope {
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderListEnvelope {
    #[serde(default)]
    pub orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductEnvelope {
    pub product: Product,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegionListEnvelope {
    #[serde(default)]
    pub regions: Vec<Region>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SalesChannelListEnvelope {
    #[serde(default)]
    pub sales_channels: Vec<SalesChannel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomerListEnvelope {
    #[serde(default)]
    pub customers: Vec<CustomerRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddItemsBody<'a> {
    pub items: [&'a NewLineItem; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateItemBody {
    pub quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
