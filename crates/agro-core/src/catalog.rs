//! # Catalog Model
//!
//! Read-only product data as the commerce backend returns it, plus the
//! conversion from a picked variant to a [`CartLine`].
//!
//! ## Product Shape
//! ```text
//! Product
//! ├── id, title, thumbnail
//! ├── metadata.active_ingredient   "Azoxystrobin 200g/l + ..."
//! └── variants[]
//!     ├── id, title ("100ml", "1L")
//!     ├── metadata.active_ingredient (optional, checked on the first variant)
//!     ├── metadata.tech_specs         ("25SC", "Made in Japan")
//!     └── prices[] { currency_code, amount }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cart::{CartLine, LineSync};
use crate::error::{CoreError, CoreResult};
use crate::money::{deserialize_amount, Money};
use crate::validation::validate_quantity;

/// Metadata key holding the active ingredient text.
pub const ACTIVE_INGREDIENT_KEY: &str = "active_ingredient";

/// Metadata keys that may hold the technical spec text of a variant.
const TECH_SPEC_KEYS: &[&str] = &["tech_specs", "technical_specs", "specs"];

// =============================================================================
// Product
// =============================================================================

/// A price of a variant in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPrice {
    pub currency_code: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: Money,
}

/// A sellable variant (pack size, concentration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub prices: Vec<VariantPrice>,
}

impl ProductVariant {
    /// Price in the given currency (case-insensitive code).
    pub fn price_for(&self, currency: &str) -> Option<Money> {
        self.prices
            .iter()
            .find(|p| p.currency_code.eq_ignore_ascii_case(currency))
            .map(|p| p.amount)
    }

    /// Technical spec text, empty when the variant has none.
    pub fn tech_specs(&self) -> String {
        TECH_SPEC_KEYS
            .iter()
            .find_map(|key| metadata_text(self.metadata.as_ref(), key))
            .unwrap_or_default()
    }

    pub fn active_ingredient(&self) -> Option<String> {
        metadata_text(self.metadata.as_ref(), ACTIVE_INGREDIENT_KEY)
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Active ingredient texts to match against: the product-level value and
    /// the first variant's value, in that order.
    pub fn active_ingredients(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2);
        if let Some(text) = metadata_text(self.metadata.as_ref(), ACTIVE_INGREDIENT_KEY) {
            out.push(text);
        }
        if let Some(text) = self.variants.first().and_then(ProductVariant::active_ingredient) {
            out.push(text);
        }
        out
    }

    pub fn variant(&self, variant_id: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Lowest variant price in a currency, for list display.
    pub fn from_price(&self, currency: &str) -> Option<Money> {
        self.variants.iter().filter_map(|v| v.price_for(currency)).min()
    }
}

/// Reads a metadata entry as text. Arrays of strings are joined with ", ".
fn metadata_text(metadata: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    match metadata?.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

// =============================================================================
// Picking a Variant
// =============================================================================

/// Builds the cart line for `quantity` units of a variant, priced in
/// `currency`.
pub fn line_for(
    product: &Product,
    variant: &ProductVariant,
    currency: &str,
    quantity: i64,
) -> CoreResult<CartLine> {
    validate_quantity(quantity)?;
    let unit_price = variant
        .price_for(currency)
        .ok_or_else(|| CoreError::MissingPrice {
            variant_id: variant.id.clone(),
            currency: currency.to_string(),
        })?;

    Ok(CartLine {
        product_id: product.id.clone(),
        variant_id: variant.id.clone(),
        line_item_id: None,
        name: product.title.clone(),
        unit_price,
        quantity,
        variant_label: variant.title.clone(),
        image: product.thumbnail.clone(),
        tech_specs: variant.tech_specs(),
        sync: LineSync::Pending,
    })
}

/// Same as [`line_for`] for the product's first variant.
pub fn line_for_default_variant(
    product: &Product,
    currency: &str,
    quantity: i64,
) -> CoreResult<CartLine> {
    let variant = product
        .variants
        .first()
        .ok_or_else(|| CoreError::NoVariant(product.id.clone()))?;
    line_for(product, variant, currency, quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================
