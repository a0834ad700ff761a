//! # Catalog Service
//!
//! Product search with disease-remedy ranking, and the detail views the
//! cashier opens from the results.
//!
//! ```text
//!  search("vàng lá")
//!     ├─ gateway.search_products(q, channel)        text matches
//!     ├─ diseases.match_query(q)                    "Vàng lá chín sớm"
//!     │    └─ matched? gateway.search_products(channel)  unfiltered page,
//!     │                                                  appended once
//!     └─ diseases.rank(q, products)                 recommended first
//! ```

use std::sync::Arc;

use agro_core::catalog::{line_for, line_for_default_variant, Product};
use agro_core::cart::CartLine;
use agro_core::disease::{is_recommended, DiseaseIndex, DiseaseRecord, RankedProduct};
use agro_core::validation::validate_search_query;
use agro_core::CoreError;
use agro_gateway::{CommerceGateway, CustomerRecord, ProductQuery};
use tracing::debug;

use crate::context::AppContext;
use crate::error::PosResult;

/// What the cashier typed in the search box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub category_id: Option<String>,
    /// Page size; the configured default when `None`.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        SearchQuery {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Ranked search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    /// Diseases the query matched; empty for a plain product search.
    pub diseases: Vec<DiseaseRecord>,
    /// Recommended products first, catalog order otherwise.
    pub products: Vec<RankedProduct>,
    /// Total hits of the text search as reported by the backend.
    pub count: u64,
}

/// A product with the diseases it is recommended for.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetail {
    pub product: Product,
    pub treats: Vec<DiseaseRecord>,
}

#[derive(Clone)]
pub struct CatalogService {
    gateway: Arc<dyn CommerceGateway>,
    context: AppContext,
    diseases: Arc<DiseaseIndex>,
    page_size: u32,
}

impl CatalogService {
    pub fn new(
        gateway: Arc<dyn CommerceGateway>,
        context: AppContext,
        diseases: DiseaseIndex,
        page_size: u32,
    ) -> Self {
        CatalogService {
            gateway,
            context,
            diseases: Arc::new(diseases),
            page_size: page_size.max(1),
        }
    }

    pub fn diseases(&self) -> &DiseaseIndex {
        &self.diseases
    }

    /// Searches the catalog in the context's sales channel and ranks the
    /// results against the disease index.
    pub async fn search(&self, query: &SearchQuery) -> PosResult<SearchResults> {
        let text = validate_search_query(&query.text)?;
        let mut request = ProductQuery {
            q: Some(text.clone()).filter(|t| !t.is_empty()),
            category_id: query.category_id.clone(),
            sales_channel_id: self.context.sales_channel_id().await,
            limit: query.limit.unwrap_or(self.page_size),
            offset: query.offset,
        };

        let page = self.gateway.search_products(&request).await?;
        let count = page.count;
        let mut products = page.products;

        // A disease name rarely appears in product titles; pull the plain
        // listing so the remedies have something to rank
        let matched_disease = !self.diseases.match_query(&text).is_empty();
        if matched_disease && request.q.is_some() && query.offset == 0 {
            request.q = None;
            let listing = self.gateway.search_products(&request).await?;
            for product in listing.products {
                if !products.iter().any(|p| p.id == product.id) {
                    products.push(product);
                }
            }
        }

        let (diseases, products) = self.diseases.rank(&text, products);
        let diseases: Vec<DiseaseRecord> = diseases.into_iter().cloned().collect();
        debug!(
            query = %text,
            diseases = diseases.len(),
            products = products.len(),
            recommended = products.iter().filter(|p| p.recommended).count(),
            "Catalog search"
        );

        Ok(SearchResults {
            diseases,
            products,
            count,
        })
    }

    /// Product detail view with the diseases the product treats.
    pub async fn product_detail(&self, product_id: &str) -> PosResult<ProductDetail> {
        let product = self.gateway.get_product(product_id).await?;
        let treats = self
            .diseases
            .records()
            .iter()
            .filter(|d| is_recommended(&product, &DiseaseIndex::recommended_ingredients(&[*d])))
            .cloned()
            .collect();
        Ok(ProductDetail { product, treats })
    }

    pub fn disease_detail(&self, disease_id: &str) -> Option<DiseaseRecord> {
        self.diseases.get(disease_id).cloned()
    }

    /// Cart line for a picked variant (the first one when `None`), priced in
    /// the context currency.
    pub async fn line_for(
        &self,
        product: &Product,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> PosResult<CartLine> {
        let currency = self.context.currency().await;
        let line = match variant_id {
            Some(id) => {
                let variant = product
                    .variant(id)
                    .ok_or_else(|| CoreError::NoVariant(product.id.clone()))?;
                line_for(product, variant, &currency, quantity)?
            }
            None => line_for_default_variant(product, &currency, quantity)?,
        };
        Ok(line)
    }

    pub async fn search_customers(&self, q: Option<&str>) -> PosResult<Vec<CustomerRecord>> {
        let q = match q {
            Some(text) => Some(validate_search_query(text)?),
            None => None,
        };
        let q = q.as_deref().filter(|t| !t.is_empty());
        Ok(self.gateway.list_customers(q).await?)
    }
}
