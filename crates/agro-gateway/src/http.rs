//! HTTP implementation of [`CommerceGateway`] against the backend's admin
//! REST API.
//!
//! | Operation          | Request                                                 |
//! |--------------------|---------------------------------------------------------|
//! | create_draft       | `POST   admin/draft-orders`                             |
//! | get_draft          | `GET    admin/draft-orders/{id}`                        |
//! | list_drafts        | `GET    admin/draft-orders`                             |
//! | delete_draft       | `DELETE admin/draft-orders/{id}`                        |
//! | convert_to_order   | `POST   admin/draft-orders/{id}/convert-to-order`       |
//! | begin_edit         | `POST   admin/draft-orders/{id}/edit`                   |
//! | confirm_edit       | `POST   admin/draft-orders/{id}/edit/confirm`           |
//! | cancel_edit        | `DELETE admin/draft-orders/{id}/edit`                   |
//! | add_line_item      | `POST   admin/draft-orders/{id}/edit/items`             |
//! | update_line_item   | `POST   admin/draft-orders/{id}/edit/items/item/{item}` |
//! | remove_line_item   | `DELETE admin/draft-orders/{id}/edit/items/item/{item}` |

use std::time::Duration;

use agro_core::catalog::Product;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::types::*;
use crate::CommerceGateway;

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Backend root, e.g. `https://shop.example.vn`.
    pub base_url: String,
    /// Admin API token, sent as a bearer token.
    pub token: Option<String>,
    /// Per-request timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
}

/// Commerce gateway over JSON/HTTPS.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &HttpGatewayConfig) -> GatewayResult<Self> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base(&config.base_url)?,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Replaces the API token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a `/`-separated path relative to the base URL.
    pub fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.url(&segments)
    }

    /// Appends path segments to the base URL. Each segment is percent-encoded,
    /// so ids cannot add segments or start a query.
    pub fn url(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(format!("'{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of a draft order, or of a resource below it.
    fn draft_url(&self, draft_id: &str, rest: &[&str]) -> GatewayResult<Url> {
        let mut segments = vec!["admin", "draft-orders", draft_id];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn request(&self, method: Method, url: Url) -> GatewayResult<RequestBuilder> {
        debug!(%method, %url, "gateway request");
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    // ========== Generic Requests ==========

    async fn get<T: DeserializeOwned>(&self, url: Url) -> GatewayResult<T> {
        let response = self.request(Method::GET, url)?.send().await?;
        Self::handle_response(response).await
    }

    async fn get_query<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> GatewayResult<T> {
        let response = self.request(Method::GET, url)?.query(query).send().await?;
        Self::handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> GatewayResult<T> {
        let response = self.request(Method::POST, url)?.json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Sends a request whose answer body the POS does not need.
    async fn send_discard(&self, method: Method, url: Url) -> GatewayResult<()> {
        let response = self.request(method, url)?.send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = GatewayError::from_status(status, &body);
        warn!(status = status.as_u16(), error = %err, "gateway call failed");
        Err(err)
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        let response = Self::check_status(response).await?;
        response.json().await.map_err(Into::into)
    }
}

/// Parses the base URL, adding a trailing `/` when missing.
fn normalize_base(raw: &str) -> GatewayResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GatewayError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            other
        ))),
    }
}

// =============================================================================
// CommerceGateway
// =============================================================================

#[async_trait]
impl CommerceGateway for HttpGateway {
    async fn create_draft(&self, draft: &NewDraftOrder) -> GatewayResult<DraftOrder> {
        let envelope: DraftOrderEnvelope = self.post(self.endpoint("admin/draft-orders")?, draft).await?;
        Ok(envelope.draft_order)
    }

    async fn get_draft(&self, draft_id: &str) -> GatewayResult<DraftOrder> {
        let envelope: DraftOrderEnvelope = self.get(self.draft_url(draft_id, &[])?).await?;
        Ok(envelope.draft_order)
    }

    async fn list_drafts(&self) -> GatewayResult<Vec<DraftOrder>> {
        let query = [
            ("order", "created_at".to_string()),
            ("limit", "100".to_string()),
        ];
        let envelope: DraftOrderListEnvelope =
            self.get_query(self.endpoint("admin/draft-orders")?, &query).await?;
        Ok(envelope.draft_orders)
    }

    async fn delete_draft(&self, draft_id: &str) -> GatewayResult<()> {
        self.send_discard(Method::DELETE, self.draft_url(draft_id, &[])?)
            .await
    }

    async fn convert_to_order(&self, draft_id: &str) -> GatewayResult<Order> {
        let url = self.draft_url(draft_id, &["convert-to-order"])?;
        let envelope: OrderEnvelope = self.post(url, &serde_json::json!({})).await?;
        Ok(envelope.order)
    }

    async fn add_line_item(&self, draft_id: &str, item: &NewLineItem) -> GatewayResult<LineItem> {
        let url = self.draft_url(draft_id, &["edit", "items"])?;
        let body = AddItemsBody { items: [item] };
        let envelope: DraftPreviewEnvelope = self.post(url, &body).await?;

        // The preview lists every line; the new one is the last for the variant.
        envelope
            .draft_order_preview
            .items
            .into_iter()
            .rev()
            .find(|line| line.variant_id.as_deref() == Some(item.variant_id.as_str()))
            .ok_or_else(|| {
                GatewayError::InvalidResponse(format!(
                    "added variant {} missing from draft preview",
                    item.variant_id
                ))
            })
    }

    async fn update_line_item(
        &self,
        draft_id: &str,
        line_item_id: &str,
        quantity: i64,
    ) -> GatewayResult<()> {
        let url = self.draft_url(draft_id, &["edit", "items", "item", line_item_id])?;
        let _: DraftPreviewEnvelope = self.post(url, &UpdateItemBody { quantity }).await?;
        Ok(())
    }

    async fn remove_line_item(&self, draft_id: &str, line_item_id: &str) -> GatewayResult<()> {
        let url = self.draft_url(draft_id, &["edit", "items", "item", line_item_id])?;
        self.send_discard(Method::DELETE, url).await
    }

    async fn begin_edit(&self, draft_id: &str) -> GatewayResult<()> {
        let url = self.draft_url(draft_id, &["edit"])?;
        self.send_discard(Method::POST, url).await
    }

    async fn confirm_edit(&self, draft_id: &str) -> GatewayResult<()> {
        let url = self.draft_url(draft_id, &["edit", "confirm"])?;
        self.send_discard(Method::POST, url).await
    }

    async fn cancel_edit(&self, draft_id: &str) -> GatewayResult<()> {
        let url = self.draft_url(draft_id, &["edit"])?;
        self.send_discard(Method::DELETE, url).await
    }

    async fn search_products(&self, query: &ProductQuery) -> GatewayResult<ProductPage> {
        let mut pairs = query.to_pairs();
        pairs.push((
            "fields",
            "*variants,*variants.prices,+metadata,+variants.metadata".to_string(),
        ));
        self.get_query(self.endpoint("admin/products")?, &pairs).await
    }

    async fn get_product(&self, product_id: &str) -> GatewayResult<Product> {
        let url = self.url(&["admin", "products", product_id])?;
        let query = [(
            "fields",
            "*variants,*variants.prices,+metadata,+variants.metadata".to_string(),
        )];
        let envelope: ProductEnvelope = self.get_query(url, &query).await?;
        Ok(envelope.product)
    }

    async fn list_customers(&self, q: Option<&str>) -> GatewayResult<Vec<CustomerRecord>> {
        let mut query = vec![("limit", "50".to_string())];
        if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
            query.push(("q", q.to_string()));
        }
        let envelope: CustomerListEnvelope = self.get_query(self.endpoint("admin/customers")?, &query).await?;
        Ok(envelope.customers)
    }

    async fn list_regions(&self) -> GatewayResult<Vec<Region>> {
        let envelope: RegionListEnvelope = self.get(self.endpoint("admin/regions")?).await?;
        Ok(envelope.regions)
    }

    async fn list_sales_channels(&self) -> GatewayResult<Vec<SalesChannel>> {
        let envelope: SalesChannelListEnvelope = self.get(self.endpoint("admin/sales-channels")?).await?;
        Ok(envelope.sales_channels)
    }

    async fn list_orders(&self, limit: u32) -> GatewayResult<Vec<Order>> {
        let query = [
            ("order", "-created_at".to_string()),
            ("limit", limit.to_string()),
        ];
        let envelope: OrderListEnvelope = self.get_query(self.endpoint("admin/orders")?, &query).await?;
        Ok(envelope.orders)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
