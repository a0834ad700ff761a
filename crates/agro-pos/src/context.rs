//! # Application Context
//!
//! Session-wide values that several parts of the POS read: the API token,
//! the region and sales channel new drafts are created in, and the price
//! currency. It is passed explicitly to whoever needs it.
//!
//! ```text
//!            PosConfig ──► AppContext::from_config
//!                               │
//!        bootstrap() fills ─────┤ region / sales channel / currency
//!        in what is unset       │ (from the gateway's lists)
//!                               ▼
//!     PosEngine (create_tab)   CatalogService (search scope, pricing)
//! ```

use std::sync::Arc;

use agro_core::DEFAULT_CURRENCY;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::PosConfig;
use crate::error::{PosError, PosResult};

/// Point-in-time copy of the context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub terminal_name: String,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub region_id: Option<String>,
    pub sales_channel_id: Option<String>,
    pub currency: String,
}

impl ContextSnapshot {
    /// Region and sales channel required to create a draft.
    pub fn draft_defaults(&self) -> PosResult<(String, String)> {
        let region = self
            .region_id
            .clone()
            .ok_or(PosError::MissingContext("region"))?;
        let channel = self
            .sales_channel_id
            .clone()
            .ok_or(PosError::MissingContext("sales channel"))?;
        Ok((region, channel))
    }
}

/// Shared, explicitly passed application context.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    inner: Arc<RwLock<ContextSnapshot>>,
}

impl AppContext {
    pub fn new(snapshot: ContextSnapshot) -> Self {
        AppContext {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn from_config(config: &PosConfig) -> Self {
        Self::new(ContextSnapshot {
            terminal_name: config.terminal.name.clone(),
            api_token: config.gateway.api_token.clone(),
            region_id: config.terminal.region_id.clone(),
            sales_channel_id: config.terminal.sales_channel_id.clone(),
            currency: config
                .terminal
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        })
    }

    pub async fn snapshot(&self) -> ContextSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn currency(&self) -> String {
        self.inner.read().await.currency.clone()
    }

    pub async fn sales_channel_id(&self) -> Option<String> {
        self.inner.read().await.sales_channel_id.clone()
    }

    pub async fn set_region(&self, region_id: impl Into<String>, currency: Option<String>) {
        let mut ctx = self.inner.write().await;
        ctx.region_id = Some(region_id.into());
        if let Some(currency) = currency {
            ctx.currency = currency.to_lowercase();
        }
    }

    pub async fn set_sales_channel(&self, sales_channel_id: impl Into<String>) {
        self.inner.write().await.sales_channel_id = Some(sales_channel_id.into());
    }

    pub async fn set_token(&self, token: Option<String>) {
        self.inner.write().await.api_token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_and_updates() {
        let mut config = PosConfig::default();
        config.gateway.api_token = Some("sk_1".to_string());
        let ctx = AppContext::from_config(&config);

        let snap = ctx.snapshot().await;
        assert_eq!(snap.currency, "vnd");
        assert!(matches!(
            snap.draft_defaults(),
            Err(PosError::MissingContext("region"))
        ));

        ctx.set_region("reg_us", Some("USD".to_string())).await;
        ctx.set_sales_channel("sc_pos").await;
        let snap = ctx.snapshot().await;
        assert_eq!(snap.currency, "usd");
        assert_eq!(
            snap.draft_defaults().unwrap(),
            ("reg_us".to_string(), "sc_pos".to_string())
        );

        // The token never leaves the process through serialization
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("api_token").is_none());
    }
}
