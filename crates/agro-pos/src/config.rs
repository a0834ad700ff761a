//! # POS Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     AGRO_GATEWAY_URL=https://shop.example.vn                           │
//! │     AGRO_API_TOKEN=sk_...                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/agro-pos/pos.toml (Linux)                                │
//! │     ~/Library/Application Support/vn.agro.pos/pos.toml (macOS)         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost gateway, 3 s confirm delay, built-in vouchers            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [terminal]
//! name = "Quầy 1"
//! region_id = "reg_01"
//! sales_channel_id = "sc_01"
//! currency = "vnd"
//!
//! [gateway]
//! url = "https://shop.example.vn"
//! api_token = "sk_..."
//! timeout_secs = 0          # 0 = no timeout
//!
//! [session]
//! confirm_delay_ms = 3000
//!
//! [pricing]
//! vat_rate_bps = 0
//!
//! [payment]
//! qr_scan_delay_ms = 5000
//! bank_bin = "970436"
//! account_no = "0123456789"
//! account_name = "CUA HANG VAT TU NONG NGHIEP"
//!
//! [catalog]
//! page_size = 20
//! diseases_path = "/etc/agro-pos/diseases.toml"
//!
//! [[vouchers]]
//! code = "GIAM10"
//! label = "Giảm 10%"
//! effect = { type = "percent", value = 10 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use agro_core::discount::{validate_vouchers, Voucher, VoucherEffect};
use agro_core::disease::DiseaseIndex;
use agro_core::money::Money;
use agro_core::types::VatRate;
use agro_core::validation::{validate_currency_code, validate_vat_rate};
use agro_core::DEFAULT_CURRENCY;
use agro_gateway::HttpGatewayConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PosError, PosResult};

// =============================================================================
// Terminal
// =============================================================================

/// This register and the commerce defaults its tabs are created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Terminal identifier, generated on first run.
    #[serde(default = "default_terminal_id")]
    pub id: String,

    #[serde(default = "default_terminal_name")]
    pub name: String,

    /// Region for new draft orders. Resolved from the backend when unset.
    #[serde(default)]
    pub region_id: Option<String>,

    /// Sales channel for new draft orders and product search.
    #[serde(default)]
    pub sales_channel_id: Option<String>,

    /// Price currency. Falls back to the region's currency.
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_terminal_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_terminal_name() -> String {
    "POS".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            id: default_terminal_id(),
            name: default_terminal_name(),
            region_id: None,
            sales_channel_id: None,
            currency: None,
        }
    }
}

// =============================================================================
// Gateway
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Admin API token.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout; 0 waits forever.
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_gateway_url() -> String {
    "http://localhost:9000".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            url: default_gateway_url(),
            api_token: None,
            timeout_secs: 0,
        }
    }
}

// =============================================================================
// Session / Pricing / Payment / Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Quiet period after the last mutation before the edit is confirmed.
    #[serde(default = "default_confirm_delay")]
    pub confirm_delay_ms: u64,
}

fn default_confirm_delay() -> u64 {
    3000
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            confirm_delay_ms: default_confirm_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingSettings {
    /// VAT in basis points. Zero until a tax policy exists.
    #[serde(default)]
    pub vat_rate_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Simulated time between showing the QR code and the transfer arriving.
    #[serde(default = "default_qr_scan_delay")]
    pub qr_scan_delay_ms: u64,

    /// Bank identification number of the receiving account.
    #[serde(default)]
    pub bank_bin: String,

    #[serde(default)]
    pub account_no: String,

    #[serde(default)]
    pub account_name: String,

    /// Finalized orders kept in the local history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_qr_scan_delay() -> u64 {
    5000
}

fn default_history_limit() -> usize {
    20
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            qr_scan_delay_ms: default_qr_scan_delay(),
            bank_bin: String::new(),
            account_no: String::new(),
            account_name: String::new(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Disease reference file (TOML or JSON). The built-in set is used when
    /// unset.
    #[serde(default)]
    pub diseases_path: Option<PathBuf>,
}

fn default_page_size() -> u32 {
    20
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            page_size: default_page_size(),
            diseases_path: None,
        }
    }
}

fn default_vouchers() -> Vec<Voucher> {
    vec![
        Voucher {
            code: "FREESHIP".to_string(),
            label: "Miễn phí vận chuyển".to_string(),
            effect: VoucherEffect::FreeShipping,
            max_discount: None,
        },
        Voucher {
            code: "GIAM10".to_string(),
            label: "Giảm 10% đơn hàng".to_string(),
            effect: VoucherEffect::Percent(10),
            max_discount: Some(Money::from_minor(200_000)),
        },
        Voucher {
            code: "GIAM50K".to_string(),
            label: "Giảm 50.000 ₫".to_string(),
            effect: VoucherEffect::Fixed(Money::from_minor(50_000)),
            max_discount: None,
        },
    ]
}

// =============================================================================
// Main POS Configuration
// =============================================================================

/// Complete POS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default = "default_vouchers")]
    pub vouchers: Vec<Voucher>,
}

impl Default for PosConfig {
    fn default() -> Self {
        PosConfig {
            terminal: TerminalConfig::default(),
            gateway: GatewaySettings::default(),
            session: SessionSettings::default(),
            pricing: PricingSettings::default(),
            payment: PaymentSettings::default(),
            catalog: CatalogSettings::default(),
            vouchers: default_vouchers(),
        }
    }
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (pos.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PosResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading POS config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load POS config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> PosResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| PosError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PosError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| PosError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "POS config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PosResult<()> {
        let url = url::Url::parse(&self.gateway.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PosError::InvalidUrl(format!(
                "Gateway URL must start with http:// or https://, got: {}",
                self.gateway.url
            )));
        }

        if self.session.confirm_delay_ms == 0 {
            return Err(PosError::InvalidConfig(
                "confirm_delay_ms must be greater than 0".into(),
            ));
        }

        if self.catalog.page_size == 0 || self.catalog.page_size > 100 {
            return Err(PosError::InvalidConfig(
                "page_size must be between 1 and 100".into(),
            ));
        }

        if let Some(currency) = &self.terminal.currency {
            validate_currency_code(currency)?;
        }
        validate_vat_rate(self.vat_rate())?;
        validate_vouchers(&self.vouchers)?;

        Ok(())
    }

    /// Applies `AGRO_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AGRO_GATEWAY_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.gateway.url = url;
        }

        if let Some(token) = lookup("AGRO_API_TOKEN") {
            self.gateway.api_token = Some(token);
        }

        if let Some(region) = lookup("AGRO_REGION_ID") {
            self.terminal.region_id = Some(region);
        }

        if let Some(channel) = lookup("AGRO_SALES_CHANNEL_ID") {
            self.terminal.sales_channel_id = Some(channel);
        }

        if let Some(currency) = lookup("AGRO_CURRENCY") {
            self.terminal.currency = Some(currency.to_lowercase());
        }

        if let Some(delay) = lookup("AGRO_CONFIRM_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => self.session.confirm_delay_ms = ms,
                Err(_) => warn!(value = %delay, "Ignoring non-numeric AGRO_CONFIRM_DELAY_MS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("vn", "agro", "agro-pos")
            .map(|dirs| dirs.config_dir().join("pos.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.session.confirm_delay_ms)
    }

    pub fn qr_scan_delay(&self) -> Duration {
        Duration::from_millis(self.payment.qr_scan_delay_ms)
    }

    pub fn vat_rate(&self) -> VatRate {
        VatRate::from_bps(self.pricing.vat_rate_bps)
    }

    /// Configured currency, or the crate default.
    pub fn currency(&self) -> &str {
        self.terminal.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
    }

    /// Settings for the HTTP gateway.
    pub fn http_gateway(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            base_url: self.gateway.url.clone(),
            token: self.gateway.api_token.clone(),
            timeout_secs: self.gateway.timeout_secs,
        }
    }

    /// Loads the disease reference set: the configured file, or the
    /// built-in one.
    pub fn load_diseases(&self) -> PosResult<DiseaseIndex> {
        match &self.catalog.diseases_path {
            Some(path) => load_disease_file(path),
            None => Ok(DiseaseIndex::builtin()?),
        }
    }
}

fn load_disease_file(path: &Path) -> PosResult<DiseaseIndex> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let index = if is_json {
        DiseaseIndex::from_json_str(&contents)?
    } else {
        DiseaseIndex::from_toml_str(&contents)?
    };
    info!(?path, diseases = index.len(), "Loaded disease reference data");
    Ok(index)
}
