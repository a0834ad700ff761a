//! # Checkout Finalizer
//!
//! Turns a tab's draft order into a finalized order, paid in cash or by bank
//! transfer QR.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  cash:  Idle ──pay_cash──► Converting ──ok──► Idle (order recorded)     │
//! │                                 │                                       │
//! │                                 └──err──► Failed ──pay_cash──► ...      │
//! │                                                                         │
//! │  QR:    Idle ──start_qr──► AwaitingScan ──(scan delay)──► Received      │
//! │                                 │                            │          │
//! │                             cancel_qr                   confirm_qr      │
//! │                                 ▼                            ▼          │
//! │                               Idle                      Converting      │
//! │                                                                         │
//! │  Received never converts on its own: the cashier confirms the transfer  │
//! │  before the draft is finalized.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed conversion leaves the tab as it was; the cashier can retry.

use std::sync::Arc;
use std::time::Duration;

use agro_core::money::Money;
use agro_core::types::PaymentMethod;
use agro_core::ValidationError;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::config::PosConfig;
use crate::delayed::DelayedTask;
use crate::engine::PosEngine;
use crate::error::{PosError, PosResult};
use crate::events::PosEventEmitter;
use crate::history::{FinalizedOrder, OrderHistory};
use crate::tab::TabStatus;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    Converting,
    /// QR shown, waiting for the customer's transfer.
    AwaitingScan,
    /// Transfer reported; waiting for the cashier to confirm.
    Received,
    Failed { reason: String },
}

impl CheckoutState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "idle",
            CheckoutState::Converting => "converting",
            CheckoutState::AwaitingScan => "awaiting_scan",
            CheckoutState::Received => "received",
            CheckoutState::Failed { .. } => "failed",
        }
    }
}

/// Everything the checkout panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStatus {
    pub state: CheckoutState,
    pub tab_id: Option<String>,
    pub method: Option<PaymentMethod>,
    pub amount: Option<Money>,
    pub qr_payload: Option<String>,
    /// Last order finalized, for the success indicator.
    pub completed: Option<FinalizedOrder>,
}

impl Default for CheckoutStatus {
    fn default() -> Self {
        CheckoutStatus {
            state: CheckoutState::Idle,
            tab_id: None,
            method: None,
            amount: None,
            qr_payload: None,
            completed: None,
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Receiving bank account and the simulated scan delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub scan_delay: Duration,
    pub bank_bin: String,
    pub account_no: String,
    pub account_name: String,
}

impl CheckoutSettings {
    pub fn from_config(config: &PosConfig) -> Self {
        CheckoutSettings {
            scan_delay: config.qr_scan_delay(),
            bank_bin: config.payment.bank_bin.clone(),
            account_no: config.payment.account_no.clone(),
            account_name: config.payment.account_name.clone(),
        }
    }
}

/// Bank-transfer QR link for an amount, with the draft id as transfer memo.
pub fn qr_payload(settings: &CheckoutSettings, amount: Money, draft_id: &str) -> PosResult<String> {
    if amount.minor() <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        }
        .into());
    }
    let base = format!(
        "https://img.vietqr.io/image/{}-{}-compact2.png",
        settings.bank_bin, settings.account_no
    );
    let url = Url::parse_with_params(
        &base,
        &[
            ("amount", amount.minor().to_string()),
            ("addInfo", format!("TT {}", draft_id)),
            ("accountName", settings.account_name.clone()),
        ],
    )?;
    Ok(url.to_string())
}

// =============================================================================
// Finalizer
// =============================================================================

#[derive(Clone)]
pub struct CheckoutFinalizer {
    engine: PosEngine,
    history: OrderHistory,
    settings: CheckoutSettings,
    status: Arc<Mutex<CheckoutStatus>>,
    scan_timer: Arc<Mutex<Option<DelayedTask>>>,
}

impl CheckoutFinalizer {
    pub fn new(engine: PosEngine, history: OrderHistory, settings: CheckoutSettings) -> Self {
        CheckoutFinalizer {
            engine,
            history,
            settings,
            status: Arc::new(Mutex::new(CheckoutStatus::default())),
            scan_timer: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn status(&self) -> CheckoutStatus {
        self.status.lock().await.clone()
    }

    pub fn history(&self) -> &OrderHistory {
        &self.history
    }

    /// Converts the tab's draft right away.
    pub async fn pay_cash(&self, tab_id: &str) -> PosResult<FinalizedOrder> {
        let amount = self.payable_amount(tab_id).await?;
        self.transition(|status| {
            expect_start(&status.state)?;
            *status = CheckoutStatus {
                state: CheckoutState::Converting,
                tab_id: Some(tab_id.to_string()),
                method: Some(PaymentMethod::Cash),
                amount: Some(amount),
                qr_payload: None,
                completed: None,
            };
            Ok(())
        })
        .await?;

        self.convert(tab_id, PaymentMethod::Cash, amount).await
    }

    /// Shows the transfer QR and starts the simulated wait for the payment.
    pub async fn start_qr(&self, tab_id: &str) -> PosResult<CheckoutStatus> {
        let amount = self.payable_amount(tab_id).await?;
        let payload = qr_payload(&self.settings, amount, tab_id)?;

        let status = self
            .transition(|status| {
                expect_start(&status.state)?;
                *status = CheckoutStatus {
                    state: CheckoutState::AwaitingScan,
                    tab_id: Some(tab_id.to_string()),
                    method: Some(PaymentMethod::Qr),
                    amount: Some(amount),
                    qr_payload: Some(payload),
                    completed: None,
                };
                Ok(())
            })
            .await?;

        let shared = self.status.clone();
        let emitter = self.engine.emitter();
        let waiting_for = tab_id.to_string();
        let task = DelayedTask::schedule(self.settings.scan_delay, async move {
            mark_received(&shared, emitter.as_ref(), &waiting_for).await;
        });
        *self.scan_timer.lock().await = Some(task);

        info!(tab_id, amount = amount.minor(), "Waiting for QR transfer");
        Ok(status)
    }

    /// Finalizes a QR payment once the transfer was received.
    ///
    /// Also retries a QR conversion that failed.
    pub async fn confirm_qr(&self) -> PosResult<FinalizedOrder> {
        let mut tab_id = None;
        let mut amount = Money::zero();
        self.transition(|status| {
            let retry = matches!(status.state, CheckoutState::Failed { .. })
                && status.method == Some(PaymentMethod::Qr);
            if status.state != CheckoutState::Received && !retry {
                return Err(PosError::CheckoutState {
                    expected: "received",
                    actual: status.state.name(),
                });
            }
            status.state = CheckoutState::Converting;
            tab_id = status.tab_id.clone();
            amount = status.amount.unwrap_or_default();
            Ok(())
        })
        .await?;

        let tab_id = tab_id.ok_or(PosError::NoActiveTab)?;
        self.convert(&tab_id, PaymentMethod::Qr, amount).await
    }

    /// Abandons a pending QR payment.
    pub async fn cancel_qr(&self) -> PosResult<()> {
        self.transition(|status| {
            if !matches!(
                status.state,
                CheckoutState::AwaitingScan | CheckoutState::Received
            ) {
                return Err(PosError::CheckoutState {
                    expected: "awaiting_scan",
                    actual: status.state.name(),
                });
            }
            *status = CheckoutStatus::default();
            Ok(())
        })
        .await?;

        if let Some(task) = self.scan_timer.lock().await.take() {
            task.cancel();
        }
        info!("QR payment cancelled");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn payable_amount(&self, tab_id: &str) -> PosResult<Money> {
        let tab = self
            .engine
            .tab(tab_id)
            .await
            .ok_or_else(|| PosError::TabNotFound(tab_id.to_string()))?;
        if tab.status == TabStatus::Deleting {
            return Err(PosError::TabDeleting(tab_id.to_string()));
        }
        if tab.cart.is_empty() {
            return Err(PosError::EmptyCart);
        }
        Ok(tab.totals(self.engine.settings().vat_rate).total)
    }

    /// Applies a state change and emits the new status.
    async fn transition<F>(&self, change: F) -> PosResult<CheckoutStatus>
    where
        F: FnOnce(&mut CheckoutStatus) -> PosResult<()>,
    {
        let status = {
            let mut status = self.status.lock().await;
            change(&mut status)?;
            status.clone()
        };
        self.engine.emitter().emit_checkout(&status);
        Ok(status)
    }

    async fn convert(
        &self,
        tab_id: &str,
        method: PaymentMethod,
        amount: Money,
    ) -> PosResult<FinalizedOrder> {
        let result = match self.engine.flush_for_checkout(tab_id).await {
            Ok(()) => self
                .engine
                .gateway()
                .convert_to_order(tab_id)
                .await
                .map_err(PosError::from),
            Err(err) => Err(err),
        };

        let order = match result {
            Ok(order) => order,
            Err(err) => {
                warn!(tab_id, %method, error = %err, "Checkout failed");
                let reason = err.to_string();
                self.transition(|status| {
                    status.state = CheckoutState::Failed { reason };
                    Ok(())
                })
                .await?;
                self.engine.emitter().emit_error(&err.report());
                return Err(err);
            }
        };

        let finalized = FinalizedOrder {
            id: order.id.clone(),
            display_id: order.display_id,
            draft_id: Some(tab_id.to_string()),
            total: if order.total.is_zero() { amount } else { order.total },
            payment: Some(method),
            completed_at: order.created_at.unwrap_or_else(Utc::now),
        };
        info!(tab_id, order_id = %finalized.id, %method, total = finalized.total.minor(), "Order finalized");

        self.history.record(finalized.clone()).await;
        let completed = finalized.clone();
        self.transition(|status| {
            *status = CheckoutStatus {
                completed: Some(completed),
                ..CheckoutStatus::default()
            };
            Ok(())
        })
        .await?;

        // The converted draft drops out of the outstanding list
        if let Err(e) = self.engine.refresh().await {
            warn!(error = %e, "Tab refresh after checkout failed");
        }
        Ok(finalized)
    }
}

fn expect_start(state: &CheckoutState) -> PosResult<()> {
    match state {
        CheckoutState::Idle | CheckoutState::Failed { .. } => Ok(()),
        other => Err(PosError::CheckoutState {
            expected: "idle",
            actual: other.name(),
        }),
    }
}

async fn mark_received(status: &Mutex<CheckoutStatus>, emitter: &dyn PosEventEmitter, tab_id: &str) {
    let snapshot = {
        let mut status = status.lock().await;
        if status.state != CheckoutState::AwaitingScan || status.tab_id.as_deref() != Some(tab_id) {
            return;
        }
        status.state = CheckoutState::Received;
        status.clone()
    };
    info!(tab_id, "QR transfer received, waiting for cashier confirmation");
    emitter.emit_checkout(&snapshot);
}
