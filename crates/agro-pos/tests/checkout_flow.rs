//! Cash and QR checkout, and the order history they feed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use agro_core::catalog::{line_for_default_variant, Product};
use agro_core::types::PaymentMethod;
use agro_pos::{
    CheckoutFinalizer, CheckoutSettings, CheckoutState, OrderHistory, PosEngine, PosError,
};
use common::{engine, product, FakeGateway, RecordingEmitter};

struct Till {
    fake: FakeGateway,
    engine: PosEngine,
    emitter: Arc<RecordingEmitter>,
    checkout: CheckoutFinalizer,
}

fn amistar() -> Product {
    product("p_amistar", "Amistar Top 325SC", "Azoxystrobin", 150_000)
}

async fn till(history_limit: usize) -> Till {
    let fake = FakeGateway::with_products(vec![amistar()]);
    let (engine, emitter) = engine(&fake);
    engine.bootstrap().await.unwrap();

    let history = OrderHistory::new(Arc::new(fake.clone()), history_limit);
    let settings = CheckoutSettings {
        scan_delay: Duration::from_secs(5),
        bank_bin: "970436".to_string(),
        account_no: "0123456789".to_string(),
        account_name: "CUA HANG VAT TU NONG NGHIEP".to_string(),
    };
    let checkout = CheckoutFinalizer::new(engine.clone(), history, settings);
    Till {
        fake,
        engine,
        emitter,
        checkout,
    }
}

/// Puts `quantity` units in the active tab and returns its id.
async fn ring_up(till: &Till, quantity: i64) -> String {
    let line = line_for_default_variant(&amistar(), "vnd", quantity).unwrap();
    till.engine.add_to_cart(line).await.unwrap();
    till.engine.active_tab_id().await.unwrap()
}

// =============================================================================
// Cash
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cash_payment_converts_the_draft() {
    let till = till(10).await;
    let tab_id = ring_up(&till, 2).await;
    till.fake.clear_calls();

    let order = till.checkout.pay_cash(&tab_id).await.unwrap();

    assert_eq!(order.total.minor(), 300_000);
    assert_eq!(order.payment, Some(PaymentMethod::Cash));
    assert_eq!(order.draft_id.as_deref(), Some(tab_id.as_str()));

    let ops = till.fake.ops();
    let confirm = ops.iter().position(|op| *op == "confirm_edit").unwrap();
    let convert = ops.iter().position(|op| *op == "convert_to_order").unwrap();
    assert!(confirm < convert);

    let status = till.checkout.status().await;
    assert_eq!(status.state, CheckoutState::Idle);
    assert_eq!(status.completed.as_ref().map(|o| o.id.as_str()), Some(order.id.as_str()));

    // The converted tab is gone and a fresh one took its place
    let tabs = till.engine.tabs().await;
    assert_eq!(tabs.len(), 1);
    assert_ne!(tabs[0].id, tab_id);
    assert!(tabs[0].active);

    let recent = till.checkout.history().recent_orders().await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, order.id);
}

#[tokio::test(start_paused = true)]
async fn empty_cart_cannot_be_paid() {
    let till = till(10).await;
    let tab_id = till.engine.active_tab_id().await.unwrap();

    assert!(matches!(
        till.checkout.pay_cash(&tab_id).await,
        Err(PosError::EmptyCart)
    ));
    assert!(matches!(
        till.checkout.start_qr(&tab_id).await,
        Err(PosError::EmptyCart)
    ));
    assert_eq!(till.checkout.status().await.state, CheckoutState::Idle);
    assert_eq!(till.fake.count("convert_to_order"), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_conversion_keeps_the_tab_for_a_retry() {
    let till = till(10).await;
    let tab_id = ring_up(&till, 1).await;

    till.fake.fail_times("convert_to_order", 1);
    assert!(till.checkout.pay_cash(&tab_id).await.is_err());

    let status = till.checkout.status().await;
    assert!(matches!(status.state, CheckoutState::Failed { .. }));
    assert!(till.engine.tab(&tab_id).await.is_some());
    assert_eq!(till.emitter.error_count(), 1);
    assert!(till.checkout.history().recent_orders().await.is_empty());

    let order = till.checkout.pay_cash(&tab_id).await.unwrap();
    assert_eq!(order.total.minor(), 150_000);
    assert!(till.engine.tab(&tab_id).await.is_none());
}

// =============================================================================
// QR Transfer
// =============================================================================

#[tokio::test(start_paused = true)]
async fn qr_payment_waits_for_the_cashier() {
    let till = till(10).await;
    let tab_id = ring_up(&till, 2).await;

    let status = till.checkout.start_qr(&tab_id).await.unwrap();
    assert_eq!(status.state, CheckoutState::AwaitingScan);
    assert_eq!(status.amount.map(|m| m.minor()), Some(300_000));
    assert!(status.qr_payload.unwrap().contains("amount=300000"));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(till.checkout.status().await.state, CheckoutState::Received);

    // Nothing converts on its own
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(till.checkout.status().await.state, CheckoutState::Received);
    assert_eq!(till.fake.count("convert_to_order"), 0);

    let order = till.checkout.confirm_qr().await.unwrap();
    assert_eq!(order.payment, Some(PaymentMethod::Qr));
    assert_eq!(order.total.minor(), 300_000);
    assert_eq!(till.checkout.status().await.state, CheckoutState::Idle);

    let states: Vec<&str> = till
        .emitter
        .checkout
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.state.name())
        .collect();
    assert_eq!(states, vec!["awaiting_scan", "received", "converting", "idle"]);
}

#[tokio::test(start_paused = true)]
async fn qr_confirm_before_transfer_is_rejected() {
    let till = till(10).await;
    let tab_id = ring_up(&till, 1).await;
    till.checkout.start_qr(&tab_id).await.unwrap();

    assert!(matches!(
        till.checkout.confirm_qr().await,
        Err(PosError::CheckoutState { .. })
    ));
    assert!(matches!(
        till.checkout.pay_cash(&tab_id).await,
        Err(PosError::CheckoutState { .. })
    ));
    assert_eq!(till.checkout.status().await.state, CheckoutState::AwaitingScan);
}

#[tokio::test(start_paused = true)]
async fn cancelled_qr_never_completes() {
    let till = till(10).await;
    let tab_id = ring_up(&till, 1).await;
    till.checkout.start_qr(&tab_id).await.unwrap();

    till.checkout.cancel_qr().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(till.checkout.status().await.state, CheckoutState::Idle);
    assert!(till.engine.tab(&tab_id).await.is_some());
    assert_eq!(till.fake.count("convert_to_order"), 0);
    assert!(till.checkout.cancel_qr().await.is_err());
}

// =============================================================================
// History
// =============================================================================

#[tokio::test(start_paused = true)]
async fn history_keeps_the_most_recent_orders() {
    let till = till(2).await;

    let mut order_ids = Vec::new();
    for quantity in 1..=3 {
        let tab_id = ring_up(&till, quantity).await;
        order_ids.push(till.checkout.pay_cash(&tab_id).await.unwrap().id);
    }

    let recent: Vec<String> = till
        .checkout
        .history()
        .recent_orders()
        .await
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(recent, vec![order_ids[2].clone(), order_ids[1].clone()]);

    let reloaded = till.checkout.history().refresh_history().await.unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].id, order_ids[2]);
    assert_eq!(reloaded[0].payment, Some(PaymentMethod::Cash));
    assert_eq!(reloaded[0].total.minor(), 450_000);
}
