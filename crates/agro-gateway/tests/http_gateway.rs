//! HttpGateway against a local stand-in backend.

use agro_gateway::{
    CommerceGateway, GatewayError, HttpGateway, HttpGatewayConfig, NewDraftOrder, NewLineItem,
    ProductQuery,
};
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/admin/draft-orders", post(create_draft).get(list_drafts))
        .route("/admin/draft-orders/{id}", get(get_draft).delete(delete_draft))
        .route("/admin/draft-orders/{id}/edit", post(begin_edit))
        .route("/admin/draft-orders/{id}/edit/items", post(add_items))
        .route("/admin/products", get(search_products));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer sk_test")
}

async fn create_draft(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "no token"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "draft_order": {
                "id": "dord_new",
                "region_id": body["region_id"],
                "sales_channel_id": body["sales_channel_id"],
                "items": []
            }
        })),
    )
}

async fn list_drafts() -> Json<Value> {
    Json(json!({ "draft_orders": [{ "id": "dord_1" }, { "id": "dord_2" }], "count": 2 }))
}

async fn get_draft(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id != "dord_1" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"type": "not_found", "message": format!("Draft order {} was not found", id)})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "draft_order": {
                "id": "dord_1",
                "items": [{
                    "id": "ordli_1", "variant_id": "v1", "product_id": "p1",
                    "title": "Amistar", "variant_title": "100ml",
                    "quantity": 2, "unit_price": 150000
                }]
            }
        })),
    )
}

async fn delete_draft(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({ "id": "dord_1", "object": "draft-order", "deleted": true }))
}

async fn begin_edit(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id == "dord_busy" {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "An edit is already in progress"})),
        );
    }
    (StatusCode::OK, Json(json!({ "draft_order_preview": { "id": id, "items": [] } })))
}

async fn add_items(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let item = &body["items"][0];
    Json(json!({
        "draft_order_preview": {
            "id": id,
            "items": [
                { "id": "ordli_old", "variant_id": "v0", "title": "Old", "quantity": 1, "unit_price": 1 },
                {
                    "id": "ordli_added",
                    "variant_id": item["variant_id"],
                    "title": "Added",
                    "quantity": item["quantity"],
                    "unit_price": item["unit_price"]
                }
            ]
        }
    }))
}

async fn search_products(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let q = params.get("q").cloned().unwrap_or_default();
    Json(json!({
        "products": [{ "id": "prod_1", "title": format!("match for {}", q), "variants": [] }],
        "count": 1,
        "offset": params.get("offset").and_then(|o| o.parse::<u64>().ok()).unwrap_or(0),
        "limit": 20
    }))
}

async fn gateway(token: Option<&str>) -> HttpGateway {
    HttpGateway::new(&HttpGatewayConfig {
        base_url: spawn_backend().await,
        token: token.map(str::to_string),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_create_draft_sends_bearer_token() {
    let gw = gateway(Some("sk_test")).await;
    let draft = gw
        .create_draft(&NewDraftOrder::empty("reg_vn", "sc_pos"))
        .await
        .unwrap();
    assert_eq!(draft.id, "dord_new");
    assert_eq!(draft.region_id.as_deref(), Some("reg_vn"));

    let anonymous = gateway(None).await;
    let err = anonymous
        .create_draft(&NewDraftOrder::empty("reg_vn", "sc_pos"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized));
}

#[tokio::test]
async fn test_get_and_list_drafts() {
    let gw = gateway(Some("sk_test")).await;

    let drafts = gw.list_drafts().await.unwrap();
    assert_eq!(drafts.len(), 2);

    let draft = gw.get_draft("dord_1").await.unwrap();
    let lines = draft.cart_lines();
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].line_item_id.as_deref(), Some("ordli_1"));

    let err = gw.get_draft("dord_missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("dord_missing"));
}

#[tokio::test]
async fn test_add_line_item_picks_added_line() {
    let gw = gateway(Some("sk_test")).await;
    gw.begin_edit("dord_1").await.unwrap();

    let item = NewLineItem {
        variant_id: "v_new".into(),
        quantity: 3,
        unit_price: 120_000,
        metadata: None,
    };
    let line = gw.add_line_item("dord_1", &item).await.unwrap();
    assert_eq!(line.id, "ordli_added");
    assert_eq!(line.quantity, 3);
}

#[tokio::test]
async fn test_begin_edit_conflict_is_retryable() {
    let gw = gateway(Some("sk_test")).await;
    let err = gw.begin_edit("dord_busy").await.unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_delete_and_search() {
    let gw = gateway(Some("sk_test")).await;
    gw.delete_draft("dord_1").await.unwrap();

    let page = gw
        .search_products(&ProductQuery {
            q: Some("amistar".into()),
            limit: 20,
            offset: 20,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.products[0].title, "match for amistar");
    assert_eq!(page.offset, 20);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let gw = HttpGateway::new(&HttpGatewayConfig {
        base_url: "http://127.0.0.1:1".into(),
        token: None,
        timeout_secs: 2,
    })
    .unwrap();
    let err = gw.list_regions().await.unwrap_err();
    assert!(err.is_retryable());
}
