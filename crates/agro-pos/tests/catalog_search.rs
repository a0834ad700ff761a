//! Product search with disease ranking.

mod common;

use std::sync::Arc;

use agro_core::disease::DiseaseIndex;
use agro_gateway::CustomerRecord;
use agro_pos::{CatalogService, SearchQuery};
use common::{context, product, FakeGateway};

fn catalog(fake: &FakeGateway) -> CatalogService {
    CatalogService::new(
        Arc::new(fake.clone()),
        context(),
        DiseaseIndex::builtin().unwrap(),
        50,
    )
}

fn shop() -> FakeGateway {
    FakeGateway::with_products(vec![
        product("p_regent", "Regent 800WG", "Fipronil", 45_000),
        product("p_chess", "Chess 50WG", "Pymetrozine", 62_000),
        product("p_amistar", "Amistar Top 325SC", "Azoxystrobin", 150_000),
        product("p_validan", "Validan 5SL", "Validamycin", 28_000),
    ])
}

fn ids(results: &agro_pos::SearchResults) -> Vec<&str> {
    results
        .products
        .iter()
        .map(|p| p.product.id.as_str())
        .collect()
}

#[tokio::test]
async fn disease_query_puts_remedies_first() {
    let fake = shop();
    let results = catalog(&fake).search(&SearchQuery::text("vàng lá")).await.unwrap();

    let diseases: Vec<&str> = results.diseases.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(diseases, vec!["vang-la-chin-som"]);
    assert_eq!(ids(&results), vec!["p_amistar", "p_regent", "p_chess", "p_validan"]);
    assert!(results.products[0].recommended);
    assert!(results.products[1..].iter().all(|p| !p.recommended));
}

#[tokio::test]
async fn disease_query_ignores_case_and_diacritics() {
    let fake = shop();
    let results = catalog(&fake).search(&SearchQuery::text("VANG LA")).await.unwrap();

    assert_eq!(results.diseases.len(), 1);
    assert_eq!(ids(&results)[0], "p_amistar");
}

#[tokio::test]
async fn plain_product_query_has_no_diseases() {
    let fake = shop();
    let results = catalog(&fake).search(&SearchQuery::text("chess")).await.unwrap();

    assert!(results.diseases.is_empty());
    assert_eq!(ids(&results), vec!["p_chess"]);
    assert!(!results.products[0].recommended);
    assert_eq!(fake.count("search_products"), 1);
}

#[tokio::test]
async fn empty_query_lists_catalog_unranked() {
    let fake = shop();
    let results = catalog(&fake).search(&SearchQuery::text("  ")).await.unwrap();

    assert!(results.diseases.is_empty());
    assert_eq!(results.products.len(), 4);
    assert!(results.products.iter().all(|p| !p.recommended));
}

#[tokio::test]
async fn overlong_query_is_rejected() {
    let fake = shop();
    let query = SearchQuery::text("x".repeat(101));
    assert!(catalog(&fake).search(&query).await.is_err());
    assert_eq!(fake.count("search_products"), 0);
}

#[tokio::test]
async fn product_detail_lists_treated_diseases() {
    let fake = shop();
    let detail = catalog(&fake).product_detail("p_amistar").await.unwrap();

    let treats: Vec<&str> = detail.treats.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(treats, vec!["dao-on-la", "vang-la-chin-som"]);
}

#[tokio::test]
async fn line_for_prices_in_context_currency() {
    let fake = shop();
    let service = catalog(&fake);
    let amistar = product("p_amistar", "Amistar Top 325SC", "Azoxystrobin", 150_000);

    let line = service.line_for(&amistar, None, 2).await.unwrap();
    assert_eq!(line.unit_price.minor(), 150_000);
    assert_eq!(line.quantity, 2);
    assert_eq!(line.variant_label, "1L");

    assert!(service.line_for(&amistar, Some("missing"), 1).await.is_err());
    assert!(service.line_for(&amistar, None, 0).await.is_err());
}

#[tokio::test]
async fn disease_detail_by_id() {
    let fake = shop();
    let service = catalog(&fake);

    let record = service.disease_detail("ray-nau").unwrap();
    assert_eq!(record.name, "Rầy nâu");
    assert!(service.disease_detail("unknown").is_none());
}

#[tokio::test]
async fn customer_lookup_by_phone() {
    let fake = shop();
    fake.seed_customer(CustomerRecord {
        id: "cus_1".to_string(),
        first_name: Some("Ba".to_string()),
        last_name: Some("Nguyễn Văn".to_string()),
        phone: Some("0909123456".to_string()),
        email: None,
    });
    let service = catalog(&fake);

    let found = service.search_customers(Some("0909")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].to_customer().name, "Nguyễn Văn Ba");

    assert!(service.search_customers(Some("0123")).await.unwrap().is_empty());
}
