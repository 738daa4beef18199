//! Cached remote reads against the fake API.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::{Method, StatusCode};

use tshop_core::{CategoryId, ProductId};
use tshop_integration_tests::FakeApi;
use tshop_storefront::forms::ReviewForm;
use tshop_storefront::notify::{self, NotificationLevel};
use tshop_storefront::query::{QueryKey, ViewScope};

#[tokio::test]
async fn test_concurrent_reads_share_one_request() {
    let api = FakeApi::start().await.unwrap();
    api.state().set_latency(Duration::from_millis(100));
    let (storefront, _rx) = api.guest().unwrap();
    let queries = storefront.queries();

    let (a, b, c) = tokio::join!(queries.products(), queries.products(), queries.products());
    assert_eq!(a.unwrap().len(), 3);
    assert_eq!(b.unwrap().len(), 3);
    assert_eq!(c.unwrap().len(), 3);
    assert_eq!(api.state().hits(&Method::GET, "products"), 1);
}

#[tokio::test]
async fn test_categories_are_cached_and_filtered() {
    let api = FakeApi::start().await.unwrap();
    let (storefront, _rx) = api.guest().unwrap();

    let first = storefront.queries().categories().await.unwrap();
    let names: Vec<&str> = first.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Kitchen", "Empty"]);

    storefront.queries().categories().await.unwrap();
    assert_eq!(api.state().hits(&Method::GET, "categories"), 1);
}

#[tokio::test]
async fn test_product_list_is_refetched_every_read() {
    let api = FakeApi::start().await.unwrap();
    let (storefront, _rx) = api.guest().unwrap();

    storefront.queries().products().await.unwrap();
    storefront.queries().products().await.unwrap();
    assert_eq!(api.state().hits(&Method::GET, "products"), 2);
}

#[tokio::test]
async fn test_missing_category_products_read_as_empty() {
    let api = FakeApi::start().await.unwrap();
    let (storefront, mut rx) = api.guest().unwrap();

    let products = storefront
        .queries()
        .category_products(CategoryId::new(3))
        .await
        .unwrap();
    assert!(products.is_empty());
    assert!(notify::drain(&mut rx).is_empty());

    let kitchen = storefront
        .queries()
        .category_products(CategoryId::new(1))
        .await
        .unwrap();
    assert_eq!(kitchen.len(), 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried_quietly() {
    let api = FakeApi::start().await.unwrap();
    api.state().fail_next(
        "products",
        [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::BAD_GATEWAY],
    );
    let (storefront, mut rx) = api.guest().unwrap();

    let products = storefront.queries().products().await.unwrap();
    assert_eq!(products.len(), 3);
    assert_eq!(api.state().hits(&Method::GET, "products"), 3);
    assert!(notify::drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_exhausted_retries_notify_once() {
    let api = FakeApi::start().await.unwrap();
    api.state()
        .fail_next("categories", [StatusCode::SERVICE_UNAVAILABLE; 4]);
    let (storefront, mut rx) = api.guest().unwrap();

    let err = storefront.queries().categories().await.unwrap_err();
    assert_eq!(
        err.api_error().unwrap().status(),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );
    // One attempt plus three retries
    assert_eq!(api.state().hits(&Method::GET, "categories"), 4);

    let shown = notify::drain(&mut rx);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown.first().unwrap().level, NotificationLevel::Error);
    assert_eq!(shown.first().unwrap().message, "Scripted failure 503");

    // Failures are not cached
    let categories = storefront.queries().categories().await.unwrap();
    assert_eq!(categories.len(), 2);
}

#[tokio::test]
async fn test_category_products_are_never_retried() {
    let api = FakeApi::start().await.unwrap();
    api.state()
        .fail_next("categories/1/products", [StatusCode::INTERNAL_SERVER_ERROR]);
    let (storefront, _rx) = api.guest().unwrap();

    storefront
        .queries()
        .category_products(CategoryId::new(1))
        .await
        .unwrap_err();
    assert_eq!(api.state().hits(&Method::GET, "categories/1/products"), 1);
}

#[tokio::test]
async fn test_review_refreshes_product() {
    let api = FakeApi::start().await.unwrap();
    let (storefront, _rx) = api.customer().unwrap();
    let id = ProductId::new(1);

    let before = storefront.queries().product(id).await.unwrap();
    assert!(before.reviews.is_empty());
    storefront.queries().product(id).await.unwrap();
    assert_eq!(api.state().hits(&Method::GET, "products/1"), 1);

    let form = ReviewForm {
        rate: 4,
        comment: "Solid".to_string(),
    };
    storefront.submit_review(id, &form).await.unwrap();

    let after = storefront.queries().product(id).await.unwrap();
    assert_eq!(api.state().hits(&Method::GET, "products/1"), 2);
    assert_eq!(after.reviews.len(), 1);
    assert_eq!(after.reviews.first().unwrap().comment.as_deref(), Some("Solid"));
}

#[tokio::test]
async fn test_closed_view_discards_result() {
    let api = FakeApi::start().await.unwrap();
    api.state().set_latency(Duration::from_millis(200));
    let (storefront, _rx) = api.guest().unwrap();

    let scope = ViewScope::new();
    let closer = scope.clone();
    let (result, ()) = tokio::join!(
        storefront.queries().fetch_scoped(&scope, QueryKey::Products),
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        }
    );
    assert!(result.is_none());
}

#[tokio::test]
async fn test_cart_invalidated_mid_read_is_fetched_again() {
    let api = FakeApi::start().await.unwrap();
    api.state().set_latency(Duration::from_millis(100));
    let (storefront, _rx) = api.customer().unwrap();
    let queries = storefront.queries();

    let (cart, ()) = tokio::join!(queries.cart(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        queries.invalidate(QueryKey::Cart).await;
    });
    cart.unwrap();
    assert_eq!(api.state().hits(&Method::GET, "Carts"), 2);

    queries.cart().await.unwrap();
    assert_eq!(api.state().hits(&Method::GET, "Carts"), 2);
}
