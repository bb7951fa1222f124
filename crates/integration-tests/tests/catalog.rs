//! Integration tests for the product catalog over HTTP.

use rust_decimal::Decimal;
use store_hub_core::{NewProduct, ProductFilter, ProductId};
use store_hub_integration_tests::FakeBackend;

fn hat() -> NewProduct {
    NewProduct {
        title: "Sun Hat".to_string(),
        price: Decimal::new(1999, 2),
        description: "Wide brim".to_string(),
        category: "women's clothing".to_string(),
        image: "https://fakestoreapi.com/img/hat.jpg".to_string(),
    }
}

#[tokio::test]
async fn test_load_products_decodes_catalog() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    let products = storefront.catalog().load_products().await;

    assert_eq!(products.len(), 4);
    assert_eq!(products[0].title, "Backpack");
    assert_eq!(products[0].price, Decimal::new(10995, 2));
    assert_eq!(storefront.catalog().error(), None);
}

#[tokio::test]
async fn test_second_load_is_served_from_cache() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    storefront.catalog().load_products().await;
    storefront.catalog().load_products().await;
    assert_eq!(backend.count("GET", "/products"), 1);

    storefront.catalog().refresh_products().await;
    assert_eq!(backend.count("GET", "/products"), 2);
}

#[tokio::test]
async fn test_mutation_invalidates_cache() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    let catalog = storefront.catalog();
    catalog.load_products().await;

    let created = catalog.add_product(&hat()).await.unwrap();
    assert_eq!(backend.count("POST", "/products"), 1);

    let reloaded = catalog.load_products().await;
    assert_eq!(backend.count("GET", "/products"), 2);
    assert!(reloaded.iter().any(|p| p.id == created.id));
}

#[tokio::test]
async fn test_update_and_delete() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    let catalog = storefront.catalog();
    catalog.load_products().await;

    let updated = catalog
        .update_product(ProductId::new(7), &hat())
        .await
        .unwrap();
    assert_eq!(updated.id, ProductId::new(7));
    assert_eq!(updated.title, "Sun Hat");
    assert!(catalog.products().iter().any(|p| p.title == "Sun Hat"));

    assert!(catalog.delete_product(ProductId::new(7)).await);
    assert!(catalog.products().iter().all(|p| p.id != ProductId::new(7)));

    assert!(!catalog.delete_product(ProductId::new(7)).await);
    assert_eq!(catalog.error().as_deref(), Some("failed to delete product"));
}

#[tokio::test]
async fn test_failing_backend_yields_empty_list_and_error() {
    let backend = FakeBackend::start().await;
    backend.set_failing(true);
    let storefront = backend.storefront();

    let products = storefront.catalog().load_products().await;

    assert!(products.is_empty());
    assert!(storefront.catalog().products().is_empty());
    assert_eq!(
        storefront.catalog().error().as_deref(),
        Some("failed to load products")
    );
    assert!(!storefront.catalog().is_loading());
}

#[tokio::test]
async fn test_filters_over_loaded_catalog() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    storefront.catalog().load_products().await;

    let by_category = storefront.catalog().apply_filters(&ProductFilter {
        category: Some("JEWELERY".to_string()),
        ..ProductFilter::default()
    });
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].id, ProductId::new(7));

    let by_rating = storefront.catalog().apply_filters(&ProductFilter {
        min_rating: Some(4.1),
        ..ProductFilter::default()
    });
    let ids: Vec<i32> = by_rating.iter().map(|p| p.id.as_i32()).collect();
    assert_eq!(ids, [2, 3]);

    let by_text = storefront.catalog().apply_filters(&ProductFilter {
        text_search: Some("everyday".to_string()),
        min_rating: Some(4.5),
        ..ProductFilter::default()
    });
    assert_eq!(by_text.len(), 1);
    assert_eq!(by_text[0].title, "Cotton Jacket");
}
