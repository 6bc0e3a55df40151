use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use webshop_search::backlog::{create_in_memory_backlog, BacklogHook};
use webshop_search::catalog::InMemoryCatalog;
use webshop_search::models::{FilterableAttribute, Product, Template, Uom};
use webshop_search::search::{
    index_settings, product_mapping, CatalogDocumentSource, EmbeddedIndex, IndexClient, ProductSearchService,
    QuickSearchOutcome, SearchConfig, SearchPage, SearchParams, PRODUCT_DOC_TYPE,
};
use webshop_search::sync::BatchSynchronizer;

/// Storefront search over an embedded index kept in sync with a catalog
struct Storefront {
    catalog: Arc<InMemoryCatalog>,
    synchronizer: BatchSynchronizer,
    search: ProductSearchService,
}

impl Storefront {
    async fn new(config: SearchConfig) -> Self {
        let backlog = create_in_memory_backlog();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.subscribe(Arc::new(BacklogHook::new(backlog.clone())));

        let index = Arc::new(EmbeddedIndex::in_memory(&config).unwrap());
        index.update_settings(PRODUCT_DOC_TYPE, &index_settings()).await.unwrap();
        index.update_mapping(PRODUCT_DOC_TYPE, &product_mapping()).await.unwrap();

        let synchronizer = BatchSynchronizer::new(
            backlog,
            Arc::new(CatalogDocumentSource::new(catalog.clone())),
            index.clone(),
            100,
        );
        let search = ProductSearchService::new(index, catalog.clone(), config);

        Self {
            catalog,
            synchronizer,
            search,
        }
    }

    async fn with_products(products: Vec<Product>) -> Self {
        let storefront = Self::new(SearchConfig::default()).await;
        storefront.catalog.create_products(products).await.unwrap();
        storefront.synchronizer.run().await.unwrap();
        storefront
    }

    async fn found(&self, params: SearchParams) -> SearchPage {
        match self.search.quick_search(&params).await.unwrap() {
            QuickSearchOutcome::Found(page) => page,
            other => panic!("expected results for {:?}, got {:?}", params, other),
        }
    }
}

fn product(id: i64, name: &str) -> Product {
    let template = Template::new(id, name, Decimal::from(10)).with_uom(Uom::new(1, "Unit", "u"));
    Product::new(id, template)
}

fn ids(page: &SearchPage) -> Vec<i64> {
    page.items.iter().map(|product| product.id).collect()
}

#[tokio::test]
async fn test_paginated_search_over_many_products() {
    let products = (1..=100)
        .map(|id| product(id, &format!("GreatProduct {}", id)))
        .collect();
    let storefront = Storefront::with_products(products).await;

    let first = storefront.found(SearchParams::new("GreatProduct")).await;
    assert_eq!(first.count, 100);
    assert_eq!(first.pages, 10);
    assert_eq!(first.items.len(), 10);
    assert_eq!((first.begin_count, first.end_count), (1, 10));
    assert_eq!(first.prev_page, None);
    assert_eq!(first.next_page, Some(2));

    let last = storefront
        .found(SearchParams::new("GreatProduct").with_page(10))
        .await;
    assert_eq!((last.begin_count, last.end_count), (91, 100));
    assert_eq!(last.prev_page, Some(9));
    assert_eq!(last.next_page, None);
}

#[tokio::test]
async fn test_pages_partition_the_result() {
    let products = (1..=37)
        .map(|id| product(id, &format!("Lantern {}", id)))
        .collect();
    let storefront = Storefront::with_products(products).await;

    let mut seen = HashSet::new();
    for page in 1..=4 {
        let result = storefront
            .found(SearchParams::new("lantern").with_page(page))
            .await;
        assert_eq!(result.count, 37);
        for id in ids(&result) {
            assert!(seen.insert(id), "product {} on more than one page", id);
        }
    }
    assert_eq!(seen, (1..=37).collect::<HashSet<_>>());

    // Past the last page: empty window, same count
    let beyond = storefront
        .found(SearchParams::new("lantern").with_page(5))
        .await;
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.begin_count, 0);
}

#[tokio::test]
async fn test_non_ascii_names_are_searchable() {
    let storefront = Storefront::with_products(vec![
        product(1, "Prøduçt 1 ünîçø∂e"),
        product(2, "Plain product"),
    ])
    .await;

    let page = storefront.found(SearchParams::new("Prøduçt 1 ünîçø∂e")).await;
    assert_eq!(ids(&page)[0], 1);

    let page = storefront.found(SearchParams::new("ünîçø")).await;
    assert_eq!(ids(&page), vec![1]);
}

#[tokio::test]
async fn test_hidden_products_are_excluded() {
    let storefront = Storefront::with_products(vec![
        product(1, "Garden Hose"),
        product(2, "Garden Hose Pro").with_active(false),
        product(3, "Garden Hose Max").with_displayed_on_eshop(false),
    ])
    .await;

    let page = storefront.found(SearchParams::new("garden hose")).await;
    assert_eq!(page.count, 1);
    assert_eq!(ids(&page), vec![1]);
}

#[tokio::test]
async fn test_empty_phrase_lists_every_visible_product() {
    let storefront = Storefront::with_products(vec![
        product(1, "Mug"),
        product(2, "Plate"),
        product(3, "Bowl").with_active(false),
    ])
    .await;

    let page = storefront.found(SearchParams::new("")).await;
    assert_eq!(page.count, 2);
}

#[tokio::test]
async fn test_attribute_filters_and_facets() {
    let storefront = Storefront::with_products(vec![
        product(1, "Shirt A").with_attribute("color", "blue").with_attribute("size", "xl"),
        product(2, "Shirt B").with_attribute("color", "black").with_attribute("size", "xl"),
        product(3, "Shirt C").with_attribute("color", "red").with_attribute("size", "xl"),
        product(4, "Shirt D").with_attribute("color", "blue").with_attribute("size", "m"),
        product(5, "Shirt E").with_attribute("color", "blue"),
    ])
    .await;
    storefront
        .catalog
        .set_filterable_attributes(vec![
            FilterableAttribute::new("color").multiselect(true),
            FilterableAttribute::new("size").display_count(false),
        ])
        .unwrap();

    // Facets describe the whole unfiltered result
    let all = storefront.found(SearchParams::new("shirt")).await;
    assert_eq!(all.count, 5);
    let color = all.facets.iter().find(|f| f.name == "color").unwrap();
    assert_eq!(color.buckets[0].value, "blue");
    assert_eq!(color.buckets[0].count, 3);
    let size = all.facets.iter().find(|f| f.name == "size").unwrap();
    assert_eq!(size.buckets[0].value, "xl");
    assert_eq!(size.buckets[0].count, 3);
    assert!(color.display_count);
    assert!(!size.display_count);

    // OR within a key, AND across keys
    let params = SearchParams::from_query_pairs([
        ("q", "shirt"),
        ("color", "blue"),
        ("color", "black"),
        ("size", "xl"),
    ]);
    let mut filtered = ids(&storefront.found(params).await);
    filtered.sort_unstable();
    assert_eq!(filtered, vec![1, 2]);

    // Keys that are not filterable attributes are ignored
    let params = SearchParams::new("shirt").with_filter("utm_source", "newsletter");
    assert_eq!(storefront.found(params).await.count, 5);
}

#[tokio::test]
async fn test_autocomplete_suggests_names_and_links() {
    let storefront = Storefront::with_products(vec![
        product(1, "Coffee Grinder").with_uri("coffee-grinder"),
        product(2, "Coffee Beans"),
        product(3, "Tea Pot"),
    ])
    .await;
    storefront
        .catalog
        .set_filterable_attributes(vec![FilterableAttribute::new("color")])
        .unwrap();

    let mut items = storefront.search.autocomplete("coffee", None).await.unwrap();
    items.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].display_name, "Coffee Beans");
    assert_eq!(items[0].url, "/product/2");
    assert_eq!(items[1].url, "/product/coffee-grinder");

    let limited = storefront.search.autocomplete("coffee", Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_no_results_falls_back_to_catalog_listing() {
    let storefront = Storefront::with_products(vec![
        product(1, "Umbrella"),
        product(2, "Raincoat"),
        product(3, "Boots").with_active(false),
    ])
    .await;

    match storefront
        .search
        .quick_search(&SearchParams::new("spaceship"))
        .await
        .unwrap()
    {
        QuickSearchOutcome::NoResults { fallback: Some(listing) } => {
            assert_eq!(listing.count, 2);
            assert_eq!(listing.items.len(), 2);
        }
        other => panic!("expected a fallback listing, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_results_without_fallback() {
    let config = SearchConfig {
        fallback_to_catalog: false,
        ..Default::default()
    };
    let storefront = Storefront::new(config).await;
    storefront.catalog.create_product(product(1, "Umbrella")).await.unwrap();
    storefront.synchronizer.run().await.unwrap();

    let outcome = storefront
        .search
        .quick_search(&SearchParams::new("spaceship"))
        .await
        .unwrap();
    assert!(matches!(outcome, QuickSearchOutcome::NoResults { fallback: None }));
}

#[tokio::test]
async fn test_changes_are_searchable_after_sync() {
    let storefront = Storefront::with_products(vec![product(1, "Desk")]).await;

    storefront.catalog.create_product(product(2, "Standing Desk")).await.unwrap();
    assert_eq!(storefront.found(SearchParams::new("desk")).await.count, 1);

    storefront.synchronizer.run().await.unwrap();
    assert_eq!(storefront.found(SearchParams::new("desk")).await.count, 2);
}

#[tokio::test]
async fn test_huge_page_number_is_an_empty_page() {
    let storefront = Storefront::with_products(vec![
        product(1, "Lantern One"),
        product(2, "Lantern Two"),
        product(3, "Lantern Three"),
    ])
    .await;
    let huge = usize::MAX.to_string();

    let page = storefront
        .found(SearchParams::from_query_pairs([("q", "lantern"), ("page", huge.as_str())]))
        .await;
    assert_eq!(page.count, 3);
    assert_eq!(page.page, usize::MAX);
    assert_eq!(page.pages, 1);
    assert!(page.items.is_empty());
    assert_eq!((page.begin_count, page.end_count), (0, 0));
    assert_eq!(page.next_page, None);

    match storefront
        .search
        .quick_search(&SearchParams::from_query_pairs([("q", "spaceship"), ("page", huge.as_str())]))
        .await
        .unwrap()
    {
        QuickSearchOutcome::NoResults { fallback: Some(listing) } => {
            assert_eq!(listing.count, 3);
            assert!(listing.items.is_empty());
        }
        other => panic!("expected an empty fallback listing, got {:?}", other),
    }
}
