//! Product search: documents, queries, engines and the storefront service
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           ProductSearchService                   │
//! │  - quick_search()   - autocomplete()            │
//! └─────────────────────────────────────────────────┘
//!          │ QueryBuilder            │ SearchPagination
//!          ▼                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │           IndexClient                            │
//! │  - bulk_index()  - delete_documents()           │
//! │  - update_settings()  - update_mapping()        │
//! │  - search()  - refresh()                        │
//! └─────────────────────────────────────────────────┘
//!          │                         │
//!          ▼                         ▼
//!   EmbeddedIndex (tantivy)   ElasticsearchClient (HTTP)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webshop_search::catalog::InMemoryCatalog;
//! use webshop_search::search::{create_index_client, ProductSearchService, SearchConfig, SearchParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default();
//!     let client = create_index_client(&config).await?;
//!     let catalog = Arc::new(InMemoryCatalog::new());
//!     let service = ProductSearchService::new(client, catalog, config);
//!
//!     let params = SearchParams::from_query_pairs([("q", "shirt"), ("color", "blue")]);
//!     let outcome = service.quick_search(&params).await?;
//!     if let Some(page) = outcome.page() {
//!         println!("{} of {} products", page.items.len(), page.count);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
mod client;
mod config;
mod document;
mod elastic;
mod error;
mod index;
pub mod mapping;
mod pagination;
mod query;
mod service;

/// Document type, and backlog entity type, of products
pub const PRODUCT_DOC_TYPE: &str = "product";

pub use client::{
    create_index_client, with_timeout, BulkOutcome, FacetBucket, FacetResult, IndexClient, SearchHit,
    SearchHits,
};
pub use config::{Boosts, EngineKind, SearchConfig, SearchConfigBuilder};
pub use document::{
    CatalogDocumentSource, CategoryDoc, DocumentSource, IndexDocument, PriceListPrice, ProductDocument,
    SerializeError, TreeNodeDoc,
};
pub use elastic::{parse_search_response, ElasticsearchClient};
pub use error::{SearchError, SearchResult};
pub use index::EmbeddedIndex;
pub use mapping::{index_settings, product_mapping, validate_mapping};
pub use pagination::{RecordBrowser, SearchPagination};
pub use query::{
    attribute_filter, phrase_clauses, plan_facets, BoolQuery, Clause, FacetRequest, Query, QueryBuilder,
    ALL_TERMS_SIZE, GATE_FIELDS,
};
pub use service::{AutocompleteItem, ProductSearchService, QuickSearchOutcome, SearchPage, SearchParams};
