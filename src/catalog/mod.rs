//! Primary-store collaborator.
//!
//! The search side only reads the catalog through [`CatalogSource`]. Writes
//! go through the store itself, which notifies its mutation listeners so the
//! affected products land in the index backlog.

mod memory;

pub use memory::InMemoryCatalog;

use crate::error::Result;
use crate::models::{FilterableAttribute, PriceList, Product};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Plain primary-store listing, used when the search engine finds nothing
#[derive(Debug, Clone, Serialize)]
pub struct CatalogListing {
    pub items: Vec<Product>,
    pub count: u64,
    pub page: usize,
    pub per_page: usize,
}

impl CatalogListing {
    pub fn pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        (self.count as usize).div_ceil(self.per_page)
    }
}

/// Catalog contents as exchanged in JSON files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(default)]
    pub price_lists: Vec<PriceList>,

    #[serde(default)]
    pub attributes: Vec<FilterableAttribute>,
}

impl CatalogSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read access to the primary store
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn product(&self, id: i64) -> Result<Option<Product>>;

    /// Products for `ids` in the same order; unknown ids are skipped
    async fn products(&self, ids: &[i64]) -> Result<Vec<Product>>;

    /// Every price list a document is priced under
    async fn price_lists(&self) -> Result<Vec<PriceList>>;

    /// Attributes administrators configured for filtering and faceting
    async fn filterable_attributes(&self) -> Result<Vec<FilterableAttribute>>;

    /// One page of web-visible products
    async fn listing(&self, page: usize, per_page: usize) -> Result<CatalogListing>;
}
