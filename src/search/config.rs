//! Search configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use strum::{Display, EnumString};
use validator::Validate;

/// Search engine backing the index client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineKind {
    /// In-process tantivy index
    #[default]
    Embedded,
    /// Remote Elasticsearch cluster over HTTP
    Elasticsearch,
}

/// Relevance weight of each clause in the phrase query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boosts {
    pub code: f32,
    pub name: f32,
    pub name_partial: f32,
    pub name_metaphone: f32,
    pub description: f32,
    pub category_name: f32,
    pub tree_node_name: f32,
}

impl Default for Boosts {
    fn default() -> Self {
        Self {
            code: 1.5,
            name: 2.0,
            name_partial: 1.0,
            name_metaphone: 0.5,
            description: 0.5,
            category_name: 1.0,
            tree_node_name: 1.0,
        }
    }
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    #[serde(default)]
    pub engine: EngineKind,

    /// Path to the embedded index directory; in-memory when absent
    pub index_path: Option<PathBuf>,

    /// Index writer heap size in bytes (default: 50MB)
    #[validate(range(min = 15000000))]
    pub writer_heap_size: usize,

    /// Base URL of the Elasticsearch cluster
    pub elasticsearch_url: String,

    /// Prefix of the physical index names (`{index_name}_{doc_type}`)
    #[validate(length(min = 1))]
    pub index_name: String,

    /// Timeout for every engine call (seconds)
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Storefront page size
    #[validate(range(min = 1))]
    pub per_page: usize,

    /// Maximum autocomplete suggestions
    #[validate(range(min = 1))]
    pub autocomplete_limit: usize,

    /// List products from the catalog when a search finds nothing
    pub fallback_to_catalog: bool,

    /// Prefix joined with a product uri to build storefront links
    pub product_url_prefix: String,

    #[serde(default)]
    pub boosts: Boosts,
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Embedded,
            index_path: None,
            writer_heap_size: 50_000_000, // 50MB
            elasticsearch_url: "http://localhost:9200".to_string(),
            index_name: "webshop".to_string(),
            timeout_secs: 5,
            per_page: 10,
            autocomplete_limit: 10,
            fallback_to_catalog: true,
            product_url_prefix: "/product/".to_string(),
            boosts: Boosts::default(),
        }
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn index_path(mut self, path: PathBuf) -> Self {
        self.config.index_path = Some(path);
        self
    }

    pub fn writer_heap_size(mut self, size: usize) -> Self {
        self.config.writer_heap_size = size;
        self
    }

    pub fn elasticsearch_url(mut self, url: impl Into<String>) -> Self {
        self.config.elasticsearch_url = url.into();
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.config.per_page = per_page;
        self
    }

    pub fn autocomplete_limit(mut self, limit: usize) -> Self {
        self.config.autocomplete_limit = limit;
        self
    }

    pub fn fallback_to_catalog(mut self, enabled: bool) -> Self {
        self.config.fallback_to_catalog = enabled;
        self
    }

    pub fn product_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.product_url_prefix = prefix.into();
        self
    }

    pub fn boosts(mut self, boosts: Boosts) -> Self {
        self.config.boosts = boosts;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
