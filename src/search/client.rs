//! Index client boundary shared by every search engine implementation

use crate::search::config::{EngineKind, SearchConfig};
use crate::search::document::IndexDocument;
use crate::search::elastic::ElasticsearchClient;
use crate::search::error::{SearchError, SearchResult};
use crate::search::index::EmbeddedIndex;
use crate::search::query::Query;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a bulk write, per document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

impl BulkOutcome {
    pub fn all_succeeded(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            succeeded: ids.into_iter().collect(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    pub name: String,
    pub buckets: Vec<FacetBucket>,
    /// Render per-value counts next to each bucket
    pub display_count: bool,
}

/// Hits of one window of a query, with the total and facets of the whole result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<SearchHit>,
    pub facets: Vec<FacetResult>,
}

impl SearchHits {
    pub fn ids(&self) -> Vec<i64> {
        self.hits.iter().map(|hit| hit.id).collect()
    }
}

/// Narrow contract the synchronizer and storefront use to talk to an engine.
///
/// Every call is bounded by the client's timeout and fails with
/// `SearchError::Timeout` once it runs out.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Upsert documents of one type by id
    async fn bulk_index(&self, doc_type: &str, documents: &[IndexDocument]) -> SearchResult<BulkOutcome>;

    /// Remove documents of one type by id; already absent ids count as removed
    async fn delete_documents(&self, doc_type: &str, ids: &[i64]) -> SearchResult<BulkOutcome>;

    /// Declare analysis settings of the index holding `doc_type`
    async fn update_settings(&self, doc_type: &str, settings: &Value) -> SearchResult<()>;

    /// Declare the field mapping of `doc_type`
    async fn update_mapping(&self, doc_type: &str, mapping: &Value) -> SearchResult<()>;

    /// Run `query`, returning `size` hits from `offset`, or every hit when `size` is `None`
    async fn search(
        &self,
        doc_type: &str,
        query: &Query,
        offset: usize,
        size: Option<usize>,
    ) -> SearchResult<SearchHits>;

    /// Make everything indexed so far visible to searches
    async fn refresh(&self, doc_type: &str) -> SearchResult<()>;
}

/// Run `future`, failing with `SearchError::Timeout` after `timeout`
pub async fn with_timeout<T, F>(timeout: Duration, future: F) -> SearchResult<T>
where
    F: Future<Output = SearchResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout(timeout.as_secs())),
    }
}

/// Create the index client selected by configuration
pub async fn create_index_client(config: &SearchConfig) -> SearchResult<Arc<dyn IndexClient>> {
    match config.engine {
        EngineKind::Embedded => {
            tracing::info!(path = ?config.index_path, "Initializing embedded search engine");
            let index = match &config.index_path {
                Some(path) => EmbeddedIndex::open(path, config).await?,
                None => EmbeddedIndex::in_memory(config)?,
            };
            Ok(Arc::new(index))
        }

        EngineKind::Elasticsearch => {
            tracing::info!(url = %config.elasticsearch_url, "Initializing Elasticsearch engine");
            Ok(Arc::new(ElasticsearchClient::new(config)?))
        }
    }
}
