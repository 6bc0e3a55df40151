//! Lazily executed, windowed search results

use crate::catalog::CatalogSource;
use crate::error::Result;
use crate::models::Product;
use crate::search::client::{FacetResult, IndexClient, SearchHits};
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::Query;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Loads primary-store records by id, keeping the order of `ids`
#[async_trait]
pub trait RecordBrowser: Send + Sync {
    type Record: Send;

    async fn browse(&self, ids: &[i64]) -> Result<Vec<Self::Record>>;
}

#[async_trait]
impl<C: CatalogSource + ?Sized> RecordBrowser for C {
    type Record = Product;

    async fn browse(&self, ids: &[i64]) -> Result<Vec<Product>> {
        self.products(ids).await
    }
}

/// One page of a query's results.
///
/// The query runs at most once per instance, on first access to any of the
/// count, page or facet accessors; the result is kept for the life of the
/// value.
pub struct SearchPagination {
    client: Arc<dyn IndexClient>,
    doc_type: String,
    query: Query,
    page: usize,
    per_page: usize,
    result: OnceCell<SearchHits>,
}

impl SearchPagination {
    pub fn new(
        client: Arc<dyn IndexClient>,
        doc_type: impl Into<String>,
        query: Query,
        page: usize,
        per_page: usize,
    ) -> SearchResult<Self> {
        if page == 0 {
            return Err(SearchError::InvalidQuery("page must be at least 1".to_string()));
        }
        if per_page == 0 {
            return Err(SearchError::InvalidQuery("per_page must be at least 1".to_string()));
        }

        Ok(Self {
            client,
            doc_type: doc_type.into(),
            query,
            page,
            per_page,
            result: OnceCell::new(),
        })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Records before this page; saturates for pages past any real result
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Executed result of the current page window
    pub async fn result_set(&self) -> SearchResult<&SearchHits> {
        self.result
            .get_or_try_init(|| async {
                let started = std::time::Instant::now();
                let hits = self
                    .client
                    .search(&self.doc_type, &self.query, self.offset(), Some(self.per_page))
                    .await?;
                crate::metrics::QUERY_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
                tracing::debug!(
                    doc_type = %self.doc_type,
                    page = self.page,
                    total = hits.total,
                    took_ms = started.elapsed().as_millis() as u64,
                    "Executed search page"
                );
                Ok(hits)
            })
            .await
    }

    /// Total number of matching records
    pub async fn count(&self) -> SearchResult<u64> {
        Ok(self.result_set().await?.total)
    }

    pub async fn pages(&self) -> SearchResult<usize> {
        let count = self.count().await? as usize;
        Ok(count.div_ceil(self.per_page))
    }

    /// 1-based position of the first record on this page, 0 when it is empty
    pub async fn begin_count(&self) -> SearchResult<usize> {
        let count = self.count().await? as usize;
        Ok(if self.offset() < count { self.offset() + 1 } else { 0 })
    }

    /// 1-based position of the last record on this page, 0 when it is empty
    pub async fn end_count(&self) -> SearchResult<usize> {
        let count = self.count().await? as usize;
        if self.offset() >= count {
            return Ok(0);
        }
        Ok(self.offset().saturating_add(self.per_page).min(count))
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub async fn has_next(&self) -> SearchResult<bool> {
        Ok(self.page < self.pages().await?)
    }

    pub fn prev_page(&self) -> Option<usize> {
        self.has_prev().then(|| self.page - 1)
    }

    pub async fn next_page(&self) -> SearchResult<Option<usize>> {
        Ok(self.has_next().await?.then(|| self.page + 1))
    }

    /// Facets of the whole result, from the same execution as the page
    pub async fn facets(&self) -> SearchResult<&[FacetResult]> {
        Ok(&self.result_set().await?.facets)
    }

    /// Ids on this page in relevance order
    pub async fn item_ids(&self) -> SearchResult<Vec<i64>> {
        Ok(self.result_set().await?.ids())
    }

    /// Records on this page in relevance order
    pub async fn items<B: RecordBrowser + ?Sized>(&self, browser: &B) -> Result<Vec<B::Record>> {
        let ids = self.item_ids().await?;
        browser.browse(&ids).await
    }

    /// Every matching record, unwindowed.
    ///
    /// Runs a fresh unbounded query on each call and is not meant for
    /// regular browsing.
    pub async fn all_items<B: RecordBrowser + ?Sized>(&self, browser: &B) -> Result<Vec<B::Record>> {
        let hits = self
            .client
            .search(&self.doc_type, &self.query, 0, None)
            .await?;
        browser.browse(&hits.ids()).await
    }
}
