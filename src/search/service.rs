//! Storefront search service

use crate::catalog::{CatalogListing, CatalogSource};
use crate::error::Result;
use crate::models::Product;
use crate::search::client::{FacetResult, IndexClient};
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::pagination::SearchPagination;
use crate::search::query::QueryBuilder;
use crate::search::PRODUCT_DOC_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Search request parameters as received from the storefront
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Search phrase
    pub q: String,

    /// 1-based page number
    pub page: usize,

    /// Every other key, values in request order; candidate attribute filters
    pub filters: BTreeMap<String, Vec<String>>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            q: String::new(),
            page: 1,
            filters: BTreeMap::new(),
        }
    }
}

impl SearchParams {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Parse decoded query-string pairs.
    ///
    /// A missing, unparsable or zero `page` becomes 1. Pairs with an empty
    /// value are dropped.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "q" => params.q = value.to_string(),
                "page" => params.page = value.trim().parse::<usize>().unwrap_or(1).max(1),
                _ if value.is_empty() => {}
                _ => params
                    .filters
                    .entry(key.to_string())
                    .or_default()
                    .push(value.to_string()),
            }
        }
        params
    }
}

/// One page of search results ready for rendering
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub phrase: String,
    pub items: Vec<Product>,
    pub count: u64,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
    pub begin_count: usize,
    pub end_count: usize,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
    pub facets: Vec<FacetResult>,
}

/// Result of a storefront search
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuickSearchOutcome {
    Found(SearchPage),

    /// The engine answered with zero hits
    NoResults {
        /// Primary-store listing shown instead, when enabled
        fallback: Option<CatalogListing>,
    },

    /// The engine could not be reached or failed the request
    Unavailable { reason: String },
}

impl QuickSearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, QuickSearchOutcome::Found(_))
    }

    pub fn page(&self) -> Option<&SearchPage> {
        match self {
            QuickSearchOutcome::Found(page) => Some(page),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteItem {
    pub display_name: String,
    pub url: String,
}

/// Search entry points used by the storefront
pub struct ProductSearchService {
    client: Arc<dyn IndexClient>,
    catalog: Arc<dyn CatalogSource>,
    config: SearchConfig,
}

impl ProductSearchService {
    pub fn new(client: Arc<dyn IndexClient>, catalog: Arc<dyn CatalogSource>, config: SearchConfig) -> Self {
        Self {
            client,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Paginated, faceted search over products.
    ///
    /// Engine failures degrade to `Unavailable`; only primary-store failures
    /// are returned as errors.
    pub async fn quick_search(&self, params: &SearchParams) -> Result<QuickSearchOutcome> {
        let attributes = self.catalog.filterable_attributes().await?;
        let query = QueryBuilder::new(self.config.boosts.clone())
            .phrase(params.q.as_str())
            .params(params.filters.clone())
            .attributes(attributes)
            .build();

        let pagination = match SearchPagination::new(
            self.client.clone(),
            PRODUCT_DOC_TYPE,
            query,
            params.page.max(1),
            self.config.per_page,
        ) {
            Ok(pagination) => pagination,
            Err(e) => return Ok(self.unavailable(&params.q, e)),
        };

        let count = match pagination.count().await {
            Ok(count) => count,
            Err(e) => return Ok(self.unavailable(&params.q, e)),
        };

        if count == 0 {
            tracing::info!(phrase = %params.q, "Search returned no results");
            let fallback = if self.config.fallback_to_catalog {
                Some(self.catalog.listing(params.page.max(1), self.config.per_page).await?)
            } else {
                None
            };
            return Ok(QuickSearchOutcome::NoResults { fallback });
        }

        let page = match self.page_metadata(&pagination, count).await {
            Ok(page) => page,
            Err(e) => return Ok(self.unavailable(&params.q, e)),
        };
        let items = pagination.items(self.catalog.as_ref()).await?;

        Ok(QuickSearchOutcome::Found(SearchPage {
            phrase: params.q.clone(),
            items,
            ..page
        }))
    }

    async fn page_metadata(&self, pagination: &SearchPagination, count: u64) -> SearchResult<SearchPage> {
        Ok(SearchPage {
            phrase: String::new(),
            items: Vec::new(),
            count,
            page: pagination.page(),
            per_page: pagination.per_page(),
            pages: pagination.pages().await?,
            begin_count: pagination.begin_count().await?,
            end_count: pagination.end_count().await?,
            prev_page: pagination.prev_page(),
            next_page: pagination.next_page().await?,
            facets: pagination.facets().await?.to_vec(),
        })
    }

    fn unavailable(&self, phrase: &str, error: SearchError) -> QuickSearchOutcome {
        tracing::error!(phrase = %phrase, error = %error, transient = error.is_transient(), "Search engine request failed");
        QuickSearchOutcome::Unavailable {
            reason: error.to_string(),
        }
    }

    /// Name suggestions for a partially typed phrase, without facets.
    ///
    /// Returns an empty list when the engine fails.
    pub async fn autocomplete(&self, phrase: &str, limit: Option<usize>) -> Result<Vec<AutocompleteItem>> {
        let limit = limit.unwrap_or(self.config.autocomplete_limit).max(1);
        let query = QueryBuilder::new(self.config.boosts.clone())
            .phrase(phrase)
            .autocomplete(true)
            .build();

        let pagination = SearchPagination::new(self.client.clone(), PRODUCT_DOC_TYPE, query, 1, limit)?;
        if let Err(e) = pagination.result_set().await {
            tracing::error!(phrase = %phrase, error = %e, "Autocomplete request failed");
            return Ok(Vec::new());
        }

        let products = pagination.items(self.catalog.as_ref()).await?;
        Ok(products
            .iter()
            .map(|product| AutocompleteItem {
                display_name: product.name().to_string(),
                url: self.product_url(product),
            })
            .collect())
    }

    fn product_url(&self, product: &Product) -> String {
        match &product.uri {
            Some(uri) => format!("{}{}", self.config.product_url_prefix, uri),
            None => format!("{}{}", self.config.product_url_prefix, product.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_defaults() {
        let params = SearchParams::from_query_pairs(Vec::<(&str, &str)>::new());
        assert_eq!(params.q, "");
        assert_eq!(params.page, 1);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn test_query_pairs_collect_repeated_keys() {
        let params = SearchParams::from_query_pairs([
            ("q", "shirt"),
            ("color", "blue"),
            ("page", "3"),
            ("color", "black"),
            ("size", ""),
            ("size", "xl"),
        ]);

        assert_eq!(params.q, "shirt");
        assert_eq!(params.page, 3);
        assert_eq!(params.filters["color"], vec!["blue", "black"]);
        assert_eq!(params.filters["size"], vec!["xl"]);
    }

    #[test]
    fn test_invalid_page_clamps_to_first() {
        for raw in ["0", "-2", "abc", ""] {
            let params = SearchParams::from_query_pairs([("page", raw)]);
            assert_eq!(params.page, 1, "page={:?}", raw);
        }
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = QuickSearchOutcome::Unavailable {
            reason: "timeout".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert!(!outcome.is_found());
        assert!(outcome.page().is_none());
    }
}
