//! Elasticsearch engine spoken to over its REST API

use crate::search::client::{
    with_timeout, BulkOutcome, FacetBucket, FacetResult, IndexClient, SearchHit, SearchHits,
};
use crate::search::config::SearchConfig;
use crate::search::document::IndexDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::Query;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Default `index.max_result_window`: `from + size` beyond it is rejected
const MAX_RESULT_WINDOW: usize = 10_000;

/// Index client for a remote Elasticsearch cluster.
///
/// Each document type lives in its own physical index named
/// `{index_name}_{doc_type}`.
#[derive(Clone)]
pub struct ElasticsearchClient {
    http: reqwest::Client,
    base_url: String,
    index_name: String,
    timeout: Duration,
}

impl ElasticsearchClient {
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| SearchError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.elasticsearch_url.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
            timeout: config.timeout(),
        })
    }

    /// Physical index holding documents of `doc_type`
    pub fn index_for(&self, doc_type: &str) -> String {
        format!("{}_{}", self.index_name, doc_type)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}/{}", self.base_url, path))
    }

    fn transport_error(&self, err: reqwest::Error) -> SearchError {
        if err.is_timeout() {
            SearchError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() || err.is_request() {
            SearchError::Unavailable(err.to_string())
        } else {
            SearchError::SearchFailed(err.to_string())
        }
    }

    /// Send a request and decode its JSON body, rejecting non-success statuses
    async fn send(&self, request: RequestBuilder) -> SearchResult<(StatusCode, Value)> {
        with_timeout(self.timeout, async {
            let response = request.send().await.map_err(|e| self.transport_error(e))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| self.transport_error(e))?;

            if !status.is_success() {
                return Err(SearchError::Rejected {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text)?
            };
            Ok((status, body))
        })
        .await
    }

    async fn index_exists(&self, index: &str) -> SearchResult<bool> {
        let request = self.request(Method::HEAD, index);
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(SearchError::Rejected { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Send a `_bulk` body and read back the per-item outcome, in request order
    async fn bulk(&self, ids: &[i64], body: String, missing_is_ok: bool) -> SearchResult<BulkOutcome> {
        let request = self
            .request(Method::POST, "_bulk")
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        let (_, response) = self.send(request).await?;

        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| SearchError::IndexingFailed("bulk response has no items".to_string()))?;
        if items.len() != ids.len() {
            return Err(SearchError::IndexingFailed(format!(
                "bulk response has {} items for {} requests",
                items.len(),
                ids.len()
            )));
        }

        let mut outcome = BulkOutcome::default();
        for (id, item) in ids.iter().zip(items) {
            // Each item is keyed by its action name
            let result = item
                .as_object()
                .and_then(|actions| actions.values().next())
                .cloned()
                .unwrap_or(Value::Null);
            let status = result.get("status").and_then(Value::as_u64).unwrap_or(0);

            if (200..300).contains(&status) || (missing_is_ok && status == 404) {
                outcome.succeeded.push(*id);
            } else {
                let reason = result
                    .get("error")
                    .map(|error| {
                        error
                            .get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string())
                    })
                    .unwrap_or_else(|| format!("status {}", status));
                outcome.failed.push((*id, reason));
            }
        }

        Ok(outcome)
    }

    fn search_body(query: &Query, offset: usize, size: usize) -> Value {
        let mut body = json!({
            "query": query.to_json(),
            "from": offset,
            "size": size,
            "track_total_hits": true,
        });
        if let Some(aggs) = query.aggregations_json() {
            body["aggs"] = aggs;
        }
        body
    }

    async fn run_search(&self, index: &str, body: &Value) -> SearchResult<Value> {
        let request = self
            .request(Method::POST, &format!("{}/_search", index))
            .json(body);
        match self.send(request).await {
            Ok((_, response)) => Ok(response),
            Err(SearchError::Rejected { status, body }) if status < 500 => {
                Err(SearchError::SearchFailed(format!("status {}: {}", status, body)))
            }
            Err(e) => Err(e),
        }
    }

    /// Map a declaration failure: client errors mean the declaration itself is wrong
    fn declaration_error(err: SearchError) -> SearchError {
        match err {
            SearchError::Rejected { status, body } if status < 500 => {
                SearchError::MappingRejected(format!("status {}: {}", status, body))
            }
            other => other,
        }
    }
}

/// Decode hits, total and aggregations of a `_search` response
pub fn parse_search_response(response: &Value, query: &Query) -> SearchResult<SearchHits> {
    let hits = response
        .get("hits")
        .ok_or_else(|| SearchError::SearchFailed("response has no hits".to_string()))?;

    // Older clusters report a bare number, newer ones `{ "value": n }`
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
        None => 0,
    };

    let mut parsed = Vec::new();
    for hit in hits.get("hits").and_then(Value::as_array).into_iter().flatten() {
        let id = hit
            .get("_id")
            .and_then(|id| match id {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            })
            .ok_or_else(|| SearchError::SearchFailed(format!("hit with invalid _id: {}", hit)))?;
        let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
        parsed.push(SearchHit { id, score });
    }

    let facets = query
        .facets
        .iter()
        .map(|request| {
            let buckets = response
                .get("aggregations")
                .and_then(|aggs| aggs.get(&request.name))
                .and_then(|agg| agg.get("buckets"))
                .and_then(Value::as_array)
                .map(|buckets| {
                    buckets
                        .iter()
                        .filter_map(|bucket| {
                            let value = match bucket.get("key")? {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            let count = bucket.get("doc_count")?.as_u64()?;
                            Some(FacetBucket { value, count })
                        })
                        .collect()
                })
                .unwrap_or_default();
            FacetResult {
                name: request.name.clone(),
                buckets,
                display_count: request.display_count,
            }
        })
        .collect();

    Ok(SearchHits {
        total,
        hits: parsed,
        facets,
    })
}

#[async_trait]
impl IndexClient for ElasticsearchClient {
    async fn bulk_index(&self, doc_type: &str, documents: &[IndexDocument]) -> SearchResult<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let index = self.index_for(doc_type);
        let mut body = String::new();
        for document in documents {
            body.push_str(&json!({ "index": { "_index": index, "_id": document.id.to_string() } }).to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(&document.body)?);
            body.push('\n');
        }

        let ids: Vec<i64> = documents.iter().map(|d| d.id).collect();
        let outcome = self.bulk(&ids, body, false).await?;
        tracing::debug!(
            index = %index,
            indexed = outcome.succeeded.len(),
            rejected = outcome.failed.len(),
            "Bulk indexed into Elasticsearch"
        );
        Ok(outcome)
    }

    async fn delete_documents(&self, doc_type: &str, ids: &[i64]) -> SearchResult<BulkOutcome> {
        if ids.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let index = self.index_for(doc_type);
        let mut body = String::new();
        for id in ids {
            body.push_str(&json!({ "delete": { "_index": index, "_id": id.to_string() } }).to_string());
            body.push('\n');
        }

        self.bulk(ids, body, true).await
    }

    async fn update_settings(&self, doc_type: &str, settings: &Value) -> SearchResult<()> {
        let index = self.index_for(doc_type);

        let result: SearchResult<()> = async {
            if !self.index_exists(&index).await? {
                let request = self
                    .request(Method::PUT, &index)
                    .json(&json!({ "settings": settings }));
                self.send(request).await?;
                tracing::info!(index = %index, "Created index with settings");
                return Ok(());
            }

            // Analysis settings can only change on a closed index
            self.send(self.request(Method::POST, &format!("{}/_close", index))).await?;
            let update = self
                .send(
                    self.request(Method::PUT, &format!("{}/_settings", index))
                        .json(settings),
                )
                .await;
            self.send(self.request(Method::POST, &format!("{}/_open", index))).await?;
            update.map(|_| tracing::info!(index = %index, "Updated index settings"))
        }
        .await;

        result.map_err(Self::declaration_error)
    }

    async fn update_mapping(&self, doc_type: &str, mapping: &Value) -> SearchResult<()> {
        let index = self.index_for(doc_type);
        let request = self
            .request(Method::PUT, &format!("{}/_mapping", index))
            .json(mapping);

        self.send(request).await.map_err(Self::declaration_error)?;
        tracing::info!(index = %index, "Updated index mapping");
        Ok(())
    }

    async fn search(
        &self,
        doc_type: &str,
        query: &Query,
        offset: usize,
        size: Option<usize>,
    ) -> SearchResult<SearchHits> {
        let index = self.index_for(doc_type);

        // Unbounded windows and windows past the result window limit are
        // sized from a count-only request, which also answers pages past the end
        let within_limit = size.is_some_and(|size| offset.saturating_add(size) <= MAX_RESULT_WINDOW);
        let size = match size {
            Some(size) if within_limit => size,
            _ => {
                let counted = self.run_search(&index, &Self::search_body(query, 0, 0)).await?;
                let counted = parse_search_response(&counted, query)?;
                let remaining = counted.total.saturating_sub(offset as u64);
                if remaining == 0 {
                    return Ok(counted);
                }
                let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
                size.map_or(remaining, |size| size.min(remaining))
            }
        };

        let response = self
            .run_search(&index, &Self::search_body(query, offset, size))
            .await?;
        parse_search_response(&response, query)
    }

    async fn refresh(&self, doc_type: &str) -> SearchResult<()> {
        let index = self.index_for(doc_type);
        self.send(self.request(Method::POST, &format!("{}/_refresh", index)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterableAttribute;
    use crate::search::config::Boosts;
    use crate::search::query::QueryBuilder;

    fn query() -> Query {
        QueryBuilder::new(Boosts::default())
            .phrase("shirt")
            .attributes(vec![FilterableAttribute::new("color")])
            .build()
    }

    #[test]
    fn test_parse_search_response_with_object_total() {
        let response = json!({
            "hits": {
                "total": { "value": 12, "relation": "eq" },
                "hits": [
                    { "_id": "4", "_score": 2.5 },
                    { "_id": "9", "_score": 1.0 }
                ]
            },
            "aggregations": {
                "color": {
                    "buckets": [
                        { "key": "blue", "doc_count": 8 },
                        { "key": "black", "doc_count": 4 }
                    ]
                }
            }
        });

        let parsed = parse_search_response(&response, &query()).unwrap();
        assert_eq!(parsed.total, 12);
        assert_eq!(parsed.ids(), vec![4, 9]);
        assert_eq!(parsed.facets[0].buckets[0], FacetBucket { value: "blue".to_string(), count: 8 });
    }

    #[test]
    fn test_parse_search_response_with_numeric_total() {
        let response = json!({ "hits": { "total": 3, "hits": [] } });
        let parsed = parse_search_response(&response, &query()).unwrap();
        assert_eq!(parsed.total, 3);
        assert!(parsed.hits.is_empty());
        assert!(parsed.facets[0].buckets.is_empty());
    }

    #[test]
    fn test_search_body_carries_window_and_aggs() {
        let body = ElasticsearchClient::search_body(&query(), 20, 10);
        assert_eq!(body["from"], json!(20));
        assert_eq!(body["size"], json!(10));
        assert_eq!(body["track_total_hits"], json!(true));
        assert!(body["aggs"]["color"]["terms"].is_object());
        assert!(body["query"]["bool"]["must"].is_array());
    }

    #[test]
    fn test_index_naming() {
        let client = ElasticsearchClient::new(&SearchConfig::default()).unwrap();
        assert_eq!(client.index_for("product"), "webshop_product");
    }
}
