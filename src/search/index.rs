//! Embedded search engine backed by a Tantivy index
//!
//! All document types share one index; every document carries its type in
//! the `doc_type` field and is addressed by `_key` (`{doc_type}:{id}`) for
//! upserts and deletes. Writes are committed by the bulk calls but only
//! become searchable after `refresh`, mirroring a remote engine's refresh
//! interval.

use crate::models::DisplayOrder;
use crate::search::analysis;
use crate::search::client::{
    with_timeout, BulkOutcome, FacetBucket, FacetResult, IndexClient, SearchHit, SearchHits,
};
use crate::search::config::SearchConfig;
use crate::search::document::IndexDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::mapping;
use crate::search::query::{BoolQuery, Clause, FacetRequest, Query};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tantivy::collector::{Count, FacetCollector, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, BoostQuery, Occur, Query as TantivyQuery, TermQuery};
use tantivy::schema::{
    Facet, FacetOptions, Field, IndexRecordOption, Schema, Value as _, FAST, INDEXED, STORED, STRING, TEXT,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// Fields of the embedded schema
#[derive(Debug, Clone, Copy)]
struct Fields {
    key: Field,
    doc_type: Field,
    id: Field,
    code: Field,
    name: Field,
    name_partial: Field,
    name_metaphone: Field,
    description: Field,
    category_name: Field,
    tree_node_name: Field,
    attributes: Field,
    active: Field,
    displayed_on_eshop: Field,
    source: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();

    let fields = Fields {
        key: builder.add_text_field("_key", STRING | STORED),
        doc_type: builder.add_text_field("doc_type", STRING | STORED),
        id: builder.add_i64_field("id", INDEXED | STORED | FAST),
        code: builder.add_text_field("code", TEXT),
        name: builder.add_text_field("name", TEXT),
        // Pre-expanded edge n-grams and phonetic codes, indexed verbatim
        name_partial: builder.add_text_field("name_partial", STRING),
        name_metaphone: builder.add_text_field("name_metaphone", STRING),
        description: builder.add_text_field("description", TEXT),
        category_name: builder.add_text_field("category_name", TEXT),
        tree_node_name: builder.add_text_field("tree_node_name", TEXT),
        attributes: builder.add_facet_field("attributes", FacetOptions::default()),
        active: builder.add_text_field("active", STRING),
        displayed_on_eshop: builder.add_text_field("displayed_on_eshop", STRING),
        source: builder.add_text_field("_source", STORED),
    };

    (builder.build(), fields)
}

/// How a match clause's text is turned into terms
#[derive(Debug, Clone, Copy)]
enum TermEncoding {
    Analyzed,
    Partial,
    Metaphone,
}

fn attribute_term(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

struct IndexInner {
    index: Index,
    fields: Fields,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
}

impl IndexInner {
    fn new(index: Index, fields: Fields, writer_heap_size: usize) -> SearchResult<Self> {
        let writer = index.writer_with_num_threads(1, writer_heap_size)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            fields,
            writer: Mutex::new(writer),
            reader,
        })
    }

    fn key_term(&self, doc_type: &str, id: i64) -> Term {
        Term::from_field_text(self.fields.key, &format!("{}:{}", doc_type, id))
    }

    fn build_document(&self, document: &IndexDocument) -> SearchResult<TantivyDocument> {
        let f = &self.fields;
        let body = document
            .body
            .as_object()
            .ok_or_else(|| SearchError::IndexingFailed("document body is not an object".to_string()))?;

        let mut doc = TantivyDocument::new();
        doc.add_text(f.key, format!("{}:{}", document.doc_type, document.id));
        doc.add_text(f.doc_type, &document.doc_type);
        doc.add_i64(f.id, document.id);

        if let Some(name) = document.text_at("name") {
            doc.add_text(f.name, name);
            for gram in analysis::edge_ngrams(name) {
                doc.add_text(f.name_partial, gram);
            }
            for code in analysis::metaphone_codes(name) {
                doc.add_text(f.name_metaphone, code);
            }
        }
        if let Some(code) = document.text_at("code") {
            doc.add_text(f.code, code);
        }
        if let Some(description) = document.text_at("description") {
            doc.add_text(f.description, description);
        }
        if let Some(category) = document.text_at("category.name") {
            doc.add_text(f.category_name, category);
        }

        if let Some(nodes) = body.get("tree_nodes").and_then(|v| v.as_array()) {
            for node_name in nodes.iter().filter_map(|node| node.get("name")?.as_str()) {
                doc.add_text(f.tree_node_name, node_name);
            }
        }

        if let Some(attributes) = body.get("attributes").and_then(|v| v.as_object()) {
            for (key, value) in attributes {
                if let Some(term) = attribute_term(value) {
                    doc.add_facet(f.attributes, Facet::from_path([key.as_str(), term.as_str()]));
                }
            }
        }

        for (field, name) in [(f.active, "active"), (f.displayed_on_eshop, "displayed_on_eshop")] {
            if let Some(flag) = document.text_at(name) {
                doc.add_text(field, flag);
            }
        }

        doc.add_text(f.source, document.body.to_string());
        Ok(doc)
    }

    fn index_documents(&self, documents: &[IndexDocument]) -> SearchResult<BulkOutcome> {
        let mut writer = self.writer.lock();
        let mut outcome = BulkOutcome::default();

        for document in documents {
            let built = match self.build_document(document) {
                Ok(doc) => doc,
                Err(e) => {
                    outcome.failed.push((document.id, e.to_string()));
                    continue;
                }
            };

            writer.delete_term(self.key_term(&document.doc_type, document.id));
            match writer.add_document(built) {
                Ok(_) => outcome.succeeded.push(document.id),
                Err(e) => outcome.failed.push((document.id, e.to_string())),
            }
        }

        writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit batch: {}", e)))?;
        Ok(outcome)
    }

    fn delete_documents(&self, doc_type: &str, ids: &[i64]) -> SearchResult<BulkOutcome> {
        let mut writer = self.writer.lock();
        for id in ids {
            writer.delete_term(self.key_term(doc_type, *id));
        }
        writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit deletions: {}", e)))?;
        Ok(BulkOutcome::all_succeeded(ids.iter().copied()))
    }

    fn text_terms(&self, field: Field, text: &str, encoding: TermEncoding) -> SearchResult<Vec<Term>> {
        let words: Vec<String> = match encoding {
            TermEncoding::Analyzed => {
                let mut analyzer = self.index.tokenizer_for_field(field)?;
                let mut stream = analyzer.token_stream(text);
                let mut tokens = Vec::new();
                while stream.advance() {
                    tokens.push(stream.token().text.clone());
                }
                tokens
            }
            TermEncoding::Partial => analysis::words(text).map(|w| analysis::partial_term(&w)).collect(),
            TermEncoding::Metaphone => analysis::metaphone_codes(text),
        };

        Ok(words
            .iter()
            .map(|word| Term::from_field_text(field, word))
            .collect())
    }

    fn match_field(&self, field: &str) -> SearchResult<(Field, TermEncoding)> {
        let f = &self.fields;
        let resolved = match field {
            "code" => (f.code, TermEncoding::Analyzed),
            "name" => (f.name, TermEncoding::Analyzed),
            "name.partial" => (f.name_partial, TermEncoding::Partial),
            "name.metaphone" => (f.name_metaphone, TermEncoding::Metaphone),
            "description" => (f.description, TermEncoding::Analyzed),
            "category.name" => (f.category_name, TermEncoding::Analyzed),
            "tree_nodes.name" => (f.tree_node_name, TermEncoding::Analyzed),
            other => return Err(SearchError::InvalidQuery(format!("unknown match field '{}'", other))),
        };
        Ok(resolved)
    }

    fn term_for(&self, field: &str, value: &str) -> SearchResult<Term> {
        let f = &self.fields;
        match field {
            "active" => Ok(Term::from_field_text(f.active, value)),
            "displayed_on_eshop" => Ok(Term::from_field_text(f.displayed_on_eshop, value)),
            "type" | "doc_type" => Ok(Term::from_field_text(f.doc_type, value)),
            other => match other.strip_prefix("attributes.") {
                Some(attribute) => Ok(Term::from_facet(f.attributes, &Facet::from_path([attribute, value]))),
                None => Err(SearchError::InvalidQuery(format!("unknown term field '{}'", other))),
            },
        }
    }

    fn translate(&self, clause: &Clause) -> SearchResult<Box<dyn TantivyQuery>> {
        match clause {
            Clause::Match { field, text, boost } => {
                let (field, encoding) = self.match_field(field)?;
                let terms: Vec<(Occur, Box<dyn TantivyQuery>)> = self
                    .text_terms(field, text, encoding)?
                    .into_iter()
                    .map(|term| {
                        let query: Box<dyn TantivyQuery> =
                            Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                        (Occur::Should, query)
                    })
                    .collect();
                Ok(Box::new(BoostQuery::new(Box::new(BooleanQuery::new(terms)), *boost)))
            }
            Clause::Term { field, value } => Ok(Box::new(TermQuery::new(
                self.term_for(field, value)?,
                IndexRecordOption::Basic,
            ))),
            // Nested clauses only address one sub-field, so the flattened
            // multi-valued field gives the same matches
            Clause::Nested { query, .. } => self.translate(query),
            Clause::Bool(bool_query) => self.translate_bool(bool_query),
            Clause::MatchAll => Ok(Box::new(AllQuery)),
        }
    }

    fn translate_bool(&self, bool_query: &BoolQuery) -> SearchResult<Box<dyn TantivyQuery>> {
        let mut clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();
        for clause in &bool_query.must {
            clauses.push((Occur::Must, self.translate(clause)?));
        }

        let should = bool_query
            .should
            .iter()
            .map(|clause| Ok((Occur::Should, self.translate(clause)?)))
            .collect::<SearchResult<Vec<_>>>()?;

        let should_required = bool_query.minimum_should_match.unwrap_or(0) > 0;
        if !should.is_empty() && should_required && !clauses.is_empty() {
            // Should-clauses next to must-clauses are optional, so group them
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(should)) as Box<dyn TantivyQuery>));
        } else {
            clauses.extend(should);
        }

        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn execute(&self, doc_type: &str, query: &Query, offset: usize, size: Option<usize>) -> SearchResult<SearchHits> {
        let root = self.translate_bool(&query.root)?;
        let type_filter: Box<dyn TantivyQuery> = Box::new(TermQuery::new(
            Term::from_field_text(self.fields.doc_type, doc_type),
            IndexRecordOption::Basic,
        ));
        let scoped = BooleanQuery::new(vec![(Occur::Must, root), (Occur::Must, type_filter)]);

        let searcher = self.reader.searcher();

        let (total, facets) = if query.facets.is_empty() {
            (searcher.search(&scoped, &Count)?, Vec::new())
        } else {
            let mut collector = FacetCollector::for_field("attributes");
            for facet in &query.facets {
                collector.add_facet(Facet::from_path([facet.name.as_str()]));
            }
            let (total, counts) = searcher.search(&scoped, &(Count, collector))?;
            let facets = query
                .facets
                .iter()
                .map(|request| {
                    let buckets = counts
                        .get(Facet::from_path([request.name.as_str()]))
                        .filter_map(|(facet, count)| {
                            facet.to_path().last().map(|value| FacetBucket {
                                value: value.to_string(),
                                count,
                            })
                        })
                        .collect();
                    facet_result(request, buckets)
                })
                .collect();
            (total, facets)
        };

        // TopDocs allocates for offset + limit; the window stays inside the matches
        let remaining = total.saturating_sub(offset);
        let limit = size.map_or(remaining, |size| size.min(remaining));
        let mut hits = Vec::new();
        // TopDocs rejects a zero limit
        if limit > 0 {
            let top_docs = searcher.search(&scoped, &TopDocs::with_limit(limit).and_offset(offset))?;
            for (score, address) in top_docs {
                let doc: TantivyDocument = searcher.doc(address)?;
                let id = doc
                    .get_first(self.fields.id)
                    .and_then(|value| value.as_i64())
                    .ok_or_else(|| SearchError::SearchFailed("hit without id".to_string()))?;
                hits.push(SearchHit { id, score });
            }
        }

        Ok(SearchHits {
            total: total as u64,
            hits,
            facets,
        })
    }
}

/// Order and cut buckets the way the facet request asks
fn facet_result(request: &FacetRequest, mut buckets: Vec<FacetBucket>) -> FacetResult {
    match request.order {
        DisplayOrder::CountDesc => {
            buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)))
        }
        DisplayOrder::CountAsc => {
            buckets.sort_by(|a, b| a.count.cmp(&b.count).then_with(|| a.value.cmp(&b.value)))
        }
        DisplayOrder::TermAsc => buckets.sort_by(|a, b| a.value.cmp(&b.value)),
        DisplayOrder::TermDesc => buckets.sort_by(|a, b| b.value.cmp(&a.value)),
    }
    buckets.truncate(request.bucket_limit());

    FacetResult {
        name: request.name.clone(),
        buckets,
        display_count: request.display_count,
    }
}

/// In-process index client
#[derive(Clone)]
pub struct EmbeddedIndex {
    inner: Arc<IndexInner>,
    mappings: Arc<DashMap<String, serde_json::Value>>,
    timeout: Duration,
}

impl EmbeddedIndex {
    /// Open or create an on-disk index
    pub async fn open(path: &Path, config: &SearchConfig) -> SearchResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            SearchError::Tantivy(format!("Failed to create index directory: {}", e))
        })?;

        let (schema, fields) = build_schema();
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, schema)?
        };

        tracing::info!(path = ?path, "Opened embedded search index");
        Self::from_index(index, fields, config)
    }

    /// Create an index that lives only in memory
    pub fn in_memory(config: &SearchConfig) -> SearchResult<Self> {
        let (schema, fields) = build_schema();
        Self::from_index(Index::create_in_ram(schema), fields, config)
    }

    fn from_index(index: Index, fields: Fields, config: &SearchConfig) -> SearchResult<Self> {
        Ok(Self {
            inner: Arc::new(IndexInner::new(index, fields, config.writer_heap_size)?),
            mappings: Arc::new(DashMap::new()),
            timeout: config.timeout(),
        })
    }

    /// Mapping last declared for `doc_type`
    pub fn mapping(&self, doc_type: &str) -> Option<serde_json::Value> {
        self.mappings.get(doc_type).map(|m| m.value().clone())
    }

    async fn run_blocking<T, F>(&self, task: F) -> SearchResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&IndexInner) -> SearchResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        with_timeout(self.timeout, async move {
            tokio::task::spawn_blocking(move || task(&inner))
                .await
                .map_err(|e| SearchError::Tantivy(format!("Index task failed: {}", e)))?
        })
        .await
    }
}

#[async_trait]
impl IndexClient for EmbeddedIndex {
    async fn bulk_index(&self, doc_type: &str, documents: &[IndexDocument]) -> SearchResult<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let documents = documents.to_vec();
        let outcome = self.run_blocking(move |inner| inner.index_documents(&documents)).await?;
        tracing::debug!(
            doc_type = doc_type,
            indexed = outcome.succeeded.len(),
            rejected = outcome.failed.len(),
            "Bulk indexed into embedded engine"
        );
        Ok(outcome)
    }

    async fn delete_documents(&self, doc_type: &str, ids: &[i64]) -> SearchResult<BulkOutcome> {
        if ids.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let doc_type = doc_type.to_string();
        let ids = ids.to_vec();
        self.run_blocking(move |inner| inner.delete_documents(&doc_type, &ids))
            .await
    }

    async fn update_settings(&self, doc_type: &str, settings: &serde_json::Value) -> SearchResult<()> {
        if settings.get("analysis").is_none() {
            return Err(SearchError::MappingRejected(format!(
                "settings for '{}' declare no analysis",
                doc_type
            )));
        }
        tracing::debug!(doc_type = doc_type, "Embedded engine uses built-in analysis");
        Ok(())
    }

    async fn update_mapping(&self, doc_type: &str, mapping: &serde_json::Value) -> SearchResult<()> {
        mapping::validate_mapping(mapping).map_err(SearchError::MappingRejected)?;
        self.mappings.insert(doc_type.to_string(), mapping.clone());
        Ok(())
    }

    async fn search(
        &self,
        doc_type: &str,
        query: &Query,
        offset: usize,
        size: Option<usize>,
    ) -> SearchResult<SearchHits> {
        let doc_type = doc_type.to_string();
        let query = query.clone();
        self.run_blocking(move |inner| inner.execute(&doc_type, &query, offset, size))
            .await
    }

    async fn refresh(&self, _doc_type: &str) -> SearchResult<()> {
        self.run_blocking(|inner| Ok(inner.reader.reload()?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterableAttribute, Product, Template, Uom};
    use crate::search::config::Boosts;
    use crate::search::document::ProductDocument;
    use crate::search::query::QueryBuilder;
    use crate::search::PRODUCT_DOC_TYPE;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn document(id: i64, name: &str, color: &str) -> IndexDocument {
        let template = Template::new(id, name, Decimal::from(10)).with_uom(Uom::new(1, "Unit", "u"));
        let product = Product::new(id, template).with_attribute("color", color);
        ProductDocument::from_product(&product, &[])
            .unwrap()
            .into_index_document()
            .unwrap()
    }

    async fn index_with(documents: &[IndexDocument]) -> EmbeddedIndex {
        let index = EmbeddedIndex::in_memory(&SearchConfig::default()).unwrap();
        index.bulk_index(PRODUCT_DOC_TYPE, documents).await.unwrap();
        index.refresh(PRODUCT_DOC_TYPE).await.unwrap();
        index
    }

    fn phrase(text: &str) -> Query {
        QueryBuilder::new(Boosts::default())
            .phrase(text)
            .attributes(vec![FilterableAttribute::new("color")])
            .build()
    }

    #[tokio::test]
    async fn test_documents_invisible_until_refresh() {
        let index = EmbeddedIndex::in_memory(&SearchConfig::default()).unwrap();
        index
            .bulk_index(PRODUCT_DOC_TYPE, &[document(1, "Blue Shirt", "blue")])
            .await
            .unwrap();

        let before = index.search(PRODUCT_DOC_TYPE, &phrase("shirt"), 0, Some(10)).await.unwrap();
        assert_eq!(before.total, 0);

        index.refresh(PRODUCT_DOC_TYPE).await.unwrap();
        let after = index.search(PRODUCT_DOC_TYPE, &phrase("shirt"), 0, Some(10)).await.unwrap();
        assert_eq!(after.total, 1);
        assert_eq!(after.ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = index_with(&[document(1, "Blue Shirt", "blue")]).await;
        index
            .bulk_index(PRODUCT_DOC_TYPE, &[document(1, "Red Scarf", "red")])
            .await
            .unwrap();
        index.refresh(PRODUCT_DOC_TYPE).await.unwrap();

        assert_eq!(index.search(PRODUCT_DOC_TYPE, &phrase("shirt"), 0, Some(10)).await.unwrap().total, 0);
        assert_eq!(index.search(PRODUCT_DOC_TYPE, &phrase("scarf"), 0, Some(10)).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_partial_and_phonetic_matching() {
        let index = index_with(&[document(1, "Telephone", "black")]).await;

        let partial = index.search(PRODUCT_DOC_TYPE, &phrase("tele"), 0, Some(10)).await.unwrap();
        assert_eq!(partial.total, 1);

        let phonetic = index.search(PRODUCT_DOC_TYPE, &phrase("telefone"), 0, Some(10)).await.unwrap();
        assert_eq!(phonetic.total, 1);
    }

    #[tokio::test]
    async fn test_facets_count_attribute_values() {
        let index = index_with(&[
            document(1, "Shirt One", "blue"),
            document(2, "Shirt Two", "blue"),
            document(3, "Shirt Three", "black"),
        ])
        .await;

        let hits = index.search(PRODUCT_DOC_TYPE, &phrase("shirt"), 0, Some(1)).await.unwrap();
        assert_eq!(hits.total, 3);
        assert_eq!(hits.hits.len(), 1);
        assert_eq!(
            hits.facets,
            vec![FacetResult {
                name: "color".to_string(),
                buckets: vec![
                    FacetBucket { value: "blue".to_string(), count: 2 },
                    FacetBucket { value: "black".to_string(), count: 1 },
                ],
                display_count: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_facets_carry_display_count() {
        let index = index_with(&[document(1, "Shirt One", "blue")]).await;
        let query = QueryBuilder::new(Boosts::default())
            .phrase("shirt")
            .attributes(vec![FilterableAttribute::new("color").display_count(false)])
            .build();

        let hits = index.search(PRODUCT_DOC_TYPE, &query, 0, Some(10)).await.unwrap();
        assert!(!hits.facets[0].display_count);
        assert_eq!(hits.facets[0].buckets[0].count, 1);
    }

    #[tokio::test]
    async fn test_delete_and_unbounded_search() {
        let index = index_with(&[document(1, "Shirt One", "blue"), document(2, "Shirt Two", "red")]).await;
        index.delete_documents(PRODUCT_DOC_TYPE, &[1]).await.unwrap();
        index.refresh(PRODUCT_DOC_TYPE).await.unwrap();

        let all = index.search(PRODUCT_DOC_TYPE, &phrase(""), 0, None).await.unwrap();
        assert_eq!(all.ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_window_past_the_end_is_empty() {
        let index = index_with(&[document(1, "Shirt One", "blue"), document(2, "Shirt Two", "red")]).await;

        let far = index
            .search(PRODUCT_DOC_TYPE, &phrase("shirt"), 1_000_000_000_000_000, Some(10))
            .await
            .unwrap();
        assert_eq!(far.total, 2);
        assert!(far.hits.is_empty());
        assert_eq!(far.facets[0].buckets.len(), 2);

        let huge = index
            .search(PRODUCT_DOC_TYPE, &phrase("shirt"), 1, Some(usize::MAX))
            .await
            .unwrap();
        assert_eq!(huge.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_mapping_validation() {
        let index = EmbeddedIndex::in_memory(&SearchConfig::default()).unwrap();
        index
            .update_mapping(PRODUCT_DOC_TYPE, &mapping::product_mapping())
            .await
            .unwrap();
        assert!(index.mapping(PRODUCT_DOC_TYPE).is_some());

        let err = index
            .update_mapping(PRODUCT_DOC_TYPE, &serde_json::json!({ "properties": {} }))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::MappingRejected(_)));
    }

    #[tokio::test]
    async fn test_reopens_on_disk_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = SearchConfig::default();

        {
            let index = EmbeddedIndex::open(temp_dir.path(), &config).await.unwrap();
            index
                .bulk_index(PRODUCT_DOC_TYPE, &[document(5, "Lamp", "white")])
                .await
                .unwrap();
        }

        let reopened = EmbeddedIndex::open(temp_dir.path(), &config).await.unwrap();
        reopened.refresh(PRODUCT_DOC_TYPE).await.unwrap();
        let hits = reopened.search(PRODUCT_DOC_TYPE, &phrase("lamp"), 0, Some(10)).await.unwrap();
        assert_eq!(hits.ids(), vec![5]);
    }
}
