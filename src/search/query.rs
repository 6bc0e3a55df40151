//! Query building and facet planning

use crate::models::{DisplayOrder, FilterableAttribute};
use crate::search::config::Boosts;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Bucket limit standing in for "every term" on multiselect facets
pub const ALL_TERMS_SIZE: usize = 10_000;

/// Gate fields that are always required to hold "true"
pub const GATE_FIELDS: [&str; 2] = ["active", "displayed_on_eshop"];

/// Leaf and composite clauses of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    /// Analyzed full-text match
    Match { field: String, text: String, boost: f32 },
    /// Exact value equality
    Term { field: String, value: String },
    /// Query evaluated inside each element of a repeated sub-structure
    Nested { path: String, query: Box<Clause> },
    Bool(BoolQuery),
    MatchAll,
}

impl Clause {
    pub fn matches(field: impl Into<String>, text: impl Into<String>, boost: f32) -> Self {
        Clause::Match {
            field: field.into(),
            text: text.into(),
            boost,
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Clause::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Clause::Match { field, text, boost } => json!({
                "match": { field.as_str(): { "query": text, "boost": boost } }
            }),
            Clause::Term { field, value } => json!({
                "term": { field.as_str(): value }
            }),
            Clause::Nested { path, query } => json!({
                "nested": { "path": path, "query": query.to_json() }
            }),
            Clause::Bool(bool_query) => bool_query.to_json(),
            Clause::MatchAll => json!({ "match_all": {} }),
        }
    }
}

/// Boolean composite of `should` and `must` clauses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub should: Vec<Clause>,
    pub must: Vec<Clause>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if !self.should.is_empty() {
            body.insert(
                "should".to_string(),
                Value::Array(self.should.iter().map(Clause::to_json).collect()),
            );
        }
        if !self.must.is_empty() {
            body.insert(
                "must".to_string(),
                Value::Array(self.must.iter().map(Clause::to_json).collect()),
            );
        }
        if let Some(minimum) = self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), json!(minimum));
        }
        json!({ "bool": body })
    }
}

/// Term aggregation over one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRequest {
    /// Attribute name, also the aggregation name
    pub name: String,
    pub field: String,
    pub size: usize,
    pub order: DisplayOrder,
    /// Return every term instead of the top `size`
    pub all_terms: bool,
    /// Whether the filter UI shows per-value counts
    pub display_count: bool,
}

impl FacetRequest {
    pub fn from_attribute(attribute: &FilterableAttribute) -> Self {
        Self {
            name: attribute.name.clone(),
            field: attribute.field(),
            size: attribute.display_size,
            order: attribute.display_order,
            all_terms: attribute.multiselect,
            display_count: attribute.display_count,
        }
    }

    /// Number of buckets to ask for
    pub fn bucket_limit(&self) -> usize {
        if self.all_terms {
            ALL_TERMS_SIZE
        } else {
            self.size
        }
    }

    pub fn to_json(&self) -> Value {
        let order = match self.order {
            DisplayOrder::CountDesc => json!({ "_count": "desc" }),
            DisplayOrder::CountAsc => json!({ "_count": "asc" }),
            DisplayOrder::TermAsc => json!({ "_key": "asc" }),
            DisplayOrder::TermDesc => json!({ "_key": "desc" }),
        };
        json!({
            "terms": {
                "field": self.field,
                "size": self.bucket_limit(),
                "order": order
            }
        })
    }
}

/// Search query with its facet plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub root: BoolQuery,
    pub facets: Vec<FacetRequest>,
}

impl Query {
    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }

    /// `aggs` body, absent when no facets are planned
    pub fn aggregations_json(&self) -> Option<Value> {
        if self.facets.is_empty() {
            return None;
        }
        let aggs: Map<String, Value> = self
            .facets
            .iter()
            .map(|facet| (facet.name.clone(), facet.to_json()))
            .collect();
        Some(Value::Object(aggs))
    }
}

/// Weighted OR of the phrase over every searchable field.
///
/// Returns an empty list for a blank phrase.
pub fn phrase_clauses(phrase: &str, boosts: &Boosts) -> Vec<Clause> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Vec::new();
    }

    vec![
        Clause::matches("code", phrase, boosts.code),
        Clause::matches("name", phrase, boosts.name),
        Clause::matches("name.partial", phrase, boosts.name_partial),
        Clause::matches("name.metaphone", phrase, boosts.name_metaphone),
        Clause::matches("description", phrase, boosts.description),
        Clause::matches("category.name", phrase, boosts.category_name),
        Clause::Nested {
            path: "tree_nodes".to_string(),
            query: Box::new(Clause::Bool(BoolQuery {
                should: vec![Clause::matches("tree_nodes.name", phrase, boosts.tree_node_name)],
                must: Vec::new(),
                minimum_should_match: None,
            })),
        },
    ]
}

/// AND across attribute keys of an OR across each key's values.
///
/// Only keys naming a filterable attribute count; `None` means no filter,
/// which is different from a filter that matches nothing.
pub fn attribute_filter(
    params: &BTreeMap<String, Vec<String>>,
    attributes: &[FilterableAttribute],
) -> Option<Clause> {
    let per_key: Vec<Clause> = attributes
        .iter()
        .filter(|attribute| attribute.filterable)
        .filter_map(|attribute| {
            let values = params.get(&attribute.name)?;
            let alternatives: Vec<Clause> = values
                .iter()
                .filter(|value| !value.is_empty())
                .map(|value| Clause::term(attribute.field(), value.as_str()))
                .collect();
            if alternatives.is_empty() {
                return None;
            }
            Some(Clause::Bool(BoolQuery {
                should: alternatives,
                must: Vec::new(),
                minimum_should_match: Some(1),
            }))
        })
        .collect();

    if per_key.is_empty() {
        return None;
    }

    Some(Clause::Bool(BoolQuery {
        should: Vec::new(),
        must: per_key,
        minimum_should_match: None,
    }))
}

/// One facet request per filterable attribute
pub fn plan_facets(attributes: &[FilterableAttribute]) -> Vec<FacetRequest> {
    attributes
        .iter()
        .filter(|attribute| attribute.filterable)
        .map(FacetRequest::from_attribute)
        .collect()
}

/// Builder for storefront product queries
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    boosts: Boosts,
    phrase: String,
    params: BTreeMap<String, Vec<String>>,
    attributes: Vec<FilterableAttribute>,
    autocomplete: bool,
}

impl QueryBuilder {
    pub fn new(boosts: Boosts) -> Self {
        Self {
            boosts,
            ..Default::default()
        }
    }

    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = phrase.into();
        self
    }

    /// Request parameters that may carry attribute filters
    pub fn params(mut self, params: BTreeMap<String, Vec<String>>) -> Self {
        self.params = params;
        self
    }

    pub fn attributes(mut self, attributes: Vec<FilterableAttribute>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Autocomplete queries never carry facets
    pub fn autocomplete(mut self, autocomplete: bool) -> Self {
        self.autocomplete = autocomplete;
        self
    }

    pub fn build(self) -> Query {
        let should = phrase_clauses(&self.phrase, &self.boosts);
        let minimum_should_match = if should.is_empty() { None } else { Some(1) };

        let mut must: Vec<Clause> = GATE_FIELDS
            .iter()
            .map(|field| Clause::term(*field, "true"))
            .collect();
        if let Some(filter) = attribute_filter(&self.params, &self.attributes) {
            must.push(filter);
        }

        let facets = if self.autocomplete {
            Vec::new()
        } else {
            plan_facets(&self.attributes)
        };

        Query {
            root: BoolQuery {
                should,
                must,
                minimum_should_match,
            },
            facets,
        }
    }
}
