//! Index settings and field mappings declared before documents are pushed

use serde_json::{json, Value};

/// Analyzer settings: edge n-gram analyzer for `name.partial`, metaphone
/// analyzer for `name.metaphone`
pub fn index_settings() -> Value {
    json!({
        "analysis": {
            "filter": {
                "partial_filter": {
                    "type": "edge_ngram",
                    "min_gram": crate::search::analysis::MIN_GRAM,
                    "max_gram": crate::search::analysis::MAX_GRAM
                },
                "metaphone_filter": {
                    "type": "phonetic",
                    "encoder": "metaphone",
                    "replace": true
                }
            },
            "analyzer": {
                "partial_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "partial_filter"]
                },
                "metaphone_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "metaphone_filter"]
                }
            }
        }
    })
}

/// Field mapping of product documents
pub fn product_mapping() -> Value {
    json!({
        "dynamic_templates": [
            {
                "attributes_as_keywords": {
                    "path_match": "attributes.*",
                    "mapping": { "type": "keyword" }
                }
            }
        ],
        "properties": {
            "id": { "type": "long" },
            "code": { "type": "text" },
            "name": {
                "type": "text",
                "fields": {
                    "partial": {
                        "type": "text",
                        "analyzer": "partial_analyzer",
                        "search_analyzer": "standard"
                    },
                    "metaphone": {
                        "type": "text",
                        "analyzer": "metaphone_analyzer"
                    }
                }
            },
            "description": { "type": "text" },
            "list_price": { "type": "scaled_float", "scaling_factor": 10000 },
            "type": { "type": "keyword" },
            "uri": { "type": "keyword" },
            "category": {
                "properties": {
                    "id": { "type": "long" },
                    "name": { "type": "text" }
                }
            },
            "price_lists": {
                "properties": {
                    "id": { "type": "long" },
                    "price": { "type": "scaled_float", "scaling_factor": 10000 }
                }
            },
            "tree_nodes": {
                "type": "nested",
                "properties": {
                    "id": { "type": "long" },
                    "name": { "type": "text" },
                    "sequence": { "type": "integer" }
                }
            },
            "attributes": { "type": "object" },
            "active": { "type": "keyword" },
            "displayed_on_eshop": { "type": "keyword" }
        }
    })
}

/// Check the parts of a mapping the phrase query depends on
pub fn validate_mapping(mapping: &Value) -> Result<(), String> {
    let properties = mapping
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| "mapping has no properties".to_string())?;

    if properties
        .get("tree_nodes")
        .and_then(|f| f.get("type"))
        .and_then(Value::as_str)
        != Some("nested")
    {
        return Err("tree_nodes must be declared as a nested field".to_string());
    }

    let name_fields = properties
        .get("name")
        .and_then(|f| f.get("fields"))
        .ok_or_else(|| "name must declare sub-fields".to_string())?;
    for sub_field in ["partial", "metaphone"] {
        if name_fields.get(sub_field).is_none() {
            return Err(format!("name.{} sub-field is missing", sub_field));
        }
    }

    Ok(())
}
