//! Search document structures and serialization

use crate::backlog::EntityRef;
use crate::catalog::CatalogSource;
use crate::models::{AttributeValue, PriceList, Product, ProductType};
use crate::search::PRODUCT_DOC_TYPE;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Why an entity could not be turned into a document
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializeError {
    /// A relation the document needs is not set on the entity
    #[error("{entity} is missing required relation '{relation}'")]
    MissingRelation { entity: String, relation: &'static str },

    /// No serializer is registered for the entity type
    #[error("No document serializer for entity type '{0}'")]
    MissingEntityType(String),

    /// Entity data could not be represented as a document
    #[error("Invalid document: {0}")]
    Invalid(String),

    /// The primary store could not be read
    #[error("Catalog read failed: {0}")]
    Catalog(String),
}

/// Document ready to be handed to an index client
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub doc_type: String,
    pub id: i64,
    pub body: Value,
}

impl IndexDocument {
    pub fn new<T: Serialize>(doc_type: impl Into<String>, id: i64, document: &T) -> Result<Self, SerializeError> {
        let body = serde_json::to_value(document).map_err(|e| SerializeError::Invalid(e.to_string()))?;
        Ok(Self {
            doc_type: doc_type.into(),
            id,
            body,
        })
    }

    /// Text of a top-level or dotted field path such as `category.name`
    pub fn text_at(&self, path: &str) -> Option<&str> {
        path.split('.')
            .try_fold(&self.body, |value, key| value.get(key))
            .and_then(Value::as_str)
    }
}

/// Gate flags travel as the literal tokens "true"/"false"
mod gate_flag {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!("invalid gate flag '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDoc {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListPrice {
    pub id: i64,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeDoc {
    pub id: i64,
    pub name: String,
    pub sequence: i32,
}

/// Indexed projection of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub list_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryDoc>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub uri: Option<String>,
    pub price_lists: Vec<PriceListPrice>,
    pub tree_nodes: Vec<TreeNodeDoc>,
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(with = "gate_flag")]
    pub active: bool,
    #[serde(with = "gate_flag")]
    pub displayed_on_eshop: bool,
}

impl ProductDocument {
    /// Build the document for `product` priced under every list in `price_lists`
    pub fn from_product(product: &Product, price_lists: &[PriceList]) -> Result<Self, SerializeError> {
        product.default_uom().ok_or_else(|| SerializeError::MissingRelation {
            entity: EntityRef::product(product.id).to_string(),
            relation: "default_uom",
        })?;

        let price_lists = price_lists
            .iter()
            .map(|list| {
                let price = list.compute(product.list_price(), Decimal::ONE).ok_or_else(|| {
                    SerializeError::Invalid(format!(
                        "price of {} under price list {} overflows",
                        EntityRef::product(product.id),
                        list.id
                    ))
                })?;
                Ok(PriceListPrice { id: list.id, price })
            })
            .collect::<Result<Vec<_>, SerializeError>>()?;

        let mut tree_nodes: Vec<TreeNodeDoc> = product
            .tree_nodes
            .iter()
            .map(|node| TreeNodeDoc {
                id: node.id,
                name: node.name.clone(),
                sequence: node.sequence,
            })
            .collect();
        tree_nodes.sort_by_key(|node| node.sequence);

        Ok(Self {
            id: product.id,
            name: product.name().to_string(),
            code: product.code.clone(),
            description: product.effective_description().map(str::to_string),
            list_price: product.list_price(),
            category: product.category().map(|c| CategoryDoc {
                id: c.id,
                name: c.name.clone(),
            }),
            product_type: product.template.product_type,
            uri: product.uri.clone(),
            price_lists,
            tree_nodes,
            attributes: product.attributes.clone(),
            active: product.active,
            displayed_on_eshop: product.displayed_on_eshop,
        })
    }

    pub fn into_index_document(self) -> Result<IndexDocument, SerializeError> {
        IndexDocument::new(PRODUCT_DOC_TYPE, self.id, &self)
    }
}

/// Produces the current document of an entity
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// `Ok(None)` when the entity no longer exists in the primary store
    async fn document(&self, entity: &EntityRef) -> Result<Option<IndexDocument>, SerializeError>;
}

/// Serializes entities read from the catalog
pub struct CatalogDocumentSource {
    catalog: Arc<dyn CatalogSource>,
}

impl CatalogDocumentSource {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl DocumentSource for CatalogDocumentSource {
    async fn document(&self, entity: &EntityRef) -> Result<Option<IndexDocument>, SerializeError> {
        if entity.entity_type != PRODUCT_DOC_TYPE {
            return Err(SerializeError::MissingEntityType(entity.entity_type.clone()));
        }

        let product = match self
            .catalog
            .product(entity.entity_id)
            .await
            .map_err(|e| SerializeError::Catalog(e.to_string()))?
        {
            Some(product) => product,
            None => return Ok(None),
        };

        let price_lists = self
            .catalog
            .price_lists()
            .await
            .map_err(|e| SerializeError::Catalog(e.to_string()))?;

        ProductDocument::from_product(&product, &price_lists)?
            .into_index_document()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Template, TreeNodeMembership, Uom};
    use serde_json::json;

    fn product() -> Product {
        let template = Template::new(1, "Bat Mobile", Decimal::from(100))
            .with_description("Batman's ride")
            .with_category(Category::new(3, "Vehicles"))
            .with_uom(Uom::new(1, "Unit", "u"));

        Product::new(10, template)
            .with_code("BM-1")
            .with_attribute("color", "black")
            .with_tree_node(TreeNodeMembership {
                id: 2,
                node_id: 20,
                name: "Gadgets".to_string(),
                sequence: 20,
            })
            .with_tree_node(TreeNodeMembership {
                id: 1,
                node_id: 10,
                name: "Cars".to_string(),
                sequence: 10,
            })
    }

    #[test]
    fn test_product_document_shape() {
        let lists = vec![PriceList::new(1, "Retail"), PriceList::new(2, "Wholesale").with_line(Decimal::ONE, Decimal::new(9, 1))];
        let doc = ProductDocument::from_product(&product().with_active(false), &lists)
            .unwrap()
            .into_index_document()
            .unwrap();

        assert_eq!(doc.id, 10);
        assert_eq!(doc.body["active"], json!("false"));
        assert_eq!(doc.body["displayed_on_eshop"], json!("true"));
        assert_eq!(doc.body["type"], json!("goods"));
        assert_eq!(doc.body["category"]["name"], json!("Vehicles"));
        assert_eq!(doc.body["attributes"]["color"], json!("black"));
        assert_eq!(doc.body["tree_nodes"][0]["name"], json!("Cars"));
        assert_eq!(doc.body["price_lists"].as_array().map(Vec::len), Some(2));
        assert_eq!(doc.text_at("category.name"), Some("Vehicles"));
        assert_eq!(doc.text_at("description"), Some("Batman's ride"));
    }

    #[test]
    fn test_price_lists_use_canonical_quantity() {
        let lists = vec![PriceList::new(7, "Bulk").with_line(Decimal::from(10), Decimal::new(5, 1))];
        let doc = ProductDocument::from_product(&product(), &lists).unwrap();
        assert_eq!(doc.price_lists[0].price, Decimal::from(100));
    }

    #[test]
    fn test_overflowing_price_is_invalid() {
        let mut product = product();
        product.template.list_price = Decimal::MAX;
        let lists = vec![PriceList::new(4, "Markup").with_line(Decimal::ONE, Decimal::from(2))];

        let err = ProductDocument::from_product(&product, &lists).unwrap_err();
        assert!(matches!(err, SerializeError::Invalid(_)));
        assert!(ProductDocument::from_product(&product, &[]).is_ok());
    }

    #[test]
    fn test_missing_uom_is_a_hard_failure() {
        let mut product = product();
        product.template.default_uom = None;

        let err = ProductDocument::from_product(&product, &[]).unwrap_err();
        assert_eq!(
            err,
            SerializeError::MissingRelation {
                entity: "product:10".to_string(),
                relation: "default_uom",
            }
        );
    }

    #[test]
    fn test_gate_flags_round_trip() {
        let doc = ProductDocument::from_product(&product(), &[]).unwrap();
        let parsed: ProductDocument = serde_json::from_value(serde_json::to_value(&doc).unwrap()).unwrap();
        assert!(parsed.active);
        assert!(parsed.displayed_on_eshop);
    }
}
