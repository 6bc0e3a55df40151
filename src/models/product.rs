use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumString};
use validator::Validate;

/// Unit of measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uom {
    pub id: i64,
    pub name: String,
    pub symbol: String,
}

impl Uom {
    pub fn new(id: i64, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// Flat product category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Membership of a product in a hierarchical navigation tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNodeMembership {
    /// Membership record id
    pub id: i64,

    /// Tree node the product is placed under
    pub node_id: i64,

    /// Display name of the node
    pub name: String,

    /// Ordering of the product inside the node
    pub sequence: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductType {
    #[default]
    Goods,
    Assets,
    Service,
}

/// Scalar value of a dynamic product attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl AttributeValue {
    /// Exact-match term used for filtering and faceting
    pub fn as_term(&self) -> String {
        match self {
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Number(n) => n.to_string(),
            AttributeValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_term())
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value.into())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Product template shared by all of its variants
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Template {
    pub id: i64,

    #[validate(length(min = 1, max = 500))]
    pub name: String,

    pub product_type: ProductType,

    pub description: Option<String>,

    pub list_price: Decimal,

    pub category: Option<Category>,

    /// Sale unit; required to price the product
    pub default_uom: Option<Uom>,
}

impl Template {
    pub fn new(id: i64, name: impl Into<String>, list_price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            product_type: ProductType::Goods,
            description: None,
            list_price,
            category: None,
            default_uom: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_uom(mut self, uom: Uom) -> Self {
        self.default_uom = Some(uom);
        self
    }
}

/// Sellable product variant, the unit that gets indexed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Product {
    pub id: i64,

    pub template: Template,

    pub code: Option<String>,

    pub description: Option<String>,

    /// Use the template description instead of the variant's own
    pub use_template_description: bool,

    pub active: bool,

    pub displayed_on_eshop: bool,

    /// Storefront slug
    pub uri: Option<String>,

    pub tree_nodes: Vec<TreeNodeMembership>,

    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Product {
    /// Create an active, web-visible variant of a template
    pub fn new(id: i64, template: Template) -> Self {
        Self {
            id,
            template,
            code: None,
            description: None,
            use_template_description: true,
            active: true,
            displayed_on_eshop: true,
            uri: None,
            tree_nodes: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_own_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self.use_template_description = false;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_tree_node(mut self, membership: TreeNodeMembership) -> Self {
        self.tree_nodes.push(membership);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_displayed_on_eshop(mut self, displayed: bool) -> Self {
        self.displayed_on_eshop = displayed;
        self
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn list_price(&self) -> Decimal {
        self.template.list_price
    }

    pub fn category(&self) -> Option<&Category> {
        self.template.category.as_ref()
    }

    pub fn default_uom(&self) -> Option<&Uom> {
        self.template.default_uom.as_ref()
    }

    /// Description shown to shoppers, honouring the template override flag
    pub fn effective_description(&self) -> Option<&str> {
        if self.use_template_description {
            self.template.description.as_deref()
        } else {
            self.description.as_deref()
        }
    }

    /// Whether the storefront may ever show this product
    pub fn is_web_visible(&self) -> bool {
        self.active && self.displayed_on_eshop
    }
}

/// Quantity break inside a price list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListLine {
    /// Smallest quantity this line applies to
    pub min_quantity: Decimal,

    /// Multiplier applied to the unit price
    pub factor: Decimal,
}

/// Customer price list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: i64,
    pub name: String,
    pub lines: Vec<PriceListLine>,
}

impl PriceList {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, min_quantity: Decimal, factor: Decimal) -> Self {
        self.lines.push(PriceListLine {
            min_quantity,
            factor,
        });
        self
    }

    /// Unit price once `quantity` units are ordered.
    ///
    /// The first line whose minimum quantity is met wins; a list without a
    /// matching line leaves the unit price unchanged. `None` when the result
    /// does not fit a `Decimal`.
    pub fn compute(&self, unit_price: Decimal, quantity: Decimal) -> Option<Decimal> {
        match self.lines.iter().find(|line| quantity >= line.min_quantity) {
            Some(line) => unit_price.checked_mul(line.factor),
            None => Some(unit_price),
        }
    }
}
