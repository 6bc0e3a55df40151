use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Ordering of facet buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisplayOrder {
    #[default]
    CountDesc,
    CountAsc,
    TermAsc,
    TermDesc,
}

/// Administrator-managed attribute that may be filtered and faceted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FilterableAttribute {
    /// Attribute key, as used in product attribute maps and query strings
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default = "default_true")]
    pub filterable: bool,

    /// Show every value instead of the top `display_size`
    #[serde(default)]
    pub multiselect: bool,

    /// Show per-value counts in the filter UI
    #[serde(default = "default_true")]
    pub display_count: bool,

    #[serde(default = "default_display_size")]
    #[validate(range(min = 1))]
    pub display_size: usize,

    #[serde(default)]
    pub display_order: DisplayOrder,
}

impl FilterableAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filterable: true,
            multiselect: false,
            display_count: true,
            display_size: default_display_size(),
            display_order: DisplayOrder::default(),
        }
    }

    pub fn multiselect(mut self, multiselect: bool) -> Self {
        self.multiselect = multiselect;
        self
    }

    pub fn display_count(mut self, display_count: bool) -> Self {
        self.display_count = display_count;
        self
    }

    pub fn display_size(mut self, size: usize) -> Self {
        self.display_size = size;
        self
    }

    pub fn display_order(mut self, order: DisplayOrder) -> Self {
        self.display_order = order;
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    /// Field path of this attribute inside an indexed document
    pub fn field(&self) -> String {
        format!("attributes.{}", self.name)
    }
}

fn default_true() -> bool {
    true
}

fn default_display_size() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_from_partial_json() {
        let attr: FilterableAttribute = serde_json::from_str(r#"{"name": "color"}"#).unwrap();
        assert!(attr.filterable);
        assert!(!attr.multiselect);
        assert_eq!(attr.display_size, 10);
        assert_eq!(attr.display_order, DisplayOrder::CountDesc);
        assert_eq!(attr.field(), "attributes.color");
    }

    #[test]
    fn test_display_order_strings() {
        assert_eq!(DisplayOrder::TermAsc.to_string(), "term_asc");
        assert_eq!(DisplayOrder::from_str("count_asc").unwrap(), DisplayOrder::CountAsc);
    }

    #[test]
    fn test_validation_rejects_zero_size() {
        let attr = FilterableAttribute::new("size").display_size(0);
        assert!(attr.validate().is_err());
    }
}
