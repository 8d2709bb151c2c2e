//! Data types that flow through one search request.
//!
//! None of these outlive the request that created them; only the
//! [`Vocabulary`](crate::vocabulary::Vocabulary) lives for the whole process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Search intent extracted from a free-text customer query.
///
/// `product_category` is whatever the language model produced. It is not
/// checked against the vocabulary here; an unknown category simply never
/// becomes a filter and yields no available brands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// The text the customer typed, untouched.
    pub original_query: String,
    /// English rendition of the query, when the model produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_query: Option<String>,
    /// Canonical (English) category name.
    pub product_category: String,
    /// Brand name, `None` when the query names no brand.
    #[serde(default)]
    pub brand: Option<String>,
    /// Free-form specifications such as size or color.
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
}

impl StructuredQuery {
    /// The brand, if present and non-blank.
    pub fn brand(&self) -> Option<&str> {
        self.brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// The translated text when present and non-blank, else the original.
    pub fn translated_or_original(&self) -> &str {
        self.translated_query
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.original_query)
    }
}

/// One returned product: its stored metadata plus a stringified `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductResult {
    pub fields: Map<String, Value>,
}

impl ProductResult {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The `score` field as sent over the wire.
    pub fn score(&self) -> Option<&str> {
        self.fields.get("score").and_then(Value::as_str)
    }
}

/// The body returned for a successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<ProductResult>,
    pub query: StructuredQuery,
    pub available_brands: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(brand: Option<&str>, translated: Option<&str>) -> StructuredQuery {
        StructuredQuery {
            original_query: "สว่านไร้สาย".to_string(),
            translated_query: translated.map(String::from),
            product_category: "power tools".to_string(),
            brand: brand.map(String::from),
            specs: BTreeMap::new(),
        }
    }

    #[test]
    fn test_blank_brand_is_absent() {
        assert_eq!(query(Some("  "), None).brand(), None);
        assert_eq!(query(Some(""), None).brand(), None);
        assert_eq!(query(None, None).brand(), None);
        assert_eq!(query(Some(" Bosch "), None).brand(), Some("Bosch"));
    }

    #[test]
    fn test_translated_falls_back_to_original() {
        assert_eq!(query(None, None).translated_or_original(), "สว่านไร้สาย");
        assert_eq!(query(None, Some("")).translated_or_original(), "สว่านไร้สาย");
        assert_eq!(
            query(None, Some("cordless drill")).translated_or_original(),
            "cordless drill"
        );
    }

    #[test]
    fn test_query_serializes_flat() {
        let json = serde_json::to_value(query(None, None)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("original_query"));
        assert!(obj.contains_key("product_category"));
        assert!(!obj.contains_key("translated_query"));
        assert!(obj["brand"].is_null());
        assert!(obj["specs"].as_object().unwrap().is_empty());
    }
}
