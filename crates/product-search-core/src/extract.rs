//! Query extraction: free text → [`StructuredQuery`] via a language model.
//!
//! The model is asked for a JSON object matching an explicit schema whose
//! category field documents the closed category list. The model is free to
//! ignore that list, so only the *shape* of its answer is validated here;
//! out-of-vocabulary values pass through untouched.
//!
//! Exactly one model call is made per query. Retries, if any, are the
//! model client's policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::SearchError;
use crate::models::StructuredQuery;
use crate::vocabulary::Vocabulary;

/// Instruction prompt sent as the system message.
pub const SYSTEM_PROMPT: &str = "You are a helpful customer service assistant at a home improvement store, \
picking products for a customer. Translate the query to English if it is not in English.\n\
Extract the product category, brand name, and product specs such as size, color, etc. \
from the customer's query.\n";

/// Name under which the schema is registered with the model.
pub const SCHEMA_NAME: &str = "product_search_query";

/// A structured-output call: prompt, user text, and the JSON schema the
/// answer must follow.
#[derive(Debug, Clone)]
pub struct StructuredOutputRequest<'a> {
    pub system_prompt: &'a str,
    pub user_message: &'a str,
    pub schema_name: &'a str,
    pub schema: &'a Value,
}

/// A chat model with a structured-decoding interface.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4-1106-preview"`).
    fn model_name(&self) -> &str;

    /// Run one completion and return the model's answer as a JSON value.
    async fn structured_output(&self, request: &StructuredOutputRequest<'_>) -> Result<Value>;
}

/// Turns raw customer queries into [`StructuredQuery`] values.
pub struct QueryExtractor {
    model: Arc<dyn LanguageModel>,
    schema: Value,
}

impl QueryExtractor {
    /// Build an extractor whose schema advertises the vocabulary's categories.
    pub fn new(model: Arc<dyn LanguageModel>, vocabulary: &Vocabulary) -> Self {
        Self {
            model,
            schema: query_schema(vocabulary),
        }
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Extract structured intent from one raw query.
    pub async fn extract(&self, raw_query: &str) -> Result<StructuredQuery, SearchError> {
        let request = StructuredOutputRequest {
            system_prompt: SYSTEM_PROMPT,
            user_message: raw_query,
            schema_name: SCHEMA_NAME,
            schema: &self.schema,
        };

        let output = self
            .model
            .structured_output(&request)
            .await
            .with_context(|| format!("language model {} call failed", self.model.model_name()))
            .map_err(SearchError::Extraction)?;

        parse_extraction(raw_query, output).map_err(SearchError::Extraction)
    }
}

/// JSON schema describing the structured query the model must return.
pub fn query_schema(vocabulary: &Vocabulary) -> Value {
    let categories: Vec<&str> = vocabulary.categories().collect();
    json!({
        "type": "object",
        "properties": {
            "translated_query": {
                "type": "string",
                "description": "The customer's query translated to English; repeat it unchanged if already in English."
            },
            "product_category": {
                "type": "string",
                "description": format!("Product category. Available categories: {}", categories.join(", "))
            },
            "brand": {
                "type": "string",
                "description": "Product's brand name; empty if the query names no brand."
            },
            "specs": {
                "type": "object",
                "description": "Product's specifications such as size, color, or material.",
                "additionalProperties": { "type": "string" }
            }
        },
        "required": ["product_category"]
    })
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    product_category: String,
    #[serde(default)]
    translated_query: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    specs: Option<Map<String, Value>>,
}

/// Validate the model's answer shape and build a [`StructuredQuery`].
///
/// Only types are checked. Spec values may be any JSON scalar and are
/// stringified; nulls are dropped; nested arrays or objects are rejected.
pub fn parse_extraction(raw_query: &str, output: Value) -> Result<StructuredQuery> {
    if !output.is_object() {
        bail!("model output is not a JSON object: {}", output);
    }
    let raw: RawExtraction =
        serde_json::from_value(output).context("model output does not match the query shape")?;

    let mut specs = BTreeMap::new();
    for (key, value) in raw.specs.unwrap_or_default() {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => return Err(anyhow!("spec {:?} has a non-scalar value: {}", key, other)),
        };
        specs.insert(key, text);
    }

    let brand = raw
        .brand
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    let translated_query = raw
        .translated_query
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(StructuredQuery {
        original_query: raw_query.to_string(),
        translated_query,
        product_category: raw.product_category.trim().to_string(),
        brand,
        specs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{vocabulary, MockModel};

    #[test]
    fn test_schema_lists_categories() {
        let schema = query_schema(&vocabulary());
        let desc = schema["properties"]["product_category"]["description"]
            .as_str()
            .unwrap();
        assert!(desc.contains("hand tools"));
        assert!(desc.contains("power tools"));
        assert_eq!(schema["required"], json!(["product_category"]));
    }

    #[test]
    fn test_parse_full_answer() {
        let q = parse_extraction(
            "ไขควงสีแดง",
            json!({
                "translated_query": "red screwdriver",
                "product_category": "hand tools",
                "brand": "Stanley",
                "specs": {"color": "red", "pieces": 6, "magnetic": true, "length": null}
            }),
        )
        .unwrap();
        assert_eq!(q.original_query, "ไขควงสีแดง");
        assert_eq!(q.translated_query.as_deref(), Some("red screwdriver"));
        assert_eq!(q.brand.as_deref(), Some("Stanley"));
        assert_eq!(q.specs["color"], "red");
        assert_eq!(q.specs["pieces"], "6");
        assert_eq!(q.specs["magnetic"], "true");
        assert!(!q.specs.contains_key("length"));
    }

    #[test]
    fn test_parse_minimal_answer() {
        let q = parse_extraction("paint", json!({"product_category": "paint"})).unwrap();
        assert_eq!(q.brand, None);
        assert_eq!(q.translated_query, None);
        assert!(q.specs.is_empty());
    }

    #[test]
    fn test_empty_brand_becomes_none() {
        let q = parse_extraction(
            "red screwdriver set",
            json!({"product_category": "hand tools", "brand": "", "specs": {}}),
        )
        .unwrap();
        assert_eq!(q.brand, None);
    }

    #[test]
    fn test_out_of_vocabulary_category_passes_through() {
        let q = parse_extraction(
            "hammock",
            json!({"product_category": "garden furniture", "brand": "Acme"}),
        )
        .unwrap();
        assert_eq!(q.product_category, "garden furniture");
        assert_eq!(q.brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_shape_errors() {
        assert!(parse_extraction("q", json!("hand tools")).is_err());
        assert!(parse_extraction("q", json!({"brand": "Bosch"})).is_err());
        assert!(parse_extraction("q", json!({"product_category": 7})).is_err());
        assert!(parse_extraction("q", json!({"product_category": "x", "specs": ["red"]})).is_err());
        assert!(
            parse_extraction("q", json!({"product_category": "x", "specs": {"c": ["red"]}}))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_extract_sends_prompt_and_schema() {
        let model = Arc::new(MockModel::answering(json!({"product_category": "hand tools"})));
        let extractor = QueryExtractor::new(model.clone(), &vocabulary());
        let q = extractor.extract("screwdriver").await.unwrap();
        assert_eq!(q.product_category, "hand tools");
        assert_eq!(model.calls(), 1);

        let seen = model.last_request().unwrap();
        assert_eq!(seen.user_message, "screwdriver");
        assert_eq!(seen.system_prompt, SYSTEM_PROMPT);
        assert_eq!(&seen.schema, extractor.schema());
    }

    #[tokio::test]
    async fn test_model_failure_is_extraction_error() {
        let model = Arc::new(MockModel::timing_out());
        let extractor = QueryExtractor::new(model.clone(), &vocabulary());
        let err = extractor.extract("screwdriver").await.unwrap_err();
        assert!(matches!(err, SearchError::Extraction(_)));
        assert!(err.is_timeout());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_answer_mentioning_timeout_is_a_shape_error() {
        let model = Arc::new(MockModel::answering(json!("sorry, the lookup timed out")));
        let extractor = QueryExtractor::new(model, &vocabulary());
        let err = extractor.extract("screwdriver").await.unwrap_err();
        assert!(matches!(err, SearchError::Extraction(_)));
        assert!(err.to_string().contains("timed out"));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_unparseable_output_is_extraction_error() {
        let model = Arc::new(MockModel::answering(json!({"category": "hand tools"})));
        let extractor = QueryExtractor::new(model, &vocabulary());
        let err = extractor.extract("screwdriver").await.unwrap_err();
        assert!(matches!(err, SearchError::Extraction(_)));
    }
}
