//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only thing the retriever knows about the
//! product index: a relevance-scored nearest-neighbour search restricted by
//! a metadata equality filter. Implementations are read-only from the
//! pipeline's point of view and must be `Send + Sync` so one instance can be
//! shared by every request.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// Metadata equality filter for one similarity query.
///
/// Built per request and used once. Keys are metadata field names as stored
/// in the index (e.g. `brand`, `product_categories`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RetrievalFilter(BTreeMap<String, String>);

impl RetrievalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every filter entry equals the matching metadata field.
    ///
    /// String fields compare directly; other scalars compare by their JSON
    /// text, so a filter value `"3"` matches a stored number `3`.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.0.iter().all(|(k, want)| match metadata.get(k) {
            Some(Value::String(s)) => s == want,
            Some(Value::Null) | None => false,
            Some(Value::Array(_)) | Some(Value::Object(_)) => false,
            Some(other) => other.to_string() == *want,
        })
    }
}

/// A product returned by the index along with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
    /// All metadata fields stored alongside the product's embedding.
    pub metadata: Map<String, Value>,
    /// Relevance in `[0, 1]`; higher is more relevant.
    pub score: f64,
}

/// Relevance-scored similarity search over product embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for logs (e.g. `"astra"`, `"memory"`).
    fn name(&self) -> &str;

    /// Return up to `k` products most similar to `text` that satisfy
    /// `filter`, ordered by descending relevance.
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<ScoredProduct>>;
}
