//! In-memory [`VectorIndex`] for tests and small local catalogs.
//!
//! Brute-force relevance scoring over every stored vector. Products are
//! loaded once up front; there is no write path after construction.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{RetrievalFilter, ScoredProduct, VectorIndex};
use crate::embedding::{relevance_score, Embedder};

/// A product embedding with the metadata stored alongside it.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexedProduct {
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// In-memory product index.
pub struct MemoryIndex {
    embedder: Arc<dyn Embedder>,
    products: Vec<IndexedProduct>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>, products: Vec<IndexedProduct>) -> Self {
        Self { embedder, products }
    }

    /// Parse a JSON Lines catalog: one `{"vector": [...], "metadata": {...}}`
    /// object per line. Blank lines are skipped.
    ///
    /// Every vector must be non-empty and share the first record's dimension.
    pub fn parse_catalog(text: &str) -> Result<Vec<IndexedProduct>> {
        let mut products = Vec::new();
        let mut dimension = None;

        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let product: IndexedProduct = serde_json::from_str(line)
                .with_context(|| format!("invalid catalog record on line {}", i + 1))?;

            let len = product.vector.len();
            if len == 0 {
                bail!("catalog record on line {} has an empty vector", i + 1);
            }
            match dimension {
                None => dimension = Some(len),
                Some(d) if d != len => bail!(
                    "catalog record on line {} has dimension {}, expected {}",
                    i + 1,
                    len,
                    d
                ),
                Some(_) => {}
            }
            products.push(product);
        }

        Ok(products)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<ScoredProduct>> {
        let query_vec = self.embedder.embed(text).await?;

        if let Some(p) = self
            .products
            .iter()
            .find(|p| p.vector.len() != query_vec.len())
        {
            bail!(
                "{} embeddings have dimension {}, catalog product {} has {}",
                self.embedder.model_name(),
                query_vec.len(),
                p.metadata.get("product_id").unwrap_or(&Value::Null),
                p.vector.len()
            );
        }

        let mut scored: Vec<ScoredProduct> = self
            .products
            .iter()
            .filter(|p| filter.matches(&p.metadata))
            .map(|p| ScoredProduct {
                metadata: p.metadata.clone(),
                score: relevance_score(&query_vec, &p.vector),
            })
            .collect();

        // Stable sort: ties keep catalog order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }
}
