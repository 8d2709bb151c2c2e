//! Filtered similarity retrieval.
//!
//! A [`StructuredQuery`] becomes a [`RetrievalFilter`] (brand and, optionally,
//! category) plus a search text, and is sent to the [`VectorIndex`] as a
//! single query. Results below the score threshold are dropped; the index's
//! ordering is otherwise kept as-is.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::SearchError;
use crate::index::{RetrievalFilter, ScoredProduct, VectorIndex};
use crate::models::StructuredQuery;
use crate::vocabulary::Vocabulary;

/// Metadata key holding the brand in the index.
pub const BRAND_KEY: &str = "brand";
/// Metadata key holding the localized category name in the index.
pub const CATEGORY_KEY: &str = "product_categories";

/// Which text is embedded for the similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchText {
    /// The customer's text exactly as typed.
    Original,
    /// The model's English translation, falling back to the original.
    #[default]
    Translated,
}

/// When an extracted brand is trusted enough to become a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandPolicy {
    /// Any non-empty brand is used verbatim.
    Any,
    /// The brand must appear in some category's brand list.
    #[default]
    Known,
    /// The brand must appear in the detected category's brand list.
    Category,
}

/// Retrieval tuning, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Maximum candidates requested from the index.
    pub top_k: usize,
    /// Inclusive lower bound on relevance: `score >= score_threshold` is kept.
    pub score_threshold: f64,
    /// Add the localized category to the filter when the category is known.
    pub filter_by_category: bool,
    pub search_text: SearchText,
    pub brand_policy: BrandPolicy,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            score_threshold: 0.8,
            filter_by_category: true,
            search_text: SearchText::Translated,
            brand_policy: BrandPolicy::Known,
        }
    }
}

/// Build the metadata filter for one query.
///
/// - `brand` is present only when the query has a non-blank brand that
///   passes the [`BrandPolicy`]; known brands use the vocabulary's spelling.
/// - `product_categories` is present only when `filter_by_category` is set
///   and the category is in the vocabulary. Unknown categories are silently
///   left out of the filter.
pub fn build_filter(
    query: &StructuredQuery,
    vocabulary: &Vocabulary,
    options: &RetrievalOptions,
) -> RetrievalFilter {
    let mut filter = RetrievalFilter::new();

    if let Some(brand) = query.brand() {
        let resolved = match options.brand_policy {
            BrandPolicy::Any => Some(brand),
            BrandPolicy::Known => vocabulary.known_brand(brand),
            BrandPolicy::Category => vocabulary.known_brand_in(&query.product_category, brand),
        };
        if let Some(b) = resolved {
            filter.insert(BRAND_KEY, b);
        }
    }

    if options.filter_by_category {
        if let Some(localized) = vocabulary.localized(&query.product_category) {
            filter.insert(CATEGORY_KEY, localized);
        }
    }

    filter
}

/// The text to embed for `query` under `mode`.
pub fn search_text(query: &StructuredQuery, mode: SearchText) -> &str {
    match mode {
        SearchText::Original => &query.original_query,
        SearchText::Translated => query.translated_or_original(),
    }
}

/// Keep results with `score >= threshold`, preserving order. NaN is dropped.
pub fn apply_threshold(results: Vec<ScoredProduct>, threshold: f64) -> Vec<ScoredProduct> {
    results
        .into_iter()
        .filter(|r| r.score >= threshold)
        .collect()
}

/// Runs one filtered similarity query per structured query.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    vocabulary: Arc<Vocabulary>,
    options: RetrievalOptions,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        vocabulary: Arc<Vocabulary>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            index,
            vocabulary,
            options,
        }
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Search with the configured `top_k` and `score_threshold`.
    pub async fn retrieve(&self, query: &StructuredQuery) -> Result<Vec<ScoredProduct>, SearchError> {
        self.retrieve_with(query, self.options.top_k, self.options.score_threshold)
            .await
    }

    /// Search with an explicit candidate count and score threshold.
    pub async fn retrieve_with(
        &self,
        query: &StructuredQuery,
        top_k: usize,
        score_threshold: f64,
    ) -> Result<Vec<ScoredProduct>, SearchError> {
        let filter = build_filter(query, &self.vocabulary, &self.options);
        let text = search_text(query, self.options.search_text);

        tracing::debug!(
            index = self.index.name(),
            filter = ?filter,
            search_text = %text,
            top_k,
            "similarity search"
        );

        let mut candidates = self
            .index
            .similarity_search(text, top_k, &filter)
            .await
            .map_err(|e| {
                SearchError::Retrieval(e.context(format!("{} index query failed", self.index.name())))
            })?;

        if candidates.len() > top_k {
            candidates.truncate(top_k);
        }
        let retrieved = candidates.len();
        let kept = apply_threshold(candidates, score_threshold);

        tracing::info!(retrieved, kept = kept.len(), score_threshold, "retrieval complete");
        Ok(kept)
    }
}
