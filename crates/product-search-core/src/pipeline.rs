//! Request pipeline: extract → retrieve → assemble, strictly in sequence.
//!
//! A failure at any stage aborts the request with that stage's error; no
//! partial response is ever built. Retrieval never starts before extraction
//! has succeeded.

use std::sync::Arc;

use tracing::Instrument;

use crate::assemble::assemble;
use crate::error::SearchError;
use crate::extract::{LanguageModel, QueryExtractor};
use crate::index::VectorIndex;
use crate::models::SearchResponse;
use crate::retrieve::{RetrievalOptions, Retriever};
use crate::vocabulary::Vocabulary;

/// The composed search pipeline. Build once at startup and share.
pub struct SearchPipeline {
    extractor: QueryExtractor,
    retriever: Retriever,
    vocabulary: Arc<Vocabulary>,
}

impl SearchPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        index: Arc<dyn VectorIndex>,
        vocabulary: Arc<Vocabulary>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            extractor: QueryExtractor::new(model, &vocabulary),
            retriever: Retriever::new(index, vocabulary.clone(), options),
            vocabulary,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn options(&self) -> &RetrievalOptions {
        self.retriever.options()
    }

    /// Run one raw query through the whole pipeline.
    pub async fn handle(&self, raw_query: &str) -> Result<SearchResponse, SearchError> {
        let span = tracing::info_span!("search", query = %raw_query);
        async {
            let query = self.extractor.extract(raw_query).await.inspect_err(|e| {
                tracing::warn!(error = %e, "extraction failed");
            })?;
            tracing::debug!(
                category = %query.product_category,
                brand = ?query.brand,
                known_category = self.vocabulary.contains_category(&query.product_category),
                "extracted query"
            );

            let results = self.retriever.retrieve(&query).await.inspect_err(|e| {
                tracing::warn!(error = %e, "retrieval failed");
            })?;

            Ok(assemble(query, results, &self.vocabulary))
        }
        .instrument(span)
        .await
    }
}
