//! # Product Search Core
//!
//! Library core for natural-language product search: a free-text customer
//! query is turned into a structured intent by a language model, the intent
//! becomes a metadata-filtered similarity search against a vector index of
//! product embeddings, and the matches come back with relevance scores.
//!
//! This crate performs no network I/O. The language model, the embedding
//! model, and the vector index are reached through the [`LanguageModel`],
//! [`Embedder`], and [`VectorIndex`] traits; concrete HTTP clients live in
//! the `product-search` application crate.
//!
//! ## Pipeline
//!
//! ```text
//! raw query ──▶ QueryExtractor ──▶ Retriever ──▶ assemble ──▶ SearchResponse
//!                  (LLM)          (vector index)     ▲
//!                    ▲                ▲              │
//!                    └──── Vocabulary ┴──────────────┘
//! ```
//!
//! [`LanguageModel`]: extract::LanguageModel
//! [`Embedder`]: embedding::Embedder
//! [`VectorIndex`]: index::VectorIndex

pub mod assemble;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod vocabulary;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ConfigError, SearchError, Timeout};
pub use models::{ProductResult, SearchResponse, StructuredQuery};
pub use pipeline::SearchPipeline;
pub use vocabulary::Vocabulary;
