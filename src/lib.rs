//! # Product Search
//!
//! Natural-language product search service. A free-text customer query is
//! handed to a language model, which extracts the product category, brand,
//! specifications, and an English translation; that structured intent then
//! drives a metadata-filtered similarity search against a vector index of
//! product embeddings.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────────┐
//! │   HTTP   │──▶│ SearchPipeline│──▶│ OpenAI chat  │  (extract)
//! │  (axum)  │   │    (core)     │   └──────────────┘
//! └──────────┘   │               │   ┌──────────────┐
//!                │               │──▶│ Astra DB     │  (retrieve)
//!                └───────────────┘   │ + embeddings │
//!                                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`openai`] | Chat-completion and embedding clients |
//! | [`astra`] | Astra DB Data API vector index |
//! | [`service`] | Startup wiring into a [`SearchPipeline`](product_search_core::SearchPipeline) |
//! | [`server`] | HTTP server |
//! | [`logging`] | Tracing subscriber setup |

pub mod astra;
pub mod config;
pub mod logging;
pub mod openai;
pub mod search;
pub mod server;
pub mod service;
pub mod vocab;
