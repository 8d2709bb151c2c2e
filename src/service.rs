//! Startup wiring: configuration + credentials → [`SearchPipeline`].
//!
//! Everything built here is a process-wide singleton shared read-only by
//! every request: the vocabulary, the model client, and the index client.

use std::sync::Arc;

use anyhow::{Context, Result};
use product_search_core::embedding::Embedder;
use product_search_core::extract::LanguageModel;
use product_search_core::index::memory::MemoryIndex;
use product_search_core::index::VectorIndex;
use product_search_core::{ConfigError, SearchPipeline, Vocabulary};

use crate::astra::AstraIndex;
use crate::config::{Config, Credentials};
use crate::openai::{OpenAiChatModel, OpenAiEmbedder};

/// Load the vocabulary files named in the config.
pub fn load_vocabulary(config: &Config) -> Result<Vocabulary, ConfigError> {
    Vocabulary::load(&config.vocabulary.categories, &config.vocabulary.brands)
}

/// Build the vector index selected by `[index].provider`.
pub fn create_index(
    config: &Config,
    credentials: &Credentials,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorIndex>> {
    match config.index.provider.as_str() {
        "astra" => {
            let astra = credentials
                .astra
                .as_ref()
                .ok_or(ConfigError::MissingCredential("ASTRA_DB_CLIENT_SECRET"))?;
            Ok(Arc::new(AstraIndex::new(&config.index, astra, embedder)?))
        }
        "memory" => {
            let path = config
                .index
                .catalog
                .as_ref()
                .ok_or_else(|| ConfigError::Invalid("index.catalog is required".to_string()))?;
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
            let products = MemoryIndex::parse_catalog(&text)?;
            tracing::info!(products = products.len(), catalog = %path.display(), "using in-memory index");
            Ok(Arc::new(MemoryIndex::new(embedder, products)))
        }
        other => Err(ConfigError::Invalid(format!("Unknown index provider: {}", other)).into()),
    }
}

/// Assemble the pipeline from config, reading credentials from the environment.
pub fn build_pipeline(config: &Config) -> Result<SearchPipeline> {
    let credentials = Credentials::from_env(config)?;
    build_pipeline_with(config, &credentials)
}

/// Assemble the pipeline with explicit credentials.
pub fn build_pipeline_with(config: &Config, credentials: &Credentials) -> Result<SearchPipeline> {
    let vocabulary = Arc::new(load_vocabulary(config)?);
    tracing::info!(categories = vocabulary.entries().len(), "vocabulary loaded");

    let model: Arc<dyn LanguageModel> =
        Arc::new(OpenAiChatModel::new(&config.llm, &credentials.openai_api_key)?);
    let embedder: Arc<dyn Embedder> =
        Arc::new(OpenAiEmbedder::new(&config.embedding, &credentials.openai_api_key)?);
    let index = create_index(config, credentials, embedder)?;

    Ok(SearchPipeline::new(
        model,
        index,
        vocabulary,
        config.retrieval.options(),
    ))
}
