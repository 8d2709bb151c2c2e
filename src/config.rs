use anyhow::{Context, Result};
use product_search_core::retrieve::{BrandPolicy, RetrievalOptions, SearchText};
use product_search_core::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VocabularyConfig {
    #[serde(default = "default_categories_path")]
    pub categories: PathBuf,
    #[serde(default = "default_brands_path")]
    pub brands: PathBuf,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            categories: default_categories_path(),
            brands: default_brands_path(),
        }
    }
}

fn default_categories_path() -> PathBuf {
    PathBuf::from("./data/categories.json")
}
fn default_brands_path() -> PathBuf {
    PathBuf::from("./data/brands_by_category.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default = "default_true")]
    pub filter_by_category: bool,
    #[serde(default)]
    pub search_text: SearchText,
    #[serde(default)]
    pub brand_policy: BrandPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            filter_by_category: true,
            search_text: SearchText::default(),
            brand_policy: BrandPolicy::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn options(&self) -> RetrievalOptions {
        RetrievalOptions {
            top_k: self.top_k,
            score_threshold: self.score_threshold,
            filter_by_category: self.filter_by_category,
            search_text: self.search_text,
            brand_policy: self.brand_policy,
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_score_threshold() -> f64 {
    0.8
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after the first. Zero means one attempt per request.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: 0.0,
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4-1106-preview".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Astra DB Data API endpoint, e.g. `https://<db-id>-<region>.apps.astra.datastax.com`.
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// JSON Lines catalog for the `memory` provider.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            api_endpoint: None,
            keyspace: default_keyspace(),
            collection: default_collection(),
            catalog: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "astra".to_string()
}
fn default_keyspace() -> String {
    "ecommerce".to_string()
}
fn default_collection() -> String {
    "central_openai_en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl IndexConfig {
    pub fn is_astra(&self) -> bool {
        self.provider == "astra"
    }
}

/// Credentials read from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub astra: Option<AstraCredentials>,
}

#[derive(Clone)]
pub struct AstraCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .field(
                "astra_client_id",
                &self.astra.as_ref().map(|a| a.client_id.as_str()),
            )
            .finish()
    }
}

impl Credentials {
    /// Read required credentials from the process environment.
    pub fn from_env(config: &Config) -> Result<Self, ConfigError> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Read required credentials through `lookup`. Blank values count as missing.
    pub fn from_lookup(
        config: &Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };

        let openai_api_key = require("OPENAI_API_KEY")?;
        let astra = if config.index.is_astra() {
            Some(AstraCredentials {
                client_id: require("ASTRA_DB_CLIENT_ID")?,
                client_secret: require("ASTRA_DB_CLIENT_SECRET")?,
            })
        } else {
            None
        };

        Ok(Self {
            openai_api_key,
            astra,
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn invalid(msg: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}

/// Check value ranges and provider-specific requirements.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.retrieval.top_k == 0 {
        return invalid("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.score_threshold) {
        return invalid("retrieval.score_threshold must be in [0.0, 1.0]");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return invalid("llm.temperature must be in [0.0, 2.0]");
    }
    for (section, secs) in [
        ("llm", config.llm.timeout_secs),
        ("embedding", config.embedding.timeout_secs),
        ("index", config.index.timeout_secs),
    ] {
        if secs == 0 {
            return invalid(format!("{}.timeout_secs must be > 0", section));
        }
    }

    match config.index.provider.as_str() {
        "astra" => {
            if config.index.api_endpoint.as_deref().map_or(true, str::is_empty) {
                return invalid("index.api_endpoint must be set when provider is 'astra'");
            }
        }
        "memory" => {
            if config.index.catalog.is_none() {
                return invalid("index.catalog must be set when provider is 'memory'");
            }
        }
        other => {
            return invalid(format!(
                "Unknown index provider: '{}'. Must be astra or memory.",
                other
            ))
        }
    }

    match config.log.format.as_str() {
        "pretty" | "json" => {}
        other => {
            return invalid(format!(
                "Unknown log format: '{}'. Must be pretty or json.",
                other
            ))
        }
    }

    Ok(())
}
