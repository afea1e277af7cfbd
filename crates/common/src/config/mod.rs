//! Configuration management for FinSight
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! Invalid settings (e.g. an inverted plausible-year range) are rejected by
//! [`AppConfig::validate`] at startup; nothing in the per-query hot path
//! revalidates configuration.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Retrieval executor configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Evidence set and answer context bounds
    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// Entity and figure extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Vector store (Qdrant) configuration
    #[serde(default)]
    pub vector: VectorStoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation (LLM) configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Results requested per sub-query
    #[serde(default = "default_top_k")]
    pub top_k_per_subquery: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on a transient failure
    #[serde(default = "default_search_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvidenceConfig {
    /// Maximum chunks kept in an evidence set
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Aggregate character budget for assembled context
    #[serde(default = "default_context_budget")]
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Earliest plausible filing year
    #[serde(default = "default_min_year")]
    pub min_year: i32,

    /// Latest plausible filing year
    #[serde(default = "default_max_year")]
    pub max_year: i32,

    /// Figures below this confidence never feed a calculation
    #[serde(default = "default_min_figure_confidence")]
    pub min_figure_confidence: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Qdrant base URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Collection holding the filing chunks
    #[serde(default = "default_collection")]
    pub collection: String,

    /// API key (optional for local instances)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Maximum answer tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_top_k() -> usize {
    5
}
fn default_search_timeout() -> u64 {
    10
}
fn default_search_retries() -> u32 {
    2
}
fn default_max_chunks() -> usize {
    10
}
fn default_context_budget() -> usize {
    10_000
}
fn default_min_year() -> i32 {
    2020
}
fn default_max_year() -> i32 {
    2025
}
fn default_min_figure_confidence() -> f32 {
    0.35
}
fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "financial_documents".to_string()
}
fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_embedding_retries() -> u32 {
    3
}
fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_temperature() -> f32 {
    0.1
}
fn default_llm_max_tokens() -> usize {
    1000
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_service_name() -> String {
    "finsight".to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_per_subquery: default_top_k(),
            timeout_secs: default_search_timeout(),
            max_retries: default_search_retries(),
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_chunks: default_max_chunks(),
            max_context_chars: default_context_budget(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_year: default_min_year(),
            max_year: default_max_year(),
            min_figure_confidence: default_min_figure_confidence(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            evidence: EvidenceConfig::default(),
            extraction: ExtractionConfig::default(),
            vector: VectorStoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__TOP_K_PER_SUBQUERY=8
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate settings that would otherwise poison the per-query path.
    ///
    /// Called once at startup; a failure here is fatal.
    pub fn validate(&self) -> crate::errors::Result<()> {
        if self.extraction.min_year > self.extraction.max_year {
            return Err(crate::errors::AppError::Configuration {
                message: format!(
                    "plausible year range is inverted: {}..={}",
                    self.extraction.min_year, self.extraction.max_year
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.extraction.min_figure_confidence) {
            return Err(crate::errors::AppError::Configuration {
                message: format!(
                    "min_figure_confidence must be within [0, 1], got {}",
                    self.extraction.min_figure_confidence
                ),
            });
        }
        if self.retrieval.top_k_per_subquery == 0 || self.evidence.max_chunks == 0 {
            return Err(crate::errors::AppError::Configuration {
                message: "top_k_per_subquery and max_chunks must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get the per-call search timeout as Duration
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval.timeout_secs)
    }
}
