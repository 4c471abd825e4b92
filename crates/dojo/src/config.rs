//! Configuration handling for the dojo CLI.
//!
//! Settings come from `config.toml` in the config directory (or `--config`),
//! with every field optional. `OPENAI_API_KEY` fills a missing API key.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use dojo_core::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_READY_MIN_ENTRIES};
use dojo_embed::{DEFAULT_BASE_URL, DEFAULT_MODEL, EmbedderSettings};
use dojo_ingest::{DEFAULT_MAX_UPLOAD_BYTES, IngestConfig};
use dojo_retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Search defaults
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Upload and readiness limits
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Storage backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider API key; without one the mock embedder is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Vector length; must match any existing store
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Texts per provider request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_batch_size() -> usize {
    512
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            dimension: default_dimension(),
            base_url: default_base_url(),
            max_batch_size: default_max_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn to_settings(&self) -> EmbedderSettings {
        EmbedderSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            dimension: self.dimension,
            base_url: self.base_url.clone(),
            max_batch_size: self.max_batch_size,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length (characters)
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

/// Knowledge base limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Entries needed before a company's knowledge base counts as ready
    #[serde(default = "default_ready_min_entries")]
    pub ready_min_entries: u64,

    /// Largest accepted upload (bytes)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_ready_min_entries() -> u64 {
    DEFAULT_READY_MIN_ENTRIES
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            ready_min_entries: default_ready_min_entries(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Which store implementation backs the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-memory store persisted as a JSON snapshot
    #[default]
    Memory,
    /// `LanceDB` table (requires the `lancedb` feature)
    Lance,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Store location; defaults to a file under the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the store location for the configured backend.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.path {
            return Some(path.clone());
        }
        let file = match self.backend {
            StoreBackend::Memory => "knowledge.json",
            StoreBackend::Lance => "knowledge.lance",
        };
        data_dir().map(|dir| dir.join(file))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (overridden by `RUST_LOG` and `--verbose`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load from the default config path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path`, or from the default config path when `None`.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(Self::config_path);

        let mut config = match path {
            Some(ref path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::parse(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be greater than zero");
        }
        if self.chunking.max_chunk_size == 0 {
            anyhow::bail!("chunking.max_chunk_size must be greater than zero");
        }
        if self.embedding.max_batch_size == 0 {
            anyhow::bail!("embedding.max_batch_size must be greater than zero");
        }
        Ok(())
    }

    /// Fill unset values from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_missing = self
            .embedding
            .api_key
            .as_deref()
            .is_none_or(|key| key.trim().is_empty());
        if key_missing {
            if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
                self.embedding.api_key = Some(key);
            }
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_chunk_size: self.chunking.max_chunk_size,
            max_upload_bytes: self.knowledge.max_upload_bytes,
            ready_min_entries: self.knowledge.ready_min_entries,
        }
    }

    /// Path of the default config file.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Commented sample configuration.
    pub fn sample_toml() -> &'static str {
        r#"# Sales Dojo knowledge base configuration

[embedding]
# api_key = "sk-..."            # or set OPENAI_API_KEY; without a key mock embeddings are used
model = "text-embedding-3-small"
dimension = 1536
base_url = "https://api.openai.com/v1"
max_batch_size = 512
timeout_secs = 30

[chunking]
max_chunk_size = 1000           # characters

[retrieval]
similarity_threshold = 0.75     # hits must score strictly above this
max_results = 3
enrich_limit = 2                # results folded into enriched prompts
history_turns = 3               # conversation turns added to the enrichment query

[knowledge]
ready_min_entries = 5
max_upload_bytes = 52428800     # 50 MiB

[store]
backend = "memory"              # "memory" (JSON snapshot) or "lance"
# path = "/var/lib/dojo/knowledge.json"

[logging]
level = "info"
# file = "/var/log/dojo.log"
"#
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Get the XDG data directory for dojo.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOJO_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "dojo").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the XDG config directory for dojo.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOJO_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "dojo").map(|dirs| dirs.config_dir().to_path_buf())
}
