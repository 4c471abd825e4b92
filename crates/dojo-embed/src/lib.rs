//! # dojo-embed
//!
//! Embedding generation for the Sales Dojo knowledge base.
//!
//! Two strategies implement [`dojo_core::Embedder`]:
//!
//! | Strategy | When | Notes |
//! |----------|------|-------|
//! | [`OpenAiEmbedder`] | an API key is configured | `text-embedding-3-small`, 1536 dims |
//! | [`MockEmbedder`] | no key | deterministic blake3-derived unit vectors |
//!
//! The choice is made once, by [`select_embedder`], and the rest of the
//! system only sees the trait.

pub mod mock;
pub mod openai;

pub use mock::MockEmbedder;
pub use openai::OpenAiEmbedder;

use std::sync::Arc;

use dojo_core::{DEFAULT_EMBEDDING_DIMENSION, EmbedError, Embedder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default OpenAI embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider settings used to pick and build an embedder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderSettings {
    /// Provider API key; blank or missing selects the mock embedder
    pub api_key: Option<String>,
    /// Model name sent to the provider
    pub model: String,
    /// Expected embedding length
    pub dimension: usize,
    /// API base URL (without the `/embeddings` suffix)
    pub base_url: String,
    /// Maximum texts per provider request
    pub max_batch_size: usize,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_batch_size: 512,
            timeout_secs: 30,
        }
    }
}

impl EmbedderSettings {
    /// Whether a usable API key is present.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Build the embedder for these settings: the provider client when an API
/// key is present, the mock otherwise.
pub fn select_embedder(settings: &EmbedderSettings) -> Result<Arc<dyn Embedder>, EmbedError> {
    if settings.has_api_key() {
        info!(
            "Using provider embeddings (model: {}, dimension: {})",
            settings.model, settings.dimension
        );
        Ok(Arc::new(OpenAiEmbedder::new(settings)?))
    } else {
        warn!(
            "No embedding API key configured, using mock embeddings (dimension: {})",
            settings.dimension
        );
        Ok(Arc::new(MockEmbedder::with_dimension(settings.dimension)))
    }
}
