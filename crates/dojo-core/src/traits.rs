//! Core traits for knowledge base components.
//!
//! - [`TextExtractor`]: Turn uploaded bytes into plain text
//! - [`Embedder`]: Generate vector embeddings
//! - [`VectorStore`]: Persist and search tenant-scoped entries
//!
//! Every [`VectorStore`] method takes the [`CompanyId`] explicitly. There is
//! no call that reads or deletes across tenants.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{EmbedError, ExtractError, StoreError};
use crate::types::{CompanyId, KnowledgeEntry, KnowledgeStats, ScoredEntry, SearchQuery};

// ============================================================================
// Text Extraction
// ============================================================================

/// Trait for extracting plain text from an uploaded file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lowercase extensions (without the dot) this extractor handles.
    fn extensions(&self) -> &[&str];

    /// Extract text from the file contents. `filename` is used for error
    /// messages only.
    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Embed many texts. The output has one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let results = self.embed_batch(&[text]).await?;
        let received = results.len();
        results
            .into_iter()
            .next()
            .ok_or(EmbedError::BatchMismatch { sent: 1, received })
    }
}

// ============================================================================
// Vector Storage
// ============================================================================

/// Trait for tenant-scoped vector storage and search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepare the backing storage. Safe to call more than once.
    async fn init(&self) -> Result<(), StoreError>;

    /// Persist a batch of entries as one unit.
    ///
    /// Every entry must belong to `company_id` and carry an embedding of the
    /// store's dimension. If any entry is rejected nothing is written, and
    /// readers never observe part of a batch.
    async fn insert_many(
        &self,
        company_id: &CompanyId,
        entries: &[KnowledgeEntry],
    ) -> Result<u64, StoreError>;

    /// Rank the company's entries against the query embedding.
    ///
    /// Only hits scoring strictly above `query.threshold` are returned, best
    /// first (newest first on ties), at most `query.limit` of them.
    async fn similarity_search(
        &self,
        company_id: &CompanyId,
        query: &SearchQuery,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Fetch one entry.
    async fn get_entry(
        &self,
        company_id: &CompanyId,
        id: Uuid,
    ) -> Result<Option<KnowledgeEntry>, StoreError>;

    /// Swap an entry's content and embedding together.
    ///
    /// Returns [`StoreError::NotFound`] if the company has no such entry.
    async fn replace_content(
        &self,
        company_id: &CompanyId,
        id: Uuid,
        content: &str,
        embedding: &[f32],
    ) -> Result<KnowledgeEntry, StoreError>;

    /// Delete one entry, or [`StoreError::NotFound`].
    async fn delete_entry(&self, company_id: &CompanyId, id: Uuid) -> Result<(), StoreError>;

    /// Delete every entry of `source_name`; returns how many were removed.
    async fn delete_by_source(
        &self,
        company_id: &CompanyId,
        source_name: &str,
    ) -> Result<u64, StoreError>;

    /// Summarize the company's entries.
    async fn stats(
        &self,
        company_id: &CompanyId,
        ready_min_entries: u64,
    ) -> Result<KnowledgeStats, StoreError>;
}
