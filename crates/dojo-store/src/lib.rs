//! Vector storage for the knowledge base.
//!
//! Two implementations of [`VectorStore`](dojo_core::VectorStore):
//!
//! - [`MemoryStore`]: always available; brute-force cosine search over a
//!   locked `HashMap`, with snapshot export for file persistence
//! - `LanceStore` (feature `lancedb`): a single `LanceDB` table shared by
//!   all companies, filtered by `company_id` on every call
//!
//! # Example
//!
//! ```rust,ignore
//! use dojo_store::LanceStore;
//! use dojo_core::{SearchQuery, VectorStore};
//!
//! let store = LanceStore::new("data/knowledge.lance".into(), 1536);
//! store.init().await?;
//!
//! store.insert_many(&company, &entries).await?;
//! let hits = store.similarity_search(&company, &SearchQuery::new(embedding)).await?;
//! ```

#[cfg(feature = "lancedb")]
pub mod lance;
pub mod memory;

#[cfg(feature = "lancedb")]
pub use lance::LanceStore;
pub use memory::MemoryStore;

use std::collections::HashSet;

use dojo_core::{CompanyId, KnowledgeEntry, StoreError};

/// Reject embeddings whose length differs from the store's dimension.
pub(crate) fn check_dimension(dimension: usize, embedding: &[f32]) -> Result<(), StoreError> {
    if embedding.len() == dimension {
        Ok(())
    } else {
        Err(StoreError::DimensionMismatch {
            expected: dimension,
            actual: embedding.len(),
        })
    }
}

/// Check a whole insert batch before anything is written.
///
/// Every entry must belong to `company_id`, carry an embedding of the store's
/// dimension and have an id that appears only once in the batch.
pub(crate) fn validate_batch(
    dimension: usize,
    company_id: &CompanyId,
    entries: &[KnowledgeEntry],
) -> Result<(), StoreError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.id) {
            return Err(StoreError::Insert(format!(
                "entry {} appears more than once in the batch",
                entry.id
            )));
        }
        if entry.company_id != *company_id {
            return Err(StoreError::Insert(format!(
                "entry {} belongs to company {}, not {}",
                entry.id, entry.company_id, company_id
            )));
        }
        check_dimension(dimension, &entry.embedding)?;
    }
    Ok(())
}
