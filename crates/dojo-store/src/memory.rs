//! In-memory store.
//!
//! [`MemoryStore`] keeps entries in a `HashMap` behind a single `RwLock` and
//! searches by brute-force cosine similarity. Every mutating call validates
//! its whole input first and then applies it under one write lock, which is
//! what makes batch inserts and source deletes atomic for readers.
//!
//! The store can be seeded from and dumped to a list of entries, which the
//! CLI uses to persist it as a JSON file between runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dojo_core::similarity::{cosine_similarity, rank};
use dojo_core::{
    CompanyId, KnowledgeEntry, KnowledgeStats, ScoredEntry, SearchQuery, StoreError, VectorStore,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{check_dimension, validate_batch};

/// In-memory vector store.
///
/// # Example
///
/// ```rust
/// use dojo_core::{CompanyId, VectorStore};
/// use dojo_store::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new(1536);
/// store.init().await?;
///
/// let stats = store.stats(&CompanyId::new(), 5).await?;
/// assert_eq!(stats.total_entries, 0);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    dimension: usize,
    entries: Arc<RwLock<HashMap<Uuid, KnowledgeEntry>>>,
}

impl MemoryStore {
    /// Create an empty store for embeddings of `dimension`.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a store pre-populated with `entries`.
    ///
    /// Fails if any entry's embedding has the wrong length or an id repeats.
    pub fn from_entries(
        dimension: usize,
        entries: Vec<KnowledgeEntry>,
    ) -> Result<Self, StoreError> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            check_dimension(dimension, &entry.embedding)?;
            let id = entry.id;
            if map.insert(id, entry).is_some() {
                return Err(StoreError::Insert(format!("entry {id} appears more than once")));
            }
        }
        Ok(Self {
            dimension,
            entries: Arc::new(RwLock::new(map)),
        })
    }

    /// All entries of all companies, oldest first.
    pub async fn snapshot(&self) -> Vec<KnowledgeEntry> {
        let entries = self.entries.read().await;
        let mut all: Vec<KnowledgeEntry> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        debug!("MemoryStore initialized (dimension: {})", self.dimension);
        Ok(())
    }

    async fn insert_many(
        &self,
        company_id: &CompanyId,
        entries: &[KnowledgeEntry],
    ) -> Result<u64, StoreError> {
        validate_batch(self.dimension, company_id, entries)?;

        let mut store = self.entries.write().await;
        if let Some(existing) = entries.iter().find(|e| store.contains_key(&e.id)) {
            return Err(StoreError::Insert(format!(
                "entry {} already exists",
                existing.id
            )));
        }
        for entry in entries {
            store.insert(entry.id, entry.clone());
        }
        debug!("Inserted {} entries for company {}", entries.len(), company_id);
        Ok(entries.len() as u64)
    }

    async fn similarity_search(
        &self,
        company_id: &CompanyId,
        query: &SearchQuery,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        check_dimension(self.dimension, &query.embedding)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let entries = self.entries.read().await;
        let hits = entries
            .values()
            .filter(|entry| entry.company_id == *company_id)
            .map(|entry| ScoredEntry {
                similarity: cosine_similarity(&query.embedding, &entry.embedding).clamp(0.0, 1.0),
                entry: entry.clone(),
            })
            .collect();

        Ok(rank(hits, query.threshold, query.limit))
    }

    async fn get_entry(
        &self,
        company_id: &CompanyId,
        id: Uuid,
    ) -> Result<Option<KnowledgeEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&id)
            .filter(|entry| entry.company_id == *company_id)
            .cloned())
    }

    async fn replace_content(
        &self,
        company_id: &CompanyId,
        id: Uuid,
        content: &str,
        embedding: &[f32],
    ) -> Result<KnowledgeEntry, StoreError> {
        check_dimension(self.dimension, embedding)?;

        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .filter(|entry| entry.company_id == *company_id)
            .ok_or(StoreError::NotFound(id))?;

        entry.content = content.to_string();
        entry.embedding = embedding.to_vec();
        Ok(entry.clone())
    }

    async fn delete_entry(&self, company_id: &CompanyId, id: Uuid) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get(&id) {
            Some(entry) if entry.company_id == *company_id => {
                entries.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete_by_source(
        &self,
        company_id: &CompanyId,
        source_name: &str,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            !(entry.company_id == *company_id && entry.source_name == source_name)
        });
        let removed = (before - entries.len()) as u64;
        debug!(
            "Deleted {} entries of source '{}' for company {}",
            removed, source_name, company_id
        );
        Ok(removed)
    }

    async fn stats(
        &self,
        company_id: &CompanyId,
        ready_min_entries: u64,
    ) -> Result<KnowledgeStats, StoreError> {
        let entries = self.entries.read().await;
        Ok(KnowledgeStats::from_entries(
            *company_id,
            entries.values().filter(|e| e.company_id == *company_id),
            ready_min_entries,
        ))
    }
}
