//! Ingestion pipeline: extract, chunk, embed, store.

use std::sync::Arc;

use dojo_chunker::build_chunks;
use dojo_core::{
    Chunk, CompanyId, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_READY_MIN_ENTRIES, EmbedError, Embedder,
    Error, KnowledgeEntry, KnowledgeStats, Result, SourceType, VectorStore,
};
use dojo_extract::ExtractorRegistry;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Default upload size limit (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Ingestion events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestUpdate {
    IngestionStarted {
        company_id: CompanyId,
        source_name: String,
    },
    DocumentIngested {
        company_id: CompanyId,
        source_name: String,
        entry_count: u64,
    },
    DocumentFailed {
        company_id: CompanyId,
        source_name: String,
        error: String,
    },
    SourceDeleted {
        company_id: CompanyId,
        source_name: String,
        removed: u64,
    },
}

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Chunk size used by [`IngestionPipeline::ingest_document`]
    pub max_chunk_size: usize,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
    /// Entries needed for a company's knowledge base to count as ready
    pub ready_min_entries: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ready_min_entries: DEFAULT_READY_MIN_ENTRIES,
        }
    }
}

/// Turns uploaded documents and typed-in notes into stored entries.
///
/// Errors from every stage propagate unchanged; nothing is retried.
pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<dyn Embedder>,
    config: IngestConfig,
    update_tx: broadcast::Sender<IngestUpdate>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        extractors: Arc<ExtractorRegistry>,
        embedder: Arc<dyn Embedder>,
        config: IngestConfig,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(256);
        Self {
            store,
            extractors,
            embedder,
            config,
            update_tx,
        }
    }

    /// Subscribe to ingestion events.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestUpdate> {
        self.update_tx.subscribe()
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    /// Ingest a document with the configured chunk size.
    pub async fn ingest_document(
        &self,
        data: &[u8],
        filename: &str,
        source_type: SourceType,
        company_id: &CompanyId,
    ) -> Result<u64> {
        self.ingest(
            data,
            filename,
            source_type,
            company_id,
            self.config.max_chunk_size,
        )
        .await
    }

    /// Extract, chunk, embed and store one document.
    ///
    /// Returns the number of stored entries, which equals the number of
    /// chunks. Every entry gets `filename` as its source name. A document
    /// that yields no text stores nothing and returns 0.
    pub async fn ingest(
        &self,
        data: &[u8],
        filename: &str,
        source_type: SourceType,
        company_id: &CompanyId,
        max_chunk_size: usize,
    ) -> Result<u64> {
        if max_chunk_size == 0 {
            return Err(Error::InvalidInput(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }

        let _ = self.update_tx.send(IngestUpdate::IngestionStarted {
            company_id: *company_id,
            source_name: filename.to_string(),
        });

        let result = self
            .run_ingest(data, filename, source_type, company_id, max_chunk_size)
            .await;

        match &result {
            Ok(count) => {
                info!(
                    "Ingested {} for company {}: {} entries",
                    filename, company_id, count
                );
                let _ = self.update_tx.send(IngestUpdate::DocumentIngested {
                    company_id: *company_id,
                    source_name: filename.to_string(),
                    entry_count: *count,
                });
            }
            Err(e) => {
                error!("Failed to ingest {} for company {}: {}", filename, company_id, e);
                let _ = self.update_tx.send(IngestUpdate::DocumentFailed {
                    company_id: *company_id,
                    source_name: filename.to_string(),
                    error: e.to_string(),
                });
            }
        }

        result
    }

    async fn run_ingest(
        &self,
        data: &[u8],
        filename: &str,
        source_type: SourceType,
        company_id: &CompanyId,
        max_chunk_size: usize,
    ) -> Result<u64> {
        let text = self.extractors.extract(data, filename).await?;
        let chunks = build_chunks(&text, filename, max_chunk_size);
        if chunks.is_empty() {
            debug!("No text extracted from {}, nothing to store", filename);
            return Ok(0);
        }
        self.store_chunks(&chunks, company_id, source_type).await
    }

    /// Embed and store ready-made chunks in one batch.
    ///
    /// Each entry's source name is its chunk's `metadata.source_file`.
    pub async fn store_chunks(
        &self,
        chunks: &[Chunk],
        company_id: &CompanyId,
        source_type: SourceType,
    ) -> Result<u64> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(EmbedError::BatchMismatch {
                sent: chunks.len(),
                received: embeddings.len(),
            }
            .into());
        }

        let entries: Vec<KnowledgeEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                KnowledgeEntry::new(
                    *company_id,
                    chunk.content.clone(),
                    source_type,
                    chunk.metadata.source_file.clone(),
                    embedding,
                )
            })
            .collect();

        Ok(self.store.insert_many(company_id, &entries).await?)
    }

    /// Embed and store one typed-in entry.
    pub async fn add_single_entry(
        &self,
        content: &str,
        company_id: &CompanyId,
        source_type: SourceType,
        source_name: &str,
    ) -> Result<KnowledgeEntry> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }

        let embedding = self.embedder.embed(content).await?;
        let entry = KnowledgeEntry::new(*company_id, content, source_type, source_name, embedding);
        self.store
            .insert_many(company_id, std::slice::from_ref(&entry))
            .await?;

        debug!("Added entry {} ({}) for company {}", entry.id, source_name, company_id);
        Ok(entry)
    }

    /// Replace an entry's content, re-embedding it. The source name and
    /// creation time are kept.
    pub async fn update_entry(
        &self,
        company_id: &CompanyId,
        id: Uuid,
        new_content: &str,
    ) -> Result<KnowledgeEntry> {
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }

        let embedding = self.embedder.embed(new_content).await?;
        let entry = self
            .store
            .replace_content(company_id, id, new_content, &embedding)
            .await?;

        debug!("Updated entry {} for company {}", id, company_id);
        Ok(entry)
    }

    pub async fn delete_entry(&self, company_id: &CompanyId, id: Uuid) -> Result<()> {
        self.store.delete_entry(company_id, id).await?;
        debug!("Deleted entry {} for company {}", id, company_id);
        Ok(())
    }

    /// Remove every entry that came from `source_name`.
    pub async fn delete_source(&self, company_id: &CompanyId, source_name: &str) -> Result<u64> {
        let removed = self.store.delete_by_source(company_id, source_name).await?;
        info!(
            "Deleted {} entries of {} for company {}",
            removed, source_name, company_id
        );
        let _ = self.update_tx.send(IngestUpdate::SourceDeleted {
            company_id: *company_id,
            source_name: source_name.to_string(),
            removed,
        });
        Ok(removed)
    }

    pub async fn stats(&self, company_id: &CompanyId) -> Result<KnowledgeStats> {
        Ok(self
            .store
            .stats(company_id, self.config.ready_min_entries)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dojo_core::{ScoredEntry, SearchQuery, StoreError};
    use dojo_embed::MockEmbedder;
    use dojo_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 16;

    /// Counts embed_batch calls and can be told to fail.
    struct CountingEmbedder {
        inner: MockEmbedder,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEmbedder {
        fn new(fail: bool) -> Self {
            Self {
                inner: MockEmbedder::with_dimension(DIM),
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            DIM
        }

        async fn embed_batch(
            &self,
            texts: &[&str],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbedError::Provider("HTTP 503".to_string()));
            }
            self.inner.embed_batch(texts).await
        }
    }

    /// Records the size of every insert_many call.
    struct RecordingStore {
        inner: MemoryStore,
        inserts: std::sync::Mutex<Vec<usize>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(DIM),
                inserts: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn inserts(&self) -> Vec<usize> {
            self.inserts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn init(&self) -> std::result::Result<(), StoreError> {
            self.inner.init().await
        }

        async fn insert_many(
            &self,
            company_id: &CompanyId,
            entries: &[KnowledgeEntry],
        ) -> std::result::Result<u64, StoreError> {
            self.inserts.lock().unwrap().push(entries.len());
            self.inner.insert_many(company_id, entries).await
        }

        async fn similarity_search(
            &self,
            company_id: &CompanyId,
            query: &SearchQuery,
        ) -> std::result::Result<Vec<ScoredEntry>, StoreError> {
            self.inner.similarity_search(company_id, query).await
        }

        async fn get_entry(
            &self,
            company_id: &CompanyId,
            id: Uuid,
        ) -> std::result::Result<Option<KnowledgeEntry>, StoreError> {
            self.inner.get_entry(company_id, id).await
        }

        async fn replace_content(
            &self,
            company_id: &CompanyId,
            id: Uuid,
            content: &str,
            embedding: &[f32],
        ) -> std::result::Result<KnowledgeEntry, StoreError> {
            self.inner
                .replace_content(company_id, id, content, embedding)
                .await
        }

        async fn delete_entry(
            &self,
            company_id: &CompanyId,
            id: Uuid,
        ) -> std::result::Result<(), StoreError> {
            self.inner.delete_entry(company_id, id).await
        }

        async fn delete_by_source(
            &self,
            company_id: &CompanyId,
            source_name: &str,
        ) -> std::result::Result<u64, StoreError> {
            self.inner.delete_by_source(company_id, source_name).await
        }

        async fn stats(
            &self,
            company_id: &CompanyId,
            ready_min_entries: u64,
        ) -> std::result::Result<KnowledgeStats, StoreError> {
            self.inner.stats(company_id, ready_min_entries).await
        }
    }

    fn pipeline(
        store: Arc<RecordingStore>,
        embedder: Arc<CountingEmbedder>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            store,
            Arc::new(ExtractorRegistry::with_defaults()),
            embedder,
            IngestConfig::default(),
        )
    }

    fn three_chunk_document() -> String {
        let paragraph_a = vec![format!("{}.", "x".repeat(98)); 14].join(" ");
        format!("{paragraph_a}\n\n{}", "b".repeat(999))
    }

    #[tokio::test]
    async fn test_ingest_batches_embedding_and_insert() {
        let store = Arc::new(RecordingStore::new());
        let embedder = Arc::new(CountingEmbedder::new(false));
        let pipeline = pipeline(store.clone(), embedder.clone());
        let company = CompanyId::new();

        let count = pipeline
            .ingest(
                three_chunk_document().as_bytes(),
                "playbook.txt",
                SourceType::Document,
                &company,
                1000,
            )
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.inserts(), vec![3]);

        let snapshot = store.inner.snapshot().await;
        assert!(snapshot.iter().all(|e| e.source_name == "playbook.txt"));
        assert!(snapshot.iter().all(|e| e.source_type == SourceType::Document));
        assert!(snapshot.iter().all(|e| e.embedding.len() == DIM));
    }

    #[tokio::test]
    async fn test_unsupported_type_touches_nothing() {
        let store = Arc::new(RecordingStore::new());
        let embedder = Arc::new(CountingEmbedder::new(false));
        let pipeline = pipeline(store.clone(), embedder.clone());

        let err = pipeline
            .ingest(b"slides", "deck.pptx", SourceType::Document, &CompanyId::new(), 1000)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedFileType(_)));
        assert!(!err.is_retryable());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(store.inserts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_is_extraction_error() {
        let store = Arc::new(RecordingStore::new());
        let embedder = Arc::new(CountingEmbedder::new(false));
        let pipeline = pipeline(store.clone(), embedder.clone());

        let err = pipeline
            .ingest(b"not a zip", "script.docx", SourceType::Document, &CompanyId::new(), 1000)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("script.docx"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let store = Arc::new(RecordingStore::new());
        let embedder = Arc::new(CountingEmbedder::new(true));
        let pipeline = pipeline(store.clone(), embedder);
        let company = CompanyId::new();

        let err = pipeline
            .ingest(b"Some notes.", "notes.txt", SourceType::Document, &company, 1000)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Embedding(EmbedError::Provider(_))));
        assert!(err.is_retryable());
        assert!(store.inserts().is_empty());
        assert_eq!(pipeline.stats(&company).await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_empty_document_stores_nothing() {
        let store = Arc::new(RecordingStore::new());
        let embedder = Arc::new(CountingEmbedder::new(false));
        let pipeline = pipeline(store.clone(), embedder.clone());

        let count = pipeline
            .ingest(b"", "empty.txt", SourceType::Document, &CompanyId::new(), 1000)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(store.inserts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_rejected() {
        let pipeline = pipeline(
            Arc::new(RecordingStore::new()),
            Arc::new(CountingEmbedder::new(false)),
        );
        let err = pipeline
            .ingest(b"x", "a.txt", SourceType::Document, &CompanyId::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_add_update_and_delete_entry() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), Arc::new(CountingEmbedder::new(false)));
        let company = CompanyId::new();

        let entry = pipeline
            .add_single_entry(
                "  We never discount more than 15%.  ",
                &company,
                SourceType::Manual,
                "pricing-rules",
            )
            .await
            .unwrap();
        assert_eq!(entry.content, "We never discount more than 15%.");

        let updated = pipeline
            .update_entry(&company, entry.id, "We never discount more than 20%.")
            .await
            .unwrap();
        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.source_name, "pricing-rules");
        assert_ne!(updated.embedding, entry.embedding);

        pipeline.delete_entry(&company, entry.id).await.unwrap();
        let err = pipeline
            .update_entry(&company, entry.id, "gone")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(id) if id == entry.id));
    }

    #[tokio::test]
    async fn test_blank_content_is_rejected() {
        let pipeline = pipeline(
            Arc::new(RecordingStore::new()),
            Arc::new(CountingEmbedder::new(false)),
        );
        let company = CompanyId::new();

        let err = pipeline
            .add_single_entry("   ", &company, SourceType::Manual, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = pipeline
            .update_entry(&company, Uuid::new_v4(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_is_tenant_scoped() {
        let pipeline = pipeline(
            Arc::new(RecordingStore::new()),
            Arc::new(CountingEmbedder::new(false)),
        );
        let owner = CompanyId::new();
        let entry = pipeline
            .add_single_entry("secret", &owner, SourceType::Manual, "notes")
            .await
            .unwrap();

        let err = pipeline
            .update_entry(&CompanyId::new(), entry.id, "hijacked")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_source_and_events() {
        let pipeline = pipeline(
            Arc::new(RecordingStore::new()),
            Arc::new(CountingEmbedder::new(false)),
        );
        let mut updates = pipeline.subscribe();
        let company = CompanyId::new();

        pipeline
            .ingest(
                three_chunk_document().as_bytes(),
                "playbook.txt",
                SourceType::Document,
                &company,
                1000,
            )
            .await
            .unwrap();
        assert_eq!(pipeline.delete_source(&company, "playbook.txt").await.unwrap(), 3);
        assert_eq!(pipeline.delete_source(&company, "playbook.txt").await.unwrap(), 0);

        assert!(matches!(
            updates.recv().await.unwrap(),
            IngestUpdate::IngestionStarted { .. }
        ));
        assert_eq!(
            updates.recv().await.unwrap(),
            IngestUpdate::DocumentIngested {
                company_id: company,
                source_name: "playbook.txt".to_string(),
                entry_count: 3,
            }
        );
        assert!(matches!(
            updates.recv().await.unwrap(),
            IngestUpdate::SourceDeleted { removed: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_store_chunks_uses_chunk_source() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), Arc::new(CountingEmbedder::new(false)));
        let company = CompanyId::new();

        let chunks = build_chunks("Qualify budget early.", "discovery.csv", 1000);
        let count = pipeline
            .store_chunks(&chunks, &company, SourceType::Document)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.inner.snapshot().await[0].source_name, "discovery.csv");
        assert_eq!(
            pipeline
                .store_chunks(&[], &company, SourceType::Document)
                .await
                .unwrap(),
            0
        );
    }
}
