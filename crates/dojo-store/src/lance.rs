//! `LanceDB` implementation of `VectorStore`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::builder::{FixedSizeListBuilder, Float32Builder};
use arrow_array::{Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dojo_core::similarity::{rank, score_from_distance};
use dojo_core::{
    CompanyId, KnowledgeEntry, KnowledgeStats, ScoredEntry, SearchQuery, SourceType, StoreError,
    VectorStore,
};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table, connect};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{check_dimension, validate_batch};

const ENTRIES_TABLE: &str = "knowledge_entries";

/// LanceDB-based vector store.
///
/// All companies share one table; every query and delete carries a
/// `company_id` predicate.
pub struct LanceStore {
    /// Path to the `LanceDB` database
    db_path: PathBuf,
    /// Embedding dimension
    embedding_dim: usize,
    /// Database connection (lazy initialized)
    connection: RwLock<Option<Connection>>,
    /// Entries table handle
    entries_table: RwLock<Option<Table>>,
}

impl LanceStore {
    /// Create a new `LanceStore`.
    #[must_use]
    pub fn new(db_path: PathBuf, embedding_dim: usize) -> Self {
        Self {
            db_path,
            embedding_dim,
            connection: RwLock::new(None),
            entries_table: RwLock::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn get_connection(&self) -> Result<Connection, StoreError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn = self.connection.write().await;
        if let Some(ref c) = *conn {
            return Ok(c.clone());
        }

        let db_path_str = self.db_path.to_string_lossy().to_string();
        let new_conn = connect(&db_path_str)
            .execute()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect to LanceDB: {e}")))?;
        *conn = Some(new_conn.clone());
        Ok(new_conn)
    }

    async fn get_entries_table(&self) -> Result<Table, StoreError> {
        {
            let table = self.entries_table.read().await;
            if let Some(ref t) = *table {
                return Ok(t.clone());
            }
        }

        let conn = self.get_connection().await?;
        let mut table_lock = self.entries_table.write().await;
        if let Some(ref t) = *table_lock {
            return Ok(t.clone());
        }

        let table = conn
            .open_table(ENTRIES_TABLE)
            .execute()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open entries table: {e}")))?;
        *table_lock = Some(table.clone());
        Ok(table)
    }

    fn entries_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("company_id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("source_type", DataType::Utf8, false),
            Field::new("source_name", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.embedding_dim as i32,
                ),
                false,
            ),
            Field::new("created_at", DataType::Utf8, false),
        ])
    }

    fn entries_to_batch(&self, entries: &[KnowledgeEntry]) -> Result<RecordBatch, StoreError> {
        let ids: Vec<_> = entries.iter().map(|e| e.id.to_string()).collect();
        let company_ids: Vec<_> = entries.iter().map(|e| e.company_id.to_string()).collect();
        let contents: Vec<_> = entries.iter().map(|e| e.content.clone()).collect();
        let source_types: Vec<_> = entries.iter().map(|e| e.source_type.to_string()).collect();
        let source_names: Vec<_> = entries.iter().map(|e| e.source_name.clone()).collect();
        let created_ats: Vec<_> = entries.iter().map(|e| e.created_at.to_rfc3339()).collect();

        let mut vectors = FixedSizeListBuilder::new(Float32Builder::new(), self.embedding_dim as i32);
        for entry in entries {
            vectors.values().append_slice(&entry.embedding);
            vectors.append(true);
        }
        let vector_array: ArrayRef = Arc::new(vectors.finish());

        RecordBatch::try_new(
            Arc::new(self.entries_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(company_ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(source_types)),
                Arc::new(StringArray::from(source_names)),
                vector_array,
                Arc::new(StringArray::from(created_ats)),
            ],
        )
        .map_err(|e| StoreError::Schema(format!("Failed to create RecordBatch: {e}")))
    }

    /// Run a filtered scan and collect the matching entries.
    async fn query_entries(
        &self,
        filter: String,
        limit: Option<usize>,
    ) -> Result<Vec<KnowledgeEntry>, StoreError> {
        let table = self.get_entries_table().await?;
        let mut query = table.query().only_if(filter);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let mut results = query
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query entries: {e}")))?;

        let mut entries = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch entries: {e}")))?
        {
            entries.extend(batch_to_entries(&batch)?.into_iter().map(|(entry, _)| entry));
        }
        Ok(entries)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn init(&self) -> Result<(), StoreError> {
        info!("Initializing LanceDB at {:?}", self.db_path);

        if let Some(parent) = self.db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Unavailable(format!("Failed to create db directory: {e}")))?;
        }

        let conn = self.get_connection().await?;
        let tables = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to list tables: {e}")))?;

        if !tables.iter().any(|t| t == ENTRIES_TABLE) {
            info!("Creating {} table", ENTRIES_TABLE);
            conn.create_empty_table(ENTRIES_TABLE, Arc::new(self.entries_schema()))
                .execute()
                .await
                .map_err(|e| StoreError::Schema(format!("Failed to create entries table: {e}")))?;
        }

        Ok(())
    }

    async fn insert_many(
        &self,
        company_id: &CompanyId,
        entries: &[KnowledgeEntry],
    ) -> Result<u64, StoreError> {
        validate_batch(self.embedding_dim, company_id, entries)?;
        if entries.is_empty() {
            return Ok(0);
        }

        let table = self.get_entries_table().await?;

        // add() appends blindly, so an id already on disk would be duplicated
        let ids = entries
            .iter()
            .map(|e| format!("'{}'", e.id))
            .collect::<Vec<_>>()
            .join(", ");
        let existing = table
            .count_rows(Some(format!("id IN ({ids})")))
            .await
            .map_err(|e| StoreError::Query(format!("Failed to check entry ids: {e}")))?;
        if existing > 0 {
            return Err(StoreError::Insert(format!(
                "{existing} of {} entries already exist",
                entries.len()
            )));
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();

        // One add() is one commit: readers see all of the batch or none of it
        table
            .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .execute()
            .await
            .map_err(|e| StoreError::Insert(format!("Failed to insert entries: {e}")))?;

        debug!("Inserted {} entries for company {}", entries.len(), company_id);
        Ok(entries.len() as u64)
    }

    async fn similarity_search(
        &self,
        company_id: &CompanyId,
        query: &SearchQuery,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        check_dimension(self.embedding_dim, &query.embedding)
            .map_err(|e| StoreError::Query(e.to_string()))?;
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.get_entries_table().await?;
        let mut results = table
            .vector_search(query.embedding.clone())
            .map_err(|e| StoreError::Query(format!("Failed to create search query: {e}")))?
            .distance_type(DistanceType::Cosine)
            .only_if(company_filter(company_id))
            .limit(query.limit)
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to execute search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch results: {e}")))?
        {
            for (entry, distance) in batch_to_entries(&batch)? {
                hits.push(ScoredEntry {
                    entry,
                    similarity: score_from_distance(distance.unwrap_or(1.0)),
                });
            }
        }

        Ok(rank(hits, query.threshold, query.limit))
    }

    async fn get_entry(
        &self,
        company_id: &CompanyId,
        id: Uuid,
    ) -> Result<Option<KnowledgeEntry>, StoreError> {
        let filter = format!("{} AND id = '{}'", company_filter(company_id), id);
        Ok(self.query_entries(filter, Some(1)).await?.into_iter().next())
    }

    async fn replace_content(
        &self,
        company_id: &CompanyId,
        id: Uuid,
        content: &str,
        embedding: &[f32],
    ) -> Result<KnowledgeEntry, StoreError> {
        check_dimension(self.embedding_dim, embedding)?;

        let mut entry = self
            .get_entry(company_id, id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        entry.content = content.to_string();
        entry.embedding = embedding.to_vec();

        let table = self.get_entries_table().await?;
        let batch = self.entries_to_batch(std::slice::from_ref(&entry))?;
        let schema = batch.schema();

        // Content and vector land in the same commit
        let mut merge_insert = table.merge_insert(&["id"]);
        merge_insert.when_matched_update_all(None);
        merge_insert
            .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .await
            .map_err(|e| StoreError::Update(format!("Failed to update entry {id}: {e}")))?;

        Ok(entry)
    }

    async fn delete_entry(&self, company_id: &CompanyId, id: Uuid) -> Result<(), StoreError> {
        let table = self.get_entries_table().await?;
        let filter = format!("{} AND id = '{}'", company_filter(company_id), id);

        let count = table
            .count_rows(Some(filter.clone()))
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count entries: {e}")))?;
        if count == 0 {
            return Err(StoreError::NotFound(id));
        }

        table
            .delete(&filter)
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to delete entry {id}: {e}")))?;
        Ok(())
    }

    /// The returned count comes from a `count_rows` taken just before the
    /// delete. Under concurrent writers it is advisory: rows added or
    /// removed between the two calls are not reflected in it.
    async fn delete_by_source(
        &self,
        company_id: &CompanyId,
        source_name: &str,
    ) -> Result<u64, StoreError> {
        let table = self.get_entries_table().await?;
        let filter = format!(
            "{} AND source_name = '{}'",
            company_filter(company_id),
            escape(source_name)
        );

        let count = table
            .count_rows(Some(filter.clone()))
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count entries: {e}")))?;
        if count == 0 {
            return Ok(0);
        }

        table
            .delete(&filter)
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to delete source: {e}")))?;

        debug!(
            "Deleted {} entries of source '{}' for company {}",
            count, source_name, company_id
        );
        Ok(count as u64)
    }

    async fn stats(
        &self,
        company_id: &CompanyId,
        ready_min_entries: u64,
    ) -> Result<KnowledgeStats, StoreError> {
        let entries = self.query_entries(company_filter(company_id), None).await?;
        Ok(KnowledgeStats::from_entries(
            *company_id,
            &entries,
            ready_min_entries,
        ))
    }
}

fn company_filter(company_id: &CompanyId) -> String {
    format!("company_id = '{company_id}'")
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Decode a batch into entries, paired with `_distance` when the batch came
/// from a vector search.
fn batch_to_entries(
    batch: &RecordBatch,
) -> Result<Vec<(KnowledgeEntry, Option<f32>)>, StoreError> {
    let column = |name: &str| {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StoreError::Schema(format!("Missing {name} column")))
    };

    let ids = column("id")?;
    let company_ids = column("company_id")?;
    let contents = column("content")?;
    let source_types = column("source_type")?;
    let source_names = column("source_name")?;
    let created_ats = column("created_at")?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| StoreError::Schema("Missing vector column".to_string()))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let parse_err = |what: &str, e: &dyn std::fmt::Display| {
        StoreError::Schema(format!("Corrupt {what} value: {e}"))
    };

    let mut entries = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let embedding = vectors
            .value(i)
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|arr| arr.values().to_vec())
            .ok_or_else(|| StoreError::Schema("vector column is not Float32".to_string()))?;

        let entry = KnowledgeEntry {
            id: Uuid::parse_str(ids.value(i)).map_err(|e| parse_err("id", &e))?,
            company_id: company_ids
                .value(i)
                .parse::<CompanyId>()
                .map_err(|e| parse_err("company_id", &e))?,
            content: contents.value(i).to_string(),
            source_type: source_types
                .value(i)
                .parse::<SourceType>()
                .map_err(|e| parse_err("source_type", &e))?,
            source_name: source_names.value(i).to_string(),
            embedding,
            created_at: DateTime::parse_from_rfc3339(created_ats.value(i))
                .map_err(|e| parse_err("created_at", &e))?
                .with_timezone(&Utc),
        };

        let distance = distances.and_then(|d| (!d.is_null(i)).then(|| d.value(i)));
        entries.push((entry, distance));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEST_DIM: usize = 4;

    fn create_test_entry(company: CompanyId, source: &str, embedding: Vec<f32>) -> KnowledgeEntry {
        KnowledgeEntry::new(company, format!("from {source}"), SourceType::Document, source, embedding)
    }

    async fn open_store(dir: &Path) -> LanceStore {
        let store = LanceStore::new(dir.join("kb.lance"), TEST_DIM);
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_init_idempotent() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path()).await;
        assert!(store.init().await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_search_and_isolation() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path()).await;
        let company = CompanyId::new();
        let other = CompanyId::new();

        store
            .insert_many(
                &company,
                &[
                    create_test_entry(company, "a.pdf", vec![1.0, 0.0, 0.0, 0.0]),
                    create_test_entry(company, "b.pdf", vec![0.0, 1.0, 0.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        store
            .insert_many(&other, &[create_test_entry(other, "c.pdf", vec![1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();

        let query = SearchQuery::new(vec![1.0, 0.0, 0.0, 0.0])
            .with_threshold(0.5)
            .with_limit(5);
        let hits = store.similarity_search(&company, &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.source_name, "a.pdf");
        assert_eq!(hits[0].entry.company_id, company);
        assert!(hits[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path()).await;
        let company = CompanyId::new();
        let entry = create_test_entry(company, "o'brien.txt", vec![1.0, 0.0, 0.0, 0.0]);
        let id = entry.id;
        store.insert_many(&company, &[entry]).await.unwrap();

        let updated = store
            .replace_content(&company, id, "rewritten", &[0.0, 0.0, 1.0, 0.0])
            .await
            .unwrap();
        assert_eq!(updated.content, "rewritten");
        let fetched = store.get_entry(&company, id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "rewritten");
        assert_eq!(fetched.embedding, vec![0.0, 0.0, 1.0, 0.0]);

        assert_eq!(store.delete_by_source(&company, "o'brien.txt").await.unwrap(), 1);
        assert!(matches!(
            store.delete_entry(&company, id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_rejects_existing_and_repeated_ids() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path()).await;
        let owner = CompanyId::new();
        let intruder = CompanyId::new();

        let owned = create_test_entry(owner, "owner.pdf", vec![1.0, 0.0, 0.0, 0.0]);
        store.insert_many(&owner, &[owned.clone()]).await.unwrap();

        let mut clash = create_test_entry(intruder, "clash.pdf", vec![0.0, 1.0, 0.0, 0.0]);
        clash.id = owned.id;
        let fresh = create_test_entry(intruder, "fresh.pdf", vec![0.0, 0.0, 1.0, 0.0]);
        assert!(matches!(
            store.insert_many(&intruder, &[fresh, clash]).await,
            Err(StoreError::Insert(_))
        ));

        let repeated = create_test_entry(intruder, "twice.pdf", vec![0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            store
                .insert_many(&intruder, &[repeated.clone(), repeated])
                .await,
            Err(StoreError::Insert(_))
        ));

        assert_eq!(store.get_entry(&owner, owned.id).await.unwrap(), Some(owned));
        assert_eq!(store.stats(&owner, 1).await.unwrap().total_entries, 1);
        assert_eq!(store.stats(&intruder, 1).await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path()).await;
        let company = CompanyId::new();
        let entries: Vec<_> = (0..5)
            .map(|i| create_test_entry(company, &format!("s{}", i % 2), vec![1.0, 0.0, 0.0, 0.0]))
            .collect();
        store.insert_many(&company, &entries).await.unwrap();

        let stats = store.stats(&company, 5).await.unwrap();
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.unique_sources, 2);
        assert!(stats.is_ready);
    }
}
