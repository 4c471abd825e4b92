//! Core types for the knowledge base.
//!
//! ## Tenancy
//! - [`CompanyId`]: Tenant scope carried by every entry and every store call
//!
//! ## Knowledge
//! - [`KnowledgeEntry`]: A stored fragment with its embedding
//! - [`SourceType`]: Where a fragment came from
//! - [`KnowledgeStats`]: Per-company readiness summary
//!
//! ## Chunks
//! - [`Chunk`]: A bounded fragment produced from a document, before embedding
//! - [`ChunkMetadata`]: Provenance attached to each chunk
//!
//! ## Search
//! - [`SearchQuery`]: Embedding plus threshold and result budget
//! - [`ScoredEntry`]: A matching entry with its similarity score

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Defaults
// ============================================================================

/// Default embedding vector length.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Default minimum similarity a search hit must exceed.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Default number of search hits returned.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Default chunk size in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Entries a company needs before its knowledge base counts as ready.
pub const DEFAULT_READY_MIN_ENTRIES: u64 = 5;

// ============================================================================
// Tenancy
// ============================================================================

/// Identifier of the company (tenant) that owns a set of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    /// Generate a fresh company id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CompanyId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CompanyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Knowledge Entries
// ============================================================================

/// Origin of a knowledge entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Uploaded file
    Document,
    /// Web page
    Website,
    /// Typed in by a user
    Manual,
}

impl SourceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Document => "document",
            SourceType::Website => "website",
            SourceType::Manual => "manual",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(SourceType::Document),
            "website" => Ok(SourceType::Website),
            "manual" => Ok(SourceType::Manual),
            other => Err(format!(
                "unknown source type '{other}' (expected document, website or manual)"
            )),
        }
    }
}

/// One stored, embedded fragment of a company's knowledge.
///
/// The embedding is not optional: an entry is only constructed once its
/// vector exists, so a failed embedding can never reach a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique entry identifier
    pub id: Uuid,
    /// Owning company
    pub company_id: CompanyId,
    /// Fragment text
    pub content: String,
    /// Where the fragment came from
    pub source_type: SourceType,
    /// Filename or URL of the originating artifact; the unit of bulk deletion
    pub source_name: String,
    /// Embedding vector of the configured dimension
    pub embedding: Vec<f32>,
    /// Creation time, never modified
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Create a new entry with a fresh id and the current timestamp.
    pub fn new(
        company_id: CompanyId,
        content: impl Into<String>,
        source_type: SourceType,
        source_name: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            content: content.into(),
            source_type,
            source_name: source_name.into(),
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// Per-company knowledge base summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub company_id: CompanyId,
    /// Number of stored entries
    pub total_entries: u64,
    /// Number of distinct source names
    pub unique_sources: u64,
    /// Entry counts keyed by source type; types with no entries are absent
    pub entries_by_source_type: BTreeMap<SourceType, u64>,
    /// Whether the company has enough entries for grounded conversations
    pub is_ready: bool,
    /// Creation time of the newest entry
    pub last_updated: Option<DateTime<Utc>>,
}

impl KnowledgeStats {
    /// Stats for a company with no entries.
    #[must_use]
    pub fn empty(company_id: CompanyId) -> Self {
        Self {
            company_id,
            total_entries: 0,
            unique_sources: 0,
            entries_by_source_type: BTreeMap::new(),
            is_ready: false,
            last_updated: None,
        }
    }

    /// Summarize a company's entries.
    ///
    /// `is_ready` is `total_entries >= ready_min_entries`.
    pub fn from_entries<'a, I>(company_id: CompanyId, entries: I, ready_min_entries: u64) -> Self
    where
        I: IntoIterator<Item = &'a KnowledgeEntry>,
    {
        let mut stats = Self::empty(company_id);
        let mut sources = std::collections::HashSet::new();

        for entry in entries {
            stats.total_entries += 1;
            sources.insert(entry.source_name.as_str());
            *stats
                .entries_by_source_type
                .entry(entry.source_type)
                .or_insert(0) += 1;
            stats.last_updated = stats.last_updated.max(Some(entry.created_at));
        }

        stats.unique_sources = sources.len() as u64;
        stats.is_ready = stats.total_entries >= ready_min_entries;
        stats
    }
}

// ============================================================================
// Chunks
// ============================================================================

/// A bounded fragment of a document, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Fragment text
    pub content: String,
    /// Position in the document (0-indexed)
    pub chunk_index: u32,
    /// Provenance
    pub metadata: ChunkMetadata,
}

/// Provenance of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Filename the chunk was extracted from
    pub source_file: String,
    /// Lowercase extension without the dot
    pub file_type: String,
    /// Number of chunks the document produced
    pub total_chunks: u32,
}

// ============================================================================
// Search
// ============================================================================

/// Parameters for a similarity search.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query embedding
    pub embedding: Vec<f32>,
    /// Hits must score strictly above this
    pub threshold: f32,
    /// Maximum number of hits
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            limit: DEFAULT_MAX_RESULTS,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    /// The matching entry
    pub entry: KnowledgeEntry,
    /// Similarity in `[0, 1]`, 1 meaning identical direction
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(company: CompanyId, source: &str, source_type: SourceType) -> KnowledgeEntry {
        KnowledgeEntry::new(company, "content", source_type, source, vec![0.0; 4])
    }

    #[test]
    fn test_source_type_round_trips_through_str() {
        for st in [SourceType::Document, SourceType::Website, SourceType::Manual] {
            assert_eq!(st.to_string().parse::<SourceType>().unwrap(), st);
        }
        assert_eq!("  Manual ".parse::<SourceType>().unwrap(), SourceType::Manual);
        assert!("upload".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_source_type_serializes_lowercase() {
        let json = serde_json::to_string(&SourceType::Website).unwrap();
        assert_eq!(json, "\"website\"");
    }

    #[test]
    fn test_company_id_parse_and_display() {
        let company = CompanyId::new();
        let parsed: CompanyId = company.to_string().parse().unwrap();
        assert_eq!(parsed, company);
        assert!("not-a-uuid".parse::<CompanyId>().is_err());
    }

    #[test]
    fn test_company_id_serializes_as_bare_uuid() {
        let company = CompanyId::new();
        let json = serde_json::to_string(&company).unwrap();
        assert_eq!(json, format!("\"{company}\""));
    }

    #[test]
    fn test_new_entries_get_distinct_ids() {
        let company = CompanyId::new();
        let a = entry(company, "a.txt", SourceType::Document);
        let b = entry(company, "a.txt", SourceType::Document);
        assert_ne!(a.id, b.id);
        assert_eq!(a.company_id, company);
    }

    #[test]
    fn test_stats_from_entries() {
        let company = CompanyId::new();
        let mut entries = vec![
            entry(company, "a.pdf", SourceType::Document),
            entry(company, "a.pdf", SourceType::Document),
            entry(company, "notes", SourceType::Manual),
        ];
        let newest = Utc::now() + Duration::hours(1);
        entries[2].created_at = newest;

        let stats = KnowledgeStats::from_entries(company, &entries, 5);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.unique_sources, 2);
        assert_eq!(stats.entries_by_source_type[&SourceType::Document], 2);
        assert_eq!(stats.entries_by_source_type[&SourceType::Manual], 1);
        assert!(!stats.entries_by_source_type.contains_key(&SourceType::Website));
        assert_eq!(stats.last_updated, Some(newest));
        assert!(!stats.is_ready);
    }

    #[test]
    fn test_stats_ready_at_threshold() {
        let company = CompanyId::new();
        let entries: Vec<_> = (0..5)
            .map(|i| entry(company, &format!("s{i}"), SourceType::Manual))
            .collect();

        assert!(!KnowledgeStats::from_entries(company, &entries[..4], 5).is_ready);
        assert!(KnowledgeStats::from_entries(company, &entries, 5).is_ready);
    }

    #[test]
    fn test_empty_stats() {
        let stats = KnowledgeStats::empty(CompanyId::new());
        assert_eq!(stats.total_entries, 0);
        assert!(!stats.is_ready);
        assert!(stats.last_updated.is_none());
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new(vec![1.0, 0.0])
            .with_threshold(0.5)
            .with_limit(7);
        assert_eq!(query.threshold, 0.5);
        assert_eq!(query.limit, 7);

        let defaults = SearchQuery::new(vec![]);
        assert_eq!(defaults.threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(defaults.limit, DEFAULT_MAX_RESULTS);
    }
}
