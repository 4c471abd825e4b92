//! # dojo-core
//!
//! Core types and traits for the Sales Dojo knowledge base: the part of the
//! training platform that turns a company's reference material into
//! searchable fragments and hands the relevant ones to live conversations.
//!
//! - **Text Extraction**: [`TextExtractor`] trait for reading uploaded files
//! - **Embedding Generation**: [`Embedder`] trait for converting text to vectors
//! - **Vector Storage**: [`VectorStore`] trait for tenant-scoped search
//!
//! ## Architecture
//!
//! ```text
//! upload -> TextExtractor -> chunker -> Embedder -> VectorStore
//!                                                      |
//!                       query -> Embedder -> SearchQuery -> ScoredEntry
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CompanyId`] | Tenant scope for every entry and store call |
//! | [`KnowledgeEntry`] | A stored fragment with its embedding |
//! | [`Chunk`] | A bounded fragment awaiting embedding |
//! | [`SearchQuery`] | Embedding, threshold and limit for a search |
//! | [`ScoredEntry`] | A hit with its similarity |
//! | [`KnowledgeStats`] | Readiness summary for a company |
//!
//! ## Related Crates
//!
//! - `dojo-chunker`: Paragraph and sentence chunking
//! - `dojo-embed`: OpenAI-compatible and deterministic mock embedders
//! - `dojo-extract`: Text extraction per file type
//! - `dojo-store`: In-memory and `LanceDB` stores
//! - `dojo-ingest`: Upload ingestion pipeline
//! - `dojo-retrieval`: Search and prompt enrichment

pub mod error;
pub mod similarity;
pub mod traits;
pub mod types;

pub use error::{EmbedError, Error, ExtractError, Result, StoreError};
pub use traits::*;
pub use types::*;
