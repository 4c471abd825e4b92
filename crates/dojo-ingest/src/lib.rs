//! Ingestion for the Sales Dojo knowledge base.
//!
//! [`IngestionPipeline`] runs extract, chunk, embed and store for each
//! uploaded document, and handles single-entry edits. Subscribe to
//! [`IngestUpdate`] events to follow progress.

pub mod pipeline;
pub mod upload;

pub use pipeline::{DEFAULT_MAX_UPLOAD_BYTES, IngestConfig, IngestUpdate, IngestionPipeline};
pub use upload::{UploadOutcome, UploadStatus, UploadedFile, sanitize_filename};
