//! Batch uploads: validation, filename sanitizing and per-file outcomes.

use dojo_core::{CompanyId, SourceType};
use serde::Serialize;
use tracing::warn;

use crate::pipeline::IngestionPipeline;

/// A file handed over by a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// What happened to one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadStatus {
    Stored { entry_count: u64 },
    Rejected { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// Name the entries were stored under
    pub filename: String,
    #[serde(flatten)]
    pub status: UploadStatus,
}

impl UploadOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self.status, UploadStatus::Stored { .. })
    }
}

/// Replace every character outside letters, digits, `_`, `.` and `-`
/// with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

impl IngestionPipeline {
    /// Ingest a batch of uploads, one after the other.
    ///
    /// A rejected or failing file never stops the rest of the batch.
    /// Outcomes come back in upload order.
    pub async fn ingest_uploads(
        &self,
        company_id: &CompanyId,
        source_type: SourceType,
        uploads: Vec<UploadedFile>,
    ) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let filename = sanitize_filename(&upload.filename);

            let status = if !self.extractors().supports(&filename) {
                warn!("Rejected {}: unsupported file type", upload.filename);
                UploadStatus::Rejected {
                    reason: format!(
                        "unsupported file type; allowed: {}",
                        self.extractors().supported_extensions().join(", ")
                    ),
                }
            } else if upload.data.len() as u64 > self.config().max_upload_bytes {
                warn!(
                    "Rejected {}: {} bytes exceeds limit of {}",
                    upload.filename,
                    upload.data.len(),
                    self.config().max_upload_bytes
                );
                UploadStatus::Rejected {
                    reason: format!(
                        "file exceeds upload limit of {} bytes",
                        self.config().max_upload_bytes
                    ),
                }
            } else {
                match self
                    .ingest_document(&upload.data, &filename, source_type, company_id)
                    .await
                {
                    Ok(entry_count) => UploadStatus::Stored { entry_count },
                    Err(e) => UploadStatus::Failed {
                        error: e.to_string(),
                    },
                }
            };

            outcomes.push(UploadOutcome { filename, status });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IngestConfig;
    use dojo_embed::MockEmbedder;
    use dojo_extract::ExtractorRegistry;
    use dojo_store::MemoryStore;
    use std::sync::Arc;

    fn pipeline(max_upload_bytes: u64) -> (IngestionPipeline, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(8));
        let pipeline = IngestionPipeline::new(
            store.clone(),
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(MockEmbedder::with_dimension(8)),
            IngestConfig {
                max_upload_bytes,
                ..IngestConfig::default()
            },
        );
        (pipeline, store)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Q3 pricing (final).pdf"), "Q3_pricing__final_.pdf");
        assert_eq!(sanitize_filename("../etc/passwd.txt"), ".._etc_passwd.txt");
        assert_eq!(sanitize_filename("notes-v2_final.txt"), "notes-v2_final.txt");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn test_batch_continues_past_bad_files() {
        let (pipeline, store) = pipeline(1024);
        let company = CompanyId::new();

        let outcomes = pipeline
            .ingest_uploads(
                &company,
                SourceType::Document,
                vec![
                    UploadedFile::new("deck.pptx", b"slides".to_vec()),
                    UploadedFile::new("huge.txt", vec![b'a'; 2048]),
                    UploadedFile::new("broken.docx", b"not a zip".to_vec()),
                    UploadedFile::new("call notes.txt", b"Ask about timeline.".to_vec()),
                ],
            )
            .await;

        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0].status, UploadStatus::Rejected { .. }));
        assert!(matches!(outcomes[1].status, UploadStatus::Rejected { ref reason } if reason.contains("1024 bytes")));
        assert!(matches!(outcomes[2].status, UploadStatus::Failed { .. }));
        assert_eq!(
            outcomes[3],
            UploadOutcome {
                filename: "call_notes.txt".to_string(),
                status: UploadStatus::Stored { entry_count: 1 },
            }
        );

        let stored = store.snapshot().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].source_name, "call_notes.txt");
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = UploadOutcome {
            filename: "a.txt".to_string(),
            status: UploadStatus::Stored { entry_count: 2 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["filename"], "a.txt");
        assert_eq!(json["status"], "stored");
        assert_eq!(json["entry_count"], 2);
    }
}
