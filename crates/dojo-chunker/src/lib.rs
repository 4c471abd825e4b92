//! Document chunking for the Sales Dojo knowledge base.
//!
//! [`chunk_text`] is the pure splitting step; [`build_chunks`] wraps its
//! output in [`Chunk`]s carrying the provenance the ingestion pipeline needs.

pub mod paragraph;

pub use paragraph::chunk_text;

use std::path::Path;

use dojo_core::{Chunk, ChunkMetadata};
use tracing::debug;

/// Chunk a document's text and attach provenance.
///
/// Blank chunks are dropped, so an empty document yields no chunks at all.
pub fn build_chunks(text: &str, source_file: &str, max_chunk_size: usize) -> Vec<Chunk> {
    let pieces: Vec<String> = chunk_text(text, max_chunk_size)
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .collect();

    let file_type = file_type_of(source_file);
    let total_chunks = pieces.len() as u32;

    debug!(
        "Chunked {} ({} chars) into {} chunks",
        source_file,
        text.chars().count(),
        total_chunks
    );

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            content,
            chunk_index: index as u32,
            metadata: ChunkMetadata {
                source_file: source_file.to_string(),
                file_type: file_type.clone(),
                total_chunks,
            },
        })
        .collect()
}

/// Lowercase extension of a filename, or an empty string.
pub fn file_type_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chunks_attaches_metadata() {
        let text = format!("{}\n\n{}", "a".repeat(8), "b".repeat(8));
        let chunks = build_chunks(&text, "Playbook.PDF", 10);

        assert_eq!(chunks.len(), 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.metadata.source_file, "Playbook.PDF");
            assert_eq!(chunk.metadata.file_type, "pdf");
            assert_eq!(chunk.metadata.total_chunks, 2);
        }
    }

    #[test]
    fn test_build_chunks_empty_text() {
        assert!(build_chunks("", "empty.txt", 1000).is_empty());
        assert!(build_chunks("   \n  ", "blank.txt", 1000).is_empty());
    }

    #[test]
    fn test_build_chunks_short_text() {
        let chunks = build_chunks("Our pricing starts at $99.", "pricing.txt", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Our pricing starts at $99.");
    }

    #[test]
    fn test_file_type_of() {
        assert_eq!(file_type_of("deck.XLSX"), "xlsx");
        assert_eq!(file_type_of("archive.tar.gz"), "gz");
        assert_eq!(file_type_of("README"), "");
    }
}
