//! PDF text extractor.

use async_trait::async_trait;
use dojo_core::{ExtractError, TextExtractor};
use tracing::debug;

/// Extractor for PDF files, using pdf-extract.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Create a new PDF extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractError> {
        debug!("Extracting PDF: {} ({} bytes)", filename, data.len());

        // pdf-extract is CPU bound and can panic on hostile input; a panic
        // surfaces here as a JoinError
        let bytes = data.to_vec();
        let pages =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
                .await
                .map_err(|e| {
                    ExtractError::malformed(filename, format!("PDF parser aborted: {e}"))
                })?
                .map_err(|e| ExtractError::malformed(filename, e))?;

        debug!("Extracted {} pages from {}", pages.len(), filename);
        Ok(render_pages(&pages))
    }
}

/// Label each page with its 1-based number. Blank pages are skipped but
/// keep their place in the numbering.
fn render_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .enumerate()
        .filter_map(|(i, page)| {
            let text = page.as_ref().trim();
            (!text.is_empty()).then(|| format!("[Page {}]\n{}", i + 1, text))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let err = PdfExtractor::new()
            .extract(b"definitely not a pdf", "broken.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Malformed { ref file, .. } if file == "broken.pdf"));
    }

    #[test]
    fn test_pages_are_labelled_in_order() {
        let pages = ["Discovery questions\n", "  Pricing tiers  "];
        assert_eq!(
            render_pages(&pages),
            "[Page 1]\nDiscovery questions\n\n[Page 2]\nPricing tiers"
        );
    }

    #[test]
    fn test_blank_pages_keep_numbering() {
        let pages = ["Cover", " \n\u{c}", "", "Closing script"];
        assert_eq!(
            render_pages(&pages),
            "[Page 1]\nCover\n\n[Page 4]\nClosing script"
        );
    }

    #[test]
    fn test_no_text_renders_empty() {
        assert_eq!(render_pages::<&str>(&[]), "");
        assert_eq!(render_pages(&["  ", "\n"]), "");
    }

    #[test]
    fn test_extensions() {
        assert_eq!(PdfExtractor::new().extensions(), &["pdf"]);
    }
}
