//! Extractor registry keyed by file extension.

use std::collections::HashMap;
use std::sync::Arc;

use dojo_core::{ExtractError, TextExtractor};

use crate::{CsvExtractor, DocxExtractor, PdfExtractor, PlainTextExtractor, SpreadsheetExtractor};

/// Registry of text extractors.
pub struct ExtractorRegistry {
    /// Lowercase extension to extractor
    by_extension: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Registry with every built-in extractor: txt, csv, pdf, docx/doc,
    /// xlsx/xls.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PlainTextExtractor::new());
        registry.register(CsvExtractor::new());
        registry.register(PdfExtractor::new());
        registry.register(DocxExtractor::new());
        registry.register(SpreadsheetExtractor::new());
        registry
    }

    /// Register an extractor for all of its extensions, replacing any
    /// previous owner of those extensions.
    pub fn register<E: TextExtractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn TextExtractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), extractor.clone());
        }
    }

    /// Get the extractor for a filename, by its extension.
    #[must_use]
    pub fn get_for_file(&self, filename: &str) -> Option<Arc<dyn TextExtractor>> {
        self.by_extension.get(&extension_of(filename)).cloned()
    }

    #[must_use]
    pub fn supports(&self, filename: &str) -> bool {
        self.by_extension.contains_key(&extension_of(filename))
    }

    /// Registered extensions, sorted.
    #[must_use]
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.by_extension.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Extract text from a file's contents.
    ///
    /// Fails with [`ExtractError::UnsupportedType`] before looking at the
    /// data if no extractor handles the extension.
    pub async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractError> {
        let extractor = self
            .get_for_file(filename)
            .ok_or_else(|| ExtractError::UnsupportedType(unsupported_label(filename)))?;

        extractor.extract(data, filename).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn unsupported_label(filename: &str) -> String {
    match extension_of(filename) {
        ext if ext.is_empty() => format!("{filename} (no extension)"),
        ext => format!(".{ext}"),
    }
}
