//! Plain text extractor.

use async_trait::async_trait;
use dojo_core::{ExtractError, TextExtractor};

/// Extractor for `.txt` files.
///
/// Decodes UTF-8 and falls back to Latin-1 for anything else, so it never
/// rejects a file on encoding grounds.
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Create a new plain text extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &[&str] {
        &["txt"]
    }

    async fn extract(&self, data: &[u8], _filename: &str) -> Result<String, ExtractError> {
        Ok(decode_text(data))
    }
}

/// Decode bytes as UTF-8 (minus a leading BOM), or as Latin-1 when that fails.
pub fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        // Latin-1 maps every byte to the code point of the same value
        Err(_) => data.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_utf8() {
        let extractor = PlainTextExtractor::new();
        let text = extractor
            .extract("Preço: R$ 99 por mês".as_bytes(), "pricing.txt")
            .await
            .unwrap();
        assert_eq!(text, "Preço: R$ 99 por mês");
    }

    #[tokio::test]
    async fn test_extract_latin1_fallback() {
        // "Preço" in Latin-1: 0xE7 is not valid UTF-8 on its own
        let bytes = [b'P', b'r', b'e', 0xE7, b'o'];
        let text = PlainTextExtractor::new()
            .extract(&bytes, "legacy.txt")
            .await
            .unwrap();
        assert_eq!(text, "Preço");
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = "\u{feff}hello".as_bytes();
        assert_eq!(decode_text(bytes), "hello");
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode_text(&[]), "");
    }
}
