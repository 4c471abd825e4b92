//! Word document extractor.
//!
//! A `.docx` file is a zip container; the body text lives in
//! `word/document.xml` as `<w:t>` runs grouped into `<w:p>` paragraphs.
//! Only those two elements (plus tabs and line breaks) matter for plain
//! text, so the XML is scanned directly rather than parsed into a tree.

use std::io::{Cursor, Read};

use async_trait::async_trait;
use dojo_core::{ExtractError, TextExtractor};
use tracing::debug;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extractor for `.docx` files.
///
/// Also registered for `.doc`; legacy binary Word files are not zip
/// containers and fail with [`ExtractError::Malformed`].
pub struct DocxExtractor;

impl DocxExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for DocxExtractor {
    fn name(&self) -> &str {
        "docx"
    }

    fn extensions(&self) -> &[&str] {
        &["docx", "doc"]
    }

    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractError> {
        debug!("Extracting Word document: {}", filename);

        let bytes = data.to_vec();
        let xml = tokio::task::spawn_blocking(move || read_document_xml(bytes))
            .await
            .map_err(|e| ExtractError::malformed(filename, e))?
            .map_err(|reason| ExtractError::malformed(filename, reason))?;

        Ok(document_xml_to_text(&xml))
    }
}

fn read_document_xml(bytes: Vec<u8>) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a docx container: {e}"))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| format!("missing {DOCUMENT_PART}: {e}"))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| format!("unreadable {DOCUMENT_PART}: {e}"))?;
    Ok(xml)
}

/// Collect `<w:t>` text, one paragraph per `<w:p>`, paragraphs separated by
/// a blank line. Empty paragraphs are dropped.
pub(crate) fn document_xml_to_text(xml: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        if in_text {
            current.push_str(&unescape(&rest[..open]));
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default();

        match name {
            "w:t" => in_text = !self_closing,
            "/w:t" => in_text = false,
            "w:tab" => current.push('\t'),
            "w:br" | "w:cr" => current.push('\n'),
            "/w:p" => {
                let paragraph = current.trim();
                if !paragraph.is_empty() {
                    paragraphs.push(paragraph.to_string());
                }
                current.clear();
            }
            _ => {}
        }

        rest = &rest[open + close + 1..];
    }

    paragraphs.join("\n\n")
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let Some(semi) = after.find(';') else {
            out.push_str(after);
            return out;
        };
        let entity = &after[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&after[..=semi]),
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    out
}
