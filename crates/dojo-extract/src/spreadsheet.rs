//! Spreadsheet extractor for Excel workbooks.

use std::io::Cursor;

use async_trait::async_trait;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use dojo_core::{ExtractError, TextExtractor};
use tracing::{debug, warn};

/// Extractor for `.xlsx` and `.xls` workbooks.
///
/// Every sheet is rendered as a `[Sheet: name]` header, a `Columns:` line
/// from the first non-empty row, and one `Row n:` line per following row
/// with cells separated by ` | `.
pub struct SpreadsheetExtractor;

impl SpreadsheetExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for SpreadsheetExtractor {
    fn name(&self) -> &str {
        "spreadsheet"
    }

    fn extensions(&self) -> &[&str] {
        &["xlsx", "xls"]
    }

    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractError> {
        debug!("Extracting workbook: {}", filename);

        let bytes = data.to_vec();
        tokio::task::spawn_blocking(move || render_workbook(bytes))
            .await
            .map_err(|e| ExtractError::malformed(filename, e))?
            .map_err(|e| ExtractError::malformed(filename, e))
    }
}

fn render_workbook(bytes: Vec<u8>) -> Result<String, calamine::Error> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let mut sections = Vec::new();

    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                warn!("Skipping unreadable sheet {}: {}", name, e);
                continue;
            }
        };

        let mut rows = range
            .rows()
            .map(render_row)
            .filter(|row| !row.is_empty());

        let mut lines = vec![format!("[Sheet: {name}]")];
        if let Some(header) = rows.next() {
            lines.push(format!("Columns: {header}"));
        }
        lines.extend(rows.enumerate().map(|(i, row)| format!("Row {}: {row}", i + 1)));
        sections.push(lines.join("\n"));
    }

    Ok(sections.join("\n\n"))
}

fn render_row(cells: &[Data]) -> String {
    cells
        .iter()
        .filter(|cell| !matches!(cell, Data::Empty))
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}
