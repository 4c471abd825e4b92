//! CSV extractor.
//!
//! Each record becomes a labelled block so that every chunk keeps the column
//! names next to the values:
//!
//! ```text
//! Row 1:
//!   product: Starter
//!   price: 49
//! ```

use async_trait::async_trait;
use dojo_core::{ExtractError, TextExtractor};

use crate::text::decode_text;

/// Extractor for `.csv` files with a header row.
pub struct CsvExtractor;

impl CsvExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for CsvExtractor {
    fn name(&self) -> &str {
        "csv"
    }

    fn extensions(&self) -> &[&str] {
        &["csv"]
    }

    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractError> {
        render_csv(&decode_text(data)).map_err(|e| ExtractError::malformed(filename, e))
    }
}

fn render_csv(text: &str) -> Result<String, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut blocks = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let mut block = format!("Row {}:\n", i + 1);
        for (column, value) in record.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let key = headers
                .get(column)
                .map_or_else(|| format!("column {}", column + 1), str::to_string);
            block.push_str(&format!("  {key}: {value}\n"));
        }
        blocks.push(block);
    }

    Ok(blocks.join("\n"))
}
