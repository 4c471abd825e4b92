//! Text extraction for uploaded knowledge documents.
//!
//! | Extension | Extractor |
//! |-----------|-----------|
//! | `txt` | [`PlainTextExtractor`] |
//! | `csv` | [`CsvExtractor`] |
//! | `pdf` | [`PdfExtractor`] |
//! | `docx`, `doc` | [`DocxExtractor`] |
//! | `xlsx`, `xls` | [`SpreadsheetExtractor`] |
//!
//! [`ExtractorRegistry::with_defaults`] wires them all up.

pub mod delimited;
pub mod docx;
pub mod pdf;
pub mod registry;
pub mod spreadsheet;
pub mod text;

pub use delimited::CsvExtractor;
pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use spreadsheet::SpreadsheetExtractor;
pub use text::PlainTextExtractor;
