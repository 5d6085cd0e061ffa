//! Table sources and sinks
//!
//! The mapping engine only sees rows of cell text on the way in and
//! positioned cell writes on the way out; the file formats live here.

mod delimited;
mod workbook;
mod xlsx;

use std::io::Cursor;
use std::path::Path;

use anyhow::Result;

use crate::error::MappingError;
use crate::value::Value;

pub use self::delimited::CsvSource;
pub use self::workbook::WorkbookSource;
pub use self::xlsx::{XLSX_CONTENT_TYPE, XlsxSink};

/// Incremental row cursor; each row is an ordered list of cell text
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Vec<String>>> + 'a>;

/// Readable table with one or more sheets
///
/// Underlying handles are released when the source is dropped.
pub trait TableSource: Send {
    fn sheet_names(&mut self) -> Vec<String>;

    fn rows(&mut self, sheet: &str) -> Result<RowIter<'_>>;
}

impl<T: TableSource + ?Sized> TableSource for Box<T> {
    fn sheet_names(&mut self) -> Vec<String> {
        (**self).sheet_names()
    }

    fn rows(&mut self, sheet: &str) -> Result<RowIter<'_>> {
        (**self).rows(sheet)
    }
}

/// Writable table addressed by zero-based (row, column)
pub trait TableSink {
    /// Write a cell; `text` forces the value to be stored as a string
    fn set_cell(&mut self, row: u32, col: u16, value: &Value, text: bool) -> Result<()>;

    /// Write a header cell with header emphasis
    fn set_header(&mut self, col: u16, name: &str) -> Result<()>;

    fn set_column_width(&mut self, col: u16, width: f64) -> Result<()>;

    /// Apply text number format to a column's data cells
    fn style_text_column(&mut self, col: u16) -> Result<()>;

    /// Restrict a column range to a list of values
    fn add_dropdown(&mut self, col: u16, first_row: u32, last_row: u32, options: &[String]) -> Result<()>;

    /// Serialize the table
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Pick the sheet to read: the requested one, or the first when none is given
pub fn resolve_sheet<S: TableSource + ?Sized>(
    source: &mut S,
    requested: &str,
) -> Result<String, MappingError> {
    let names = source.sheet_names();
    if requested.is_empty() {
        return names
            .into_iter()
            .next()
            .ok_or_else(|| MappingError::Structural("excel file has no sheets".to_string()));
    }
    if names.iter().any(|n| n == requested) {
        Ok(requested.to_string())
    } else {
        Err(MappingError::Structural(format!(
            "sheet '{}' not found (available: {})",
            requested,
            names.join(", ")
        )))
    }
}

/// Open a local file, choosing the reader by extension
pub fn open_path(path: &Path) -> Result<Box<dyn TableSource>> {
    if has_csv_extension(path) {
        Ok(Box::new(CsvSource::open(path)?))
    } else {
        Ok(Box::new(WorkbookSource::open(path)?))
    }
}

/// Open an in-memory file, choosing the reader by `file_name`'s extension
pub fn open_bytes(bytes: Vec<u8>, file_name: &str) -> Result<Box<dyn TableSource>> {
    let path = Path::new(file_name);
    if has_csv_extension(path) {
        let sheet = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Sheet1");
        Ok(Box::new(CsvSource::with_sheet_name(Cursor::new(bytes), sheet)))
    } else {
        Ok(Box::new(WorkbookSource::from_bytes(bytes)?))
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// True when no cell holds anything but whitespace
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}
