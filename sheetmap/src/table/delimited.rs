//! Streaming CSV source

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::{Reader, ReaderBuilder};

use super::{RowIter, TableSource};

/// A CSV file exposed as a single-sheet table
///
/// Rows are read from the underlying reader one at a time.
pub struct CsvSource<Rd> {
    reader: Reader<Rd>,
    sheet: String,
}

impl CsvSource<File> {
    /// Open a file; the sheet is named after the file stem
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
        let sheet = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string();
        Ok(Self::with_sheet_name(file, sheet))
    }
}

impl<Rd: Read> CsvSource<Rd> {
    pub fn from_reader(reader: Rd) -> Self {
        Self::with_sheet_name(reader, "Sheet1")
    }

    pub fn with_sheet_name(reader: Rd, sheet: impl Into<String>) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        CsvSource {
            reader,
            sheet: sheet.into(),
        }
    }
}

impl<Rd: Read + Send> TableSource for CsvSource<Rd> {
    fn sheet_names(&mut self) -> Vec<String> {
        vec![self.sheet.clone()]
    }

    fn rows(&mut self, sheet: &str) -> Result<RowIter<'_>> {
        if sheet != self.sheet {
            bail!("CSV source has no sheet named {}", sheet);
        }
        let rows = self.reader.records().enumerate().map(|(i, record)| {
            record
                .map(|r| r.iter().map(str::to_string).collect::<Vec<String>>())
                .with_context(|| format!("Failed to read CSV row {}", i + 1))
        });
        Ok(Box::new(rows))
    }
}
