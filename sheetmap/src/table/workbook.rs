//! Spreadsheet source backed by calamine (xlsx, xlsm, xlsb, xls, ods)

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, DataType, Range, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};

use crate::value::DATETIME_FORMAT;

use super::{RowIter, TableSource};

pub struct WorkbookSource<RS> {
    workbook: Sheets<RS>,
}

impl WorkbookSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;
        Ok(WorkbookSource { workbook })
    }
}

impl WorkbookSource<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes)).context("Failed to open Excel data")?;
        Ok(WorkbookSource { workbook })
    }
}

impl<RS: Read + Seek + Send> TableSource for WorkbookSource<RS> {
    fn sheet_names(&mut self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// xlsx sheets are read cell by cell as rows are pulled; other formats load the sheet first
    fn rows(&mut self, sheet: &str) -> Result<RowIter<'_>> {
        match &mut self.workbook {
            Sheets::Xlsx(xlsx) => {
                let mut reader = xlsx
                    .worksheet_cells_reader(sheet)
                    .with_context(|| format!("Failed to read sheet: {}", sheet))?;
                let width = reader.dimensions().end.1 as usize + 1;
                let mut rows = CellRows::new(width);
                Ok(Box::new(std::iter::from_fn(move || {
                    rows.next_row(|| {
                        reader
                            .next_cell()
                            .map(|cell| cell.map(|c| (c.get_position(), Data::from(c.get_value().clone()))))
                    })
                })))
            }
            workbook => {
                let range = workbook
                    .worksheet_range(sheet)
                    .with_context(|| format!("Failed to read sheet: {}", sheet))?;
                Ok(Box::new(SheetRows::new(range).map(Ok)))
            }
        }
    }
}

/// Groups a row-major cell feed into absolute rows
///
/// Rows with no cells come back empty; every non-empty row is padded to the
/// sheet's declared width.
struct CellRows {
    width: usize,
    next: u32,
    pending: Option<((u32, u32), Data)>,
    done: bool,
}

impl CellRows {
    fn new(width: usize) -> Self {
        CellRows {
            width,
            next: 0,
            pending: None,
            done: false,
        }
    }

    fn next_row<F, E>(&mut self, mut next_cell: F) -> Option<Result<Vec<String>>>
    where
        F: FnMut() -> std::result::Result<Option<((u32, u32), Data)>, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if self.done && self.pending.is_none() {
            return None;
        }
        let row = self.next;
        let mut cells = Vec::new();
        loop {
            if self.pending.is_none() && !self.done {
                match next_cell() {
                    Ok(Some(cell)) => self.pending = Some(cell),
                    Ok(None) => self.done = true,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(anyhow::Error::new(e).context(format!("Failed to read row {}", row + 1))));
                    }
                }
            }
            match self.pending.take() {
                Some(((r, c), data)) if r <= row => {
                    if data.is_empty() {
                        continue;
                    }
                    let c = c as usize;
                    if cells.len() <= c {
                        cells.resize(c.max(self.width - 1) + 1, String::new());
                    }
                    cells[c] = cell_text(&data);
                }
                other => {
                    self.pending = other;
                    break;
                }
            }
        }
        self.next += 1;
        Some(Ok(cells))
    }
}

/// Rows of a sheet in absolute positions
///
/// calamine ranges start at the first used cell, so leading empty rows and
/// columns are padded back in to keep 1-based row numbers and header offsets
/// matching what the user sees.
struct SheetRows {
    range: Range<Data>,
    row_offset: usize,
    col_offset: usize,
    next: usize,
    total: usize,
}

impl SheetRows {
    fn new(range: Range<Data>) -> Self {
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let total = if range.is_empty() {
            0
        } else {
            row_offset + range.height()
        };
        SheetRows {
            range,
            row_offset,
            col_offset,
            next: 0,
            total,
        }
    }
}

impl Iterator for SheetRows {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        if self.next >= self.total {
            return None;
        }
        let row = self.next;
        self.next += 1;

        let mut cells = vec![String::new(); self.col_offset];
        if row >= self.row_offset {
            let rel = row - self.row_offset;
            cells.extend(
                (0..self.range.width())
                    .map(|c| self.range.get((rel, c)).map(cell_text).unwrap_or_default()),
            );
        }
        Some(cells)
    }
}

/// Render a cell as the text the importer parses
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Whole numbers come back without the trailing ".0"
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn workbook_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Data").unwrap();
        // Leave row 1 and column A empty
        sheet.write_string(1, 1, "id").unwrap();
        sheet.write_string(1, 2, "score").unwrap();
        sheet.write_number(2, 1, 7.0).unwrap();
        sheet.write_number(2, 2, 88.5).unwrap();
        sheet.write_boolean(3, 2, true).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_rows_keep_absolute_positions() {
        let mut source = WorkbookSource::from_bytes(workbook_bytes()).unwrap();
        assert_eq!(source.sheet_names(), vec!["Data"]);

        let rows: Vec<Vec<String>> = source
            .rows("Data")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 4);
        assert!(rows[0].iter().all(|c| c.is_empty()));
        assert_eq!(rows[1], vec!["", "id", "score"]);
        assert_eq!(rows[2], vec!["", "7", "88.5"]);
        assert_eq!(rows[3], vec!["", "", "true"]);
    }

    #[test]
    fn test_missing_sheet_is_error() {
        let mut source = WorkbookSource::from_bytes(workbook_bytes()).unwrap();
        assert!(source.rows("Nope").is_err());
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(12.0)), "12");
        assert_eq!(cell_text(&Data::Float(0.25)), "0.25");
        assert_eq!(cell_text(&Data::String("0012345".into())), "0012345");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn test_cell_rows_group_feed() {
        let mut feed = vec![
            Ok(Some(((1, 1), Data::String("id".into())))),
            Ok(Some(((1, 2), Data::Empty))),
            Ok(Some(((3, 2), Data::Float(4.0)))),
            Ok(Some(((4, 0), Data::Bool(true)))),
            Err(std::io::Error::other("truncated")),
        ]
        .into_iter();
        let mut rows = CellRows::new(3);
        let mut next = || rows.next_row(|| feed.next().unwrap_or(Ok(None)));

        assert_eq!(next().unwrap().unwrap(), Vec::<String>::new());
        assert_eq!(next().unwrap().unwrap(), vec!["", "id", ""]);
        assert_eq!(next().unwrap().unwrap(), Vec::<String>::new());
        assert_eq!(next().unwrap().unwrap(), vec!["", "", "4"]);

        // A feed error ends the sheet
        let err = next().unwrap().unwrap_err();
        assert!(format!("{:#}", err).contains("truncated"));
        assert!(next().is_none());
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(WorkbookSource::from_bytes(b"not a workbook".to_vec()).is_err());
    }
}
