//! Walking a table's rows into records
//!
//! Both drivers share the same positioning: resolve the sheet, read the header
//! row, check the required columns, then yield data rows from the start row on,
//! skipping configured and blank rows. The eager driver stops at the first
//! failing row; the streaming driver reports each row on its own.

mod eager;
mod stream;

use std::collections::BTreeSet;

use crate::error::MappingError;
use crate::index::ColumnIndex;
use crate::materialize::RowMaterializer;
use crate::table::{RowIter, TableSource, is_blank_row, resolve_sheet};

pub use eager::import_all;
pub use stream::{RowStream, spawn_stream};
pub(crate) use stream::{channel, produce};

/// Outcome of one data row in a streaming import
#[derive(Debug)]
pub struct RowResult<R> {
    /// 1-based row number in the sheet
    pub row_index: usize,
    pub record: Option<R>,
    pub error: Option<MappingError>,
}

impl<R> RowResult<R> {
    pub(crate) fn ok(row_index: usize, record: R) -> Self {
        RowResult {
            row_index,
            record: Some(record),
            error: None,
        }
    }

    pub(crate) fn failed(row_index: usize, error: MappingError) -> Self {
        RowResult {
            row_index,
            record: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<R, MappingError> {
        match (self.record, self.error) {
            (_, Some(err)) => Err(err),
            (Some(record), None) => Ok(record),
            (None, None) => Err(MappingError::Structural(format!(
                "row {} produced no record",
                self.row_index
            ))),
        }
    }
}

/// Data rows after the header, numbered from 1
pub(crate) struct DataRows<'a> {
    rows: RowIter<'a>,
    number: usize,
    start_row: usize,
    skip_rows: &'a BTreeSet<usize>,
}

impl DataRows<'_> {
    /// Number of the last row read
    pub(crate) fn position(&self) -> usize {
        self.number
    }
}

impl Iterator for DataRows<'_> {
    type Item = Result<(usize, Vec<String>), MappingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = self.rows.next()?;
            self.number += 1;
            let row = match row {
                Ok(row) => row,
                Err(e) => return Some(Err(unreadable(e))),
            };
            if self.number < self.start_row
                || self.skip_rows.contains(&self.number)
                || is_blank_row(&row)
            {
                continue;
            }
            return Some(Ok((self.number, row)));
        }
    }
}

/// Position a source at its first data row
///
/// Fails when the sheet is absent, the header row lies past the end of the
/// table, or the header lacks bound columns.
pub(crate) fn read_header<'a, R, S: TableSource + ?Sized>(
    materializer: &'a RowMaterializer<R>,
    source: &'a mut S,
) -> Result<(ColumnIndex, DataRows<'a>), MappingError> {
    let options = materializer.options();
    let sheet = resolve_sheet(source, &options.sheet_name)?;
    let mut rows = source.rows(&sheet).map_err(unreadable)?;

    let mut number = 0;
    let header = loop {
        let Some(row) = rows.next() else {
            return Err(MappingError::Structural("insufficient rows".to_string()));
        };
        number += 1;
        let row = row.map_err(unreadable)?;
        if number >= options.header_row {
            break row;
        }
    };

    let index = ColumnIndex::build(&header[..]);
    let missing = index.missing(materializer.required_columns());
    if !missing.is_empty() {
        return Err(MappingError::MissingColumns(missing));
    }
    log::debug!(
        "Sheet '{}': header at row {} with {} columns",
        sheet,
        number,
        index.len()
    );

    Ok((
        index,
        DataRows {
            rows,
            number,
            start_row: options.start_row,
            skip_rows: &options.skip_rows,
        },
    ))
}

fn unreadable(e: anyhow::Error) -> MappingError {
    MappingError::Structural(format!("{:#}", e))
}
