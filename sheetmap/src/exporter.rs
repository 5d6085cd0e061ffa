//! Export entry points

use std::sync::Arc;

use crate::catalog::{Record, Schema};
use crate::config::ExportConfig;
use crate::error::{MappingError, SchemaError};
use crate::materialize::{ExportColumn, RowWriter};
use crate::table::{TableSink, XlsxSink};

pub use crate::table::XLSX_CONTENT_TYPE;

/// Width applied to columns without an explicit width
pub const DEFAULT_COLUMN_WIDTH: f64 = 15.0;

/// Last 1-based row covered by dropdown lists
const DROPDOWN_LAST_ROW: u32 = 1000;

/// A serialized workbook ready to hand to a client
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResponse {
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Writes records of type `R` as a single-sheet workbook
pub struct Exporter<R> {
    writer: RowWriter<R>,
}

impl<R: Record> Exporter<R> {
    pub fn new(config: ExportConfig) -> Result<Self, SchemaError> {
        Self::with_schema(Arc::new(R::schema()?), config)
    }
}

impl<R> Exporter<R> {
    pub fn with_schema(schema: Arc<Schema<R>>, config: ExportConfig) -> Result<Self, SchemaError> {
        Ok(Exporter {
            writer: RowWriter::new(schema, config)?,
        })
    }

    /// Output columns in order
    pub fn columns(&self) -> &[ExportColumn] {
        self.writer.columns()
    }

    pub fn export(&self, records: &[R]) -> Result<DownloadResponse, MappingError> {
        let options = &self.writer.config().options;
        let mut sink = XlsxSink::new(&options.sheet_name).map_err(sink_error)?;
        let content = self.export_to(&mut sink, records)?;

        log::info!(
            "Exported {} records to {} ({} bytes)",
            records.len(),
            options.file_name,
            content.len()
        );
        Ok(DownloadResponse {
            file_name: options.file_name.clone(),
            file_size: content.len() as u64,
            content_type: XLSX_CONTENT_TYPE.to_string(),
            content,
        })
    }

    /// Write header, layout and rows to `sink`, then serialize it
    ///
    /// Stops at the first failing record; the error carries its sheet row.
    pub fn export_to<S: TableSink + ?Sized>(&self, sink: &mut S, records: &[R]) -> Result<Vec<u8>, MappingError> {
        self.write_layout(sink).map_err(sink_error)?;

        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            self.writer
                .fill_row(sink, row as u32, record)
                .map_err(|e| e.at_row(row + 1))?;
        }

        sink.finish().map_err(sink_error)
    }

    fn write_layout<S: TableSink + ?Sized>(&self, sink: &mut S) -> anyhow::Result<()> {
        let options = &self.writer.config().options;
        for (i, column) in self.writer.columns().iter().enumerate() {
            let col = u16::try_from(i).map_err(|_| anyhow::anyhow!("too many columns: {}", i + 1))?;
            sink.set_header(col, &column.header)?;
            sink.set_column_width(col, column.width.unwrap_or(DEFAULT_COLUMN_WIDTH))?;
            if column.text {
                sink.style_text_column(col)?;
            }
            match options.dropdowns.get(&column.header) {
                Some(values) if !values.is_empty() => {
                    sink.add_dropdown(col, 1, DROPDOWN_LAST_ROW - 1, values)?;
                }
                _ => {}
            }
        }

        for header in options.dropdowns.keys() {
            if !self.writer.columns().iter().any(|c| &c.header == header) {
                log::warn!("Dropdown for unknown header '{}' ignored", header);
            }
        }
        Ok(())
    }
}

fn sink_error(e: anyhow::Error) -> MappingError {
    MappingError::Sink(format!("{:#}", e))
}
