//! Mapping between typed records and spreadsheet rows
//!
//! A record type declares its fields once through a [`Schema`]: each field is
//! bound to a header column by an annotation such as `"Account,text,width:20"`,
//! and at most one string-keyed map can capture the columns no field claims
//! (`"extra,pattern:^\d{2}:\d{2}$"`). The [`Importer`] reads xlsx/xls/ods/CSV
//! tables into records, eagerly or as a stream of per-row results; the
//! [`Exporter`] writes records back as an xlsx workbook.
//!
//! ```ignore
//! let importer = Importer::<Reading>::new(ImportConfig::new().sheet("Data"))?;
//! let readings = importer.import_local("readings.xlsx")?;
//!
//! let exporter = Exporter::<Reading>::new(ExportConfig::new().file_name("out.xlsx"))?;
//! let response = exporter.export(&readings)?;
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod exporter;
pub mod importer;
pub mod index;
pub mod materialize;
pub mod remote;
pub mod table;
pub mod traverse;
pub mod value;

pub use catalog::{CaptureKind, DynamicMap, Record, Schema, SchemaBuilder, Tag};
pub use config::{ExportConfig, ExportOptions, ImportConfig, ImportOptions};
pub use error::{MappingError, SchemaError};
pub use exporter::{DownloadResponse, Exporter};
pub use importer::Importer;
pub use index::ColumnIndex;
pub use remote::{RemoteFile, fetch_remote};
pub use traverse::{RowResult, RowStream};
pub use value::{FieldKind, FieldType, Value};
