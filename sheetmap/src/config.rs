//! Import and export configuration
//!
//! The serialisable part of each config lives in [`ImportOptions`] /
//! [`ExportOptions`] and can be loaded from TOML or JSON. Converters, validators and
//! hooks are attached in code on [`ImportConfig`] / [`ExportConfig`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::index::ColumnIndex;
use crate::value::Value;

/// Parses raw cell text for one field, replacing the built-in parse
pub type ImportConverter = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;
/// Checks a materialized field value
pub type Validator = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;
/// Runs after a record is filled, with the raw row and the column index
pub type RowHook<R> = Arc<dyn Fn(&mut R, &[String], &ColumnIndex) -> Result<()> + Send + Sync>;
/// Maps a field value to the value written to the cell
pub type ExportConverter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Serialisable import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Sheet to read; empty selects the first sheet
    pub sheet_name: String,
    /// 1-based header row
    pub header_row: usize,
    /// 1-based first data row
    pub start_row: usize,
    /// Column -> field overrides applied on top of the schema annotations
    pub field_mappings: BTreeMap<String, String>,
    /// Field -> value used when the cell is empty or the column is absent
    pub default_values: BTreeMap<String, Value>,
    /// 1-based row numbers to skip
    pub skip_rows: BTreeSet<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            sheet_name: String::new(),
            header_row: 1,
            start_row: 2,
            field_mappings: BTreeMap::new(),
            default_values: BTreeMap::new(),
            skip_rows: BTreeSet::new(),
        }
    }
}

impl ImportOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse import options")
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Failed to parse import options")
    }
}

/// Import settings for record type `R`
pub struct ImportConfig<R> {
    pub options: ImportOptions,
    pub converters: HashMap<String, ImportConverter>,
    pub validators: HashMap<String, Validator>,
    pub row_hook: Option<RowHook<R>>,
}

impl<R> Default for ImportConfig<R> {
    fn default() -> Self {
        ImportConfig {
            options: ImportOptions::default(),
            converters: HashMap::new(),
            validators: HashMap::new(),
            row_hook: None,
        }
    }
}

impl<R> Clone for ImportConfig<R> {
    fn clone(&self) -> Self {
        ImportConfig {
            options: self.options.clone(),
            converters: self.converters.clone(),
            validators: self.validators.clone(),
            row_hook: self.row_hook.clone(),
        }
    }
}

impl<R> ImportConfig<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ImportOptions) -> Self {
        ImportConfig {
            options,
            ..Self::default()
        }
    }

    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.options.sheet_name = name.into();
        self
    }

    pub fn header_row(mut self, row: usize) -> Self {
        self.options.header_row = row;
        self
    }

    pub fn start_row(mut self, row: usize) -> Self {
        self.options.start_row = row;
        self
    }

    /// Bind `column` to `field`, replacing the field's annotated column
    pub fn map_column(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.options.field_mappings.insert(column.into(), field.into());
        self
    }

    pub fn default_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.default_values.insert(field.into(), value.into());
        self
    }

    pub fn skip_row(mut self, row: usize) -> Self {
        self.options.skip_rows.insert(row);
        self
    }

    pub fn converter<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.converters.insert(field.into(), Arc::new(f));
        self
    }

    pub fn validator<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.validators.insert(field.into(), Arc::new(f));
        self
    }

    pub fn row_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut R, &[String], &ColumnIndex) -> Result<()> + Send + Sync + 'static,
    {
        self.row_hook = Some(Arc::new(f));
        self
    }
}

/// Serialisable export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub file_name: String,
    pub sheet_name: String,
    /// Explicit header order; empty uses the schema's declaration order
    pub headers: Vec<String>,
    /// Headers whose cells are written as text
    pub text_columns: BTreeSet<String>,
    /// Header -> column width
    pub column_widths: BTreeMap<String, f64>,
    /// Header -> allowed values offered as a dropdown list
    pub dropdowns: BTreeMap<String, Vec<String>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            file_name: "export.xlsx".to_string(),
            sheet_name: "Sheet1".to_string(),
            headers: Vec::new(),
            text_columns: BTreeSet::new(),
            column_widths: BTreeMap::new(),
            dropdowns: BTreeMap::new(),
        }
    }
}

impl ExportOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse export options")
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Failed to parse export options")
    }
}

/// Export settings
#[derive(Clone, Default)]
pub struct ExportConfig {
    pub options: ExportOptions,
    pub converters: HashMap<String, ExportConverter>,
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExportOptions) -> Self {
        ExportConfig {
            options,
            converters: HashMap::new(),
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.options.file_name = name.into();
        self
    }

    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.options.sheet_name = name.into();
        self
    }

    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn text_column(mut self, header: impl Into<String>) -> Self {
        self.options.text_columns.insert(header.into());
        self
    }

    pub fn column_width(mut self, header: impl Into<String>, width: f64) -> Self {
        self.options.column_widths.insert(header.into(), width);
        self
    }

    pub fn dropdown<I, S>(mut self, header: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .dropdowns
            .insert(header.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn converter<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.converters.insert(field.into(), Arc::new(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_defaults() {
        let options = ImportOptions::default();
        assert_eq!(options.header_row, 1);
        assert_eq!(options.start_row, 2);
        assert!(options.sheet_name.is_empty());
    }

    #[test]
    fn test_import_options_from_toml() {
        let options = ImportOptions::from_toml_str(
            r#"
            sheet_name = "Data"
            start_row = 3
            skip_rows = [4, 7]

            [field_mappings]
            "Client No" = "account"

            [default_values]
            score = { type = "Float", value = 1.5 }
            "#,
        )
        .unwrap();

        assert_eq!(options.sheet_name, "Data");
        assert_eq!(options.header_row, 1);
        assert_eq!(options.start_row, 3);
        assert!(options.skip_rows.contains(&7));
        assert_eq!(options.field_mappings["Client No"], "account");
        assert_eq!(options.default_values["score"], Value::Float(1.5));
    }

    #[test]
    fn test_export_options_from_toml() {
        let options = ExportOptions::from_toml_str(
            r#"
            headers = ["Name", "Age"]
            text_columns = ["Name"]

            [column_widths]
            Name = 30.0

            [dropdowns]
            Status = ["open", "closed"]
            "#,
        )
        .unwrap();

        assert_eq!(options.file_name, "export.xlsx");
        assert_eq!(options.sheet_name, "Sheet1");
        assert_eq!(options.headers, vec!["Name", "Age"]);
        assert_eq!(options.column_widths["Name"], 30.0);
        assert_eq!(options.dropdowns["Status"], vec!["open", "closed"]);
    }

    #[test]
    fn test_options_from_json() {
        let options = ImportOptions::from_json_str(
            r#"{"header_row": 2, "default_values": {"active": {"type": "Bool", "value": true}}}"#,
        )
        .unwrap();
        assert_eq!(options.header_row, 2);
        assert_eq!(options.start_row, 2);
        assert_eq!(options.default_values["active"], Value::Bool(true));

        let options = ExportOptions::from_json_str(r#"{"file_name": "out.xlsx"}"#).unwrap();
        assert_eq!(options.file_name, "out.xlsx");
        assert_eq!(options.sheet_name, "Sheet1");
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let err = ImportOptions::from_toml_str("header_row = \"one\"").unwrap_err();
        assert!(err.to_string().contains("Failed to parse import options"));
    }
}
