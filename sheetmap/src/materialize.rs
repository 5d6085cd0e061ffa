//! One record <-> one row

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::catalog::{DynamicField, FieldDef, Schema};
use crate::codec::{self, Decoder};
use crate::config::{ExportConfig, ExportOptions, ImportConfig, ImportOptions};
use crate::error::{MappingError, SchemaError};
use crate::index::ColumnIndex;
use crate::table::TableSink;

/// Fills records from rows for one import configuration
pub struct RowMaterializer<R> {
    schema: Arc<Schema<R>>,
    config: ImportConfig<R>,
    /// (column, field position) in declaration order
    bindings: Vec<(String, usize)>,
}

impl<R> RowMaterializer<R> {
    /// Resolve the schema's bindings against the config's overrides
    ///
    /// Fails when the config names fields the schema does not declare, or when
    /// two fields end up bound to the same column.
    pub fn new(schema: Arc<Schema<R>>, mut config: ImportConfig<R>) -> Result<Self, SchemaError> {
        let options = &mut config.options;
        if options.header_row == 0 {
            options.header_row = 1;
        }
        if options.start_row == 0 {
            options.start_row = 2;
        }

        let mut columns: Vec<Option<String>> = schema
            .fields()
            .iter()
            .map(|f| f.column().map(str::to_string))
            .collect();

        for (column, field) in &options.field_mappings {
            let (pos, _) = known_field(&*schema, field, "field mapping")?;
            columns[pos] = Some(column.clone());
        }

        let mut seen = HashSet::new();
        let mut bindings = Vec::new();
        for (pos, column) in columns.into_iter().enumerate() {
            let Some(column) = column else { continue };
            if !seen.insert(column.clone()) {
                return Err(SchemaError::DuplicateColumn(column));
            }
            bindings.push((column, pos));
        }

        for field in config.converters.keys() {
            known_field(&*schema, field, "converter")?;
        }
        for field in config.validators.keys() {
            if schema.dynamic().is_some_and(|d| d.name() == field) {
                return Err(SchemaError::DynamicValidator(field.clone()));
            }
            known_field(&*schema, field, "validator")?;
        }
        for field in config.options.default_values.keys() {
            known_field(&*schema, field, "default value")?;
        }

        Ok(RowMaterializer {
            schema,
            config,
            bindings,
        })
    }

    pub fn schema(&self) -> &Schema<R> {
        &self.schema
    }

    pub fn options(&self) -> &ImportOptions {
        &self.config.options
    }

    /// Columns the header must contain
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(c, _)| c.as_str())
    }

    /// Fill `out` from one row
    ///
    /// Ordinary bindings first, then dynamic capture, then the row hook, then validators.
    pub fn fill(&self, row: &[String], index: &ColumnIndex, out: &mut R) -> Result<(), MappingError> {
        let decoder = Decoder::new(&self.config.converters, &self.config.options.default_values);
        let fields = self.schema.fields();
        let mut claimed = HashSet::new();

        for (column, pos) in &self.bindings {
            let def = &fields[*pos];
            let Some(col) = index.get(column) else {
                apply_default(&decoder, def, out)?;
                continue;
            };
            claimed.insert(col);

            let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
            if cell.is_empty() {
                apply_default(&decoder, def, out)?;
                continue;
            }

            let value = decoder.decode(cell, def.kind(), def.is_optional(), def.name())?;
            def.set(out, value)?;
        }

        if let Some(dynamic) = self.schema.dynamic() {
            capture(dynamic, row, index, &claimed, out);
        }

        if let Some(hook) = &self.config.row_hook {
            hook(out, row, index).map_err(MappingError::Hook)?;
        }

        self.validate(out)
    }

    fn validate(&self, record: &R) -> Result<(), MappingError> {
        for def in self.schema.fields() {
            if let Some(validator) = self.config.validators.get(def.name()) {
                validator(&def.get(record)).map_err(|source| MappingError::Validation {
                    field: def.name().to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

impl<R: Default> RowMaterializer<R> {
    /// Build a fresh record from one row
    pub fn materialize(&self, row: &[String], index: &ColumnIndex) -> Result<R, MappingError> {
        let mut record = R::default();
        self.fill(row, index, &mut record)?;
        Ok(record)
    }
}

fn known_field<'a, R>(
    schema: &'a Schema<R>,
    field: &str,
    context: &'static str,
) -> Result<(usize, &'a FieldDef<R>), SchemaError> {
    schema.field(field).ok_or_else(|| SchemaError::UnknownField {
        field: field.to_string(),
        context,
    })
}

fn apply_default<R>(decoder: &Decoder<'_>, def: &FieldDef<R>, out: &mut R) -> Result<(), MappingError> {
    match decoder.default_for(def.name()) {
        Some(value) => def.set(out, value.clone()),
        None => Ok(()),
    }
}

/// Copy unclaimed, filter-matching, non-empty cells into the dynamic field
///
/// Cells that do not parse as the map's value type are skipped.
fn capture<R>(
    dynamic: &DynamicField<R>,
    row: &[String],
    index: &ColumnIndex,
    claimed: &HashSet<usize>,
    out: &mut R,
) {
    for (name, col) in index.iter() {
        if claimed.contains(&col) || !dynamic.accepts(name) {
            continue;
        }
        let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
        if cell.is_empty() {
            continue;
        }
        let inserted = codec::decode_capture(cell, dynamic.capture())
            .is_some_and(|value| dynamic.insert(out, name.to_string(), value));
        if !inserted {
            log::debug!("Skipping '{}' in column {}: not a {:?} value", cell, name, dynamic.capture());
        }
    }
}

/// Output column resolved for export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportColumn {
    pub header: String,
    /// Bound field position; unbound headers produce empty cells
    pub field: Option<usize>,
    pub text: bool,
    pub width: Option<f64>,
}

/// Writes records as rows for one export configuration
pub struct RowWriter<R> {
    schema: Arc<Schema<R>>,
    config: ExportConfig,
    columns: Vec<ExportColumn>,
}

impl<R> RowWriter<R> {
    /// Resolve output columns; empty sheet or file names fall back to the defaults
    pub fn new(schema: Arc<Schema<R>>, mut config: ExportConfig) -> Result<Self, SchemaError> {
        let defaults = ExportOptions::default();
        let options = &mut config.options;
        if options.sheet_name.trim().is_empty() {
            options.sheet_name = defaults.sheet_name;
        }
        if options.file_name.trim().is_empty() {
            options.file_name = defaults.file_name;
        }

        let options = &config.options;
        let headers = if options.headers.is_empty() {
            schema.inferred_headers()
        } else {
            options.headers.clone()
        };

        let by_column: HashMap<&str, usize> = schema.bindings().collect();
        let fields = schema.fields();
        let columns = headers
            .into_iter()
            .map(|header| {
                let field = by_column.get(header.as_str()).copied();
                let def = field.map(|pos| &fields[pos]);
                let text = options.text_columns.contains(&header) || def.is_some_and(|d| d.is_text());
                let width = options
                    .column_widths
                    .get(&header)
                    .copied()
                    .or_else(|| def.and_then(|d| d.width()));
                ExportColumn {
                    header,
                    field,
                    text,
                    width,
                }
            })
            .collect();

        for field in config.converters.keys() {
            known_field(&*schema, field, "export converter")?;
        }

        Ok(RowWriter {
            schema,
            config,
            columns,
        })
    }

    pub fn columns(&self) -> &[ExportColumn] {
        &self.columns
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Write one record at zero-based `row`
    pub fn fill_row<S: TableSink + ?Sized>(
        &self,
        sink: &mut S,
        row: u32,
        record: &R,
    ) -> Result<(), MappingError> {
        let fields = self.schema.fields();
        for (col, column) in self.columns.iter().enumerate() {
            let Some(pos) = column.field else { continue };
            let def = &fields[pos];
            let value = codec::encode(def.get(record), self.config.converters.get(def.name()));
            sink.set_cell(row, col as u16, &value, column.text)
                .map_err(|e| MappingError::Sink(format!("{:#}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        age: u8,
        nickname: Option<String>,
        extra: BTreeMap<String, String>,
    }

    fn schema() -> Arc<Schema<Person>> {
        Arc::new(
            Schema::builder()
                .field("id", "id", |p: &Person| &p.id, |p| &mut p.id)
                .field("name", "name", |p: &Person| &p.name, |p| &mut p.name)
                .field("age", "age", |p: &Person| &p.age, |p| &mut p.age)
                .field("nickname", "-", |p: &Person| &p.nickname, |p| &mut p.nickname)
                .dynamic("extra", r"extra,pattern:^\d{2}:\d{2}$", |p: &mut Person| &mut p.extra)
                .build()
                .unwrap(),
        )
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_dynamic_capture_filter() {
        let m = RowMaterializer::new(schema(), ImportConfig::new()).unwrap();
        let index = ColumnIndex::build(&["id", "name", "00:30", "01:00", "note"]);
        let person = m
            .materialize(&row(&["1", "alice", "10", "20", "hello"]), &index)
            .unwrap();

        assert_eq!(person.id, 1);
        assert_eq!(person.name, "alice");
        let expected: BTreeMap<String, String> =
            [("00:30", "10"), ("01:00", "20")].into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        assert_eq!(person.extra, expected);
    }

    #[test]
    fn test_missing_and_empty_cells_use_defaults() {
        let config = ImportConfig::new().default_value("age", Value::Int(30));
        let m = RowMaterializer::new(schema(), config).unwrap();

        // Column absent
        let index = ColumnIndex::build(&["id", "name"]);
        let p = m.materialize(&row(&["1", "bob"]), &index).unwrap();
        assert_eq!(p.age, 30);

        // Cell blank, short row
        let index = ColumnIndex::build(&["id", "name", "age"]);
        let p = m.materialize(&row(&["2", "carol", "   "]), &index).unwrap();
        assert_eq!(p.age, 30);
        let p = m.materialize(&row(&["3"]), &index).unwrap();
        assert_eq!(p.age, 30);
        assert_eq!(p.name, "");
    }

    #[test]
    fn test_without_default_field_stays_zero() {
        let m = RowMaterializer::new(schema(), ImportConfig::new()).unwrap();
        let index = ColumnIndex::build(&["id", "name", "age"]);
        let p = m.materialize(&row(&["4", "", ""]), &index).unwrap();
        assert_eq!(p, Person { id: 4, ..Person::default() });
    }

    #[test]
    fn test_conversion_error_fails_row() {
        let m = RowMaterializer::new(schema(), ImportConfig::new()).unwrap();
        let index = ColumnIndex::build(&["id", "name", "age"]);
        let err = m.materialize(&row(&["x", "dan", "1"]), &index).unwrap_err();
        assert!(matches!(err, MappingError::Conversion { ref field, .. } if field == "id"));

        // 300 parses as an integer but does not fit u8
        let err = m.materialize(&row(&["1", "dan", "300"]), &index).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { ref field, .. } if field == "age"));
    }

    #[test]
    fn test_column_override_binds_untagged_field() {
        let config = ImportConfig::new().map_column("alias", "nickname");
        let m = RowMaterializer::new(schema(), config).unwrap();
        assert_eq!(m.required_columns().collect::<Vec<_>>(), vec!["id", "name", "age", "alias"]);

        let index = ColumnIndex::build(&["id", "name", "age", "alias"]);
        let p = m.materialize(&row(&["1", "eve", "5", "evie"]), &index).unwrap();
        assert_eq!(p.nickname.as_deref(), Some("evie"));
    }

    #[test]
    fn test_column_override_replaces_annotation() {
        let config = ImportConfig::new().map_column("Full Name", "name");
        let m = RowMaterializer::new(schema(), config).unwrap();
        assert_eq!(m.required_columns().collect::<Vec<_>>(), vec!["id", "Full Name", "age"]);

        let index = ColumnIndex::build(&["id", "name", "Full Name", "age"]);
        let p = m.materialize(&row(&["1", "old", "new", "2"]), &index).unwrap();
        assert_eq!(p.name, "new");
    }

    #[test]
    fn test_unknown_config_field_rejected() {
        let config = ImportConfig::<Person>::new().validator("agee", |_| Ok(()));
        let err = RowMaterializer::new(schema(), config).err().unwrap();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                field: "agee".into(),
                context: "validator"
            }
        );

        let config = ImportConfig::<Person>::new().map_column("name", "nickname");
        let err = RowMaterializer::new(schema(), config).err().unwrap();
        assert_eq!(err, SchemaError::DuplicateColumn("name".into()));
    }

    #[test]
    fn test_dynamic_field_validator_rejected() {
        let config = ImportConfig::<Person>::new().validator("extra", |_| Ok(()));
        let err = RowMaterializer::new(schema(), config).err().unwrap();
        assert_eq!(err, SchemaError::DynamicValidator("extra".into()));
    }

    #[derive(Debug, Default, PartialEq)]
    struct Tally {
        id: i64,
        counts: HashMap<String, i64>,
    }

    #[test]
    fn test_malformed_captured_cell_skipped() {
        let schema = Arc::new(
            Schema::builder()
                .field("id", "id", |t: &Tally| &t.id, |t| &mut t.id)
                .dynamic("counts", "*", |t: &mut Tally| &mut t.counts)
                .build()
                .unwrap(),
        );
        let m = RowMaterializer::new(schema, ImportConfig::new()).unwrap();
        let index = ColumnIndex::build(&["id", "apples", "pears", "plums"]);
        let tally = m.materialize(&row(&["1", "10", "ten", "3"]), &index).unwrap();

        assert_eq!(tally.id, 1);
        let expected: HashMap<String, i64> =
            [("apples", 10), ("plums", 3)].into_iter().map(|(k, v)| (k.into(), v)).collect();
        assert_eq!(tally.counts, expected);
    }

    #[test]
    fn test_hook_then_validators() {
        let config = ImportConfig::new()
            .row_hook(|p: &mut Person, raw: &[String], index: &ColumnIndex| {
                if let Some(col) = index.get("note") {
                    p.nickname = raw.get(col).cloned();
                }
                Ok(())
            })
            .validator("age", |v: &Value| {
                if v.as_int().unwrap_or(0) < 18 {
                    anyhow::bail!("must be an adult");
                }
                Ok(())
            });
        let m = RowMaterializer::new(schema(), config).unwrap();
        let index = ColumnIndex::build(&["id", "name", "age", "note"]);

        let p = m.materialize(&row(&["1", "fay", "40", "ff"]), &index).unwrap();
        assert_eq!(p.nickname.as_deref(), Some("ff"));

        let err = m.materialize(&row(&["2", "gil", "12", ""]), &index).unwrap_err();
        match err {
            MappingError::Validation { field, source } => {
                assert_eq!(field, "age");
                assert_eq!(source.to_string(), "must be an adult");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_hook_error_fails_row() {
        let config = ImportConfig::new().row_hook(|_: &mut Person, _: &[String], _: &ColumnIndex| {
            anyhow::bail!("rejected")
        });
        let m = RowMaterializer::new(schema(), config).unwrap();
        let index = ColumnIndex::build(&["id"]);
        assert!(matches!(
            m.materialize(&row(&["1"]), &index),
            Err(MappingError::Hook(_))
        ));
    }

    #[derive(Default)]
    struct Recorded {
        cells: Vec<(u32, u16, Value, bool)>,
    }

    impl TableSink for Recorded {
        fn set_cell(&mut self, row: u32, col: u16, value: &Value, text: bool) -> anyhow::Result<()> {
            self.cells.push((row, col, value.clone(), text));
            Ok(())
        }
        fn set_header(&mut self, _: u16, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn set_column_width(&mut self, _: u16, _: f64) -> anyhow::Result<()> {
            Ok(())
        }
        fn style_text_column(&mut self, _: u16) -> anyhow::Result<()> {
            Ok(())
        }
        fn add_dropdown(&mut self, _: u16, _: u32, _: u32, _: &[String]) -> anyhow::Result<()> {
            Ok(())
        }
        fn finish(&mut self) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_fill_row_explicit_headers() {
        let config = ExportConfig::new()
            .headers(["name", "unbound", "age"])
            .text_column("age")
            .converter("name", |v: &Value| Value::String(v.to_string().to_uppercase()));
        let writer = RowWriter::new(schema(), config).unwrap();
        assert_eq!(writer.columns()[1].field, None);

        let person = Person {
            id: 1,
            name: "hal".into(),
            age: 9,
            ..Person::default()
        };
        let mut sink = Recorded::default();
        writer.fill_row(&mut sink, 1, &person).unwrap();
        assert_eq!(
            sink.cells,
            vec![
                (1, 0, Value::from("HAL"), false),
                (1, 2, Value::UInt(9), true),
            ]
        );
    }
}
