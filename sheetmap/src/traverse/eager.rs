use crate::error::MappingError;
use crate::materialize::RowMaterializer;
use crate::table::TableSource;

use super::read_header;

/// Read every data row into a record
///
/// Stops at the first failing row; the error carries its 1-based row number.
pub fn import_all<R: Default, S: TableSource + ?Sized>(
    materializer: &RowMaterializer<R>,
    source: &mut S,
) -> Result<Vec<R>, MappingError> {
    let (index, rows) = read_header(materializer, source)?;

    let mut records = Vec::new();
    for row in rows {
        let (number, cells) = row?;
        let record = materializer
            .materialize(&cells, &index)
            .map_err(|e| e.at_row(number))?;
        records.push(record);
    }

    log::debug!("Imported {} records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::table::CsvSource;
    use crate::traverse::fixtures::*;

    fn materializer() -> RowMaterializer<Item> {
        RowMaterializer::new(schema(), ImportConfig::new()).unwrap()
    }

    #[test]
    fn test_imports_rows_in_order() {
        let data = "id,name,qty,note\n1,apple,3,x\n\n2,pear,5,y\n";
        let mut source = CsvSource::from_reader(data.as_bytes());
        let records = import_all(&materializer(), &mut source).unwrap();
        assert_eq!(records, vec![item(1, "apple", 3), item(2, "pear", 5)]);
    }

    #[test]
    fn test_missing_columns_abort() {
        let mut source = CsvSource::from_reader("id,title\n1,a\n".as_bytes());
        let err = import_all(&materializer(), &mut source).unwrap_err();
        match err {
            MappingError::MissingColumns(columns) => assert_eq!(columns, vec!["name", "qty"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_first_bad_row_aborts_with_row_number() {
        let data = "id,name,qty\n1,a,1\n2,b,lots\n3,c,3\n";
        let mut source = CsvSource::from_reader(data.as_bytes());
        let err = import_all(&materializer(), &mut source).unwrap_err();
        assert!(matches!(err, MappingError::Row { row: 3, .. }));
        assert!(!err.is_structural());
        assert!(err.to_string().starts_with("row 3 error: field qty conversion failed"));
    }

    #[test]
    fn test_header_only_yields_nothing() {
        let mut source = CsvSource::from_reader("id,name,qty\n".as_bytes());
        assert!(import_all(&materializer(), &mut source).unwrap().is_empty());
    }
}
