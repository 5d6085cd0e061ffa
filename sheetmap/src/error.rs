//! Error types for schema construction, import and export

/// Error raised while building a [`Schema`](crate::Schema) or binding a config to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two fields were declared with the same name
    DuplicateField(String),
    /// Two ordinary fields bind the same column
    DuplicateColumn(String),
    /// More than one dynamic-capture field was declared
    MultipleDynamicFields { first: String, second: String },
    /// A `pattern:` modifier is not a valid regular expression
    InvalidPattern { field: String, message: String },
    /// The dynamic-capture marker was used on a field that is not a map
    DynamicNotMap(String),
    /// A map field was declared dynamic without the `*`/`extra` marker
    NotDynamic(String),
    /// The map's value type cannot hold captured cells
    UnsupportedCapture { field: String, kind: &'static str },
    /// A config entry names a field the schema does not declare
    UnknownField { field: String, context: &'static str },
    /// A validator targets the dynamic-capture field
    DynamicValidator(String),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::DuplicateField(name) => {
                write!(f, "field '{}' is declared more than once", name)
            }
            SchemaError::DuplicateColumn(column) => {
                write!(f, "column '{}' is bound to more than one field", column)
            }
            SchemaError::MultipleDynamicFields { first, second } => write!(
                f,
                "only one dynamic field is supported, found '{}' and '{}'",
                first, second
            ),
            SchemaError::InvalidPattern { field, message } => {
                write!(f, "invalid capture pattern on '{}': {}", field, message)
            }
            SchemaError::DynamicNotMap(field) => write!(
                f,
                "field '{}' is marked dynamic but is not a string-keyed map",
                field
            ),
            SchemaError::NotDynamic(field) => write!(
                f,
                "map field '{}' must be tagged '*' or 'extra'",
                field
            ),
            SchemaError::UnsupportedCapture { field, kind } => write!(
                f,
                "dynamic field '{}' cannot capture {} values",
                field, kind
            ),
            SchemaError::UnknownField { field, context } => {
                write!(f, "{} refers to unknown field '{}'", context, field)
            }
            SchemaError::DynamicValidator(field) => write!(
                f,
                "dynamic field '{}' cannot have a validator; check captured cells in a row hook",
                field
            ),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Error raised while importing or exporting rows
#[derive(Debug)]
pub enum MappingError {
    /// Table could not be read: missing sheet, unreadable row, header past the end
    Structural(String),
    /// Bound columns absent from the header row
    MissingColumns(Vec<String>),
    /// Cell text could not be parsed into the field's type
    Conversion {
        field: String,
        value: String,
        message: String,
    },
    /// Produced value does not fit the field's declared type
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A registered validator rejected the field value
    Validation { field: String, source: anyhow::Error },
    /// The post-row hook failed
    Hook(anyhow::Error),
    /// Remote file could not be fetched
    Download(String),
    /// Output table could not be written or serialized
    Sink(String),
    /// A row-level error, tagged with its 1-based row number
    Row { row: usize, source: Box<MappingError> },
}

impl MappingError {
    /// Tag a row-level error with its 1-based row number
    pub fn at_row(self, row: usize) -> Self {
        MappingError::Row {
            row,
            source: Box::new(self),
        }
    }

    /// The underlying error with any row tag removed
    pub fn root(&self) -> &MappingError {
        match self {
            MappingError::Row { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors that end a whole import regardless of traversal mode
    pub fn is_structural(&self) -> bool {
        matches!(
            self.root(),
            MappingError::Structural(_) | MappingError::MissingColumns(_) | MappingError::Download(_)
        )
    }
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingError::Structural(msg) => write!(f, "{}", msg),
            MappingError::MissingColumns(columns) => {
                write!(f, "missing columns: {}", columns.join(", "))
            }
            MappingError::Conversion {
                field,
                value,
                message,
            } => write!(
                f,
                "field {} conversion failed for '{}': {}",
                field, value, message
            ),
            MappingError::TypeMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "type mismatch on {}: cannot assign {} to {}",
                field, found, expected
            ),
            MappingError::Validation { field, source } => {
                write!(f, "validation failed on {}: {:#}", field, source)
            }
            MappingError::Hook(source) => write!(f, "row hook failed: {:#}", source),
            MappingError::Download(msg) => write!(f, "download failed: {}", msg),
            MappingError::Sink(msg) => write!(f, "write failed: {}", msg),
            MappingError::Row { row, source } => write!(f, "row {} error: {}", row, source),
        }
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MappingError::Validation { source, .. } | MappingError::Hook(source) => {
                Some(&**source)
            }
            MappingError::Row { source, .. } => Some(&**source),
            _ => None,
        }
    }
}
