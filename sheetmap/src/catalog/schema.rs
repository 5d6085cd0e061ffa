//! Static field-to-column binding table for a record type

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;

use crate::error::{MappingError, SchemaError};
use crate::value::{FieldKind, FieldType, Mismatch, Value};

use super::tag::Tag;

type Getter<R> = Box<dyn Fn(&R) -> Value + Send + Sync>;
type Setter<R> = Box<dyn Fn(&mut R, Value) -> Result<(), Mismatch> + Send + Sync>;
type Inserter<R> = Box<dyn Fn(&mut R, String, Value) -> Result<(), Mismatch> + Send + Sync>;

/// A record type with a statically declared schema
///
/// ```ignore
/// impl Record for Reading {
///     fn schema() -> Result<Schema<Self>, SchemaError> {
///         Schema::builder()
///             .field("account", "Account", |r: &Self| &r.account, |r| &mut r.account)
///             .dynamic("slots", r"extra,pattern:^\d{2}:\d{2}$", |r: &mut Self| &mut r.slots)
///             .build()
///     }
/// }
/// ```
pub trait Record: Default + Send + 'static {
    fn schema() -> Result<Schema<Self>, SchemaError>;
}

/// How captured cells are converted, fixed by the dynamic map's value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Text,
    Integer,
    Unsigned,
    Float,
    Bool,
    /// Map holds raw [`Value`]s; cells are captured as text
    Opaque,
}

impl CaptureKind {
    fn for_kind(kind: FieldKind) -> Option<Self> {
        match kind {
            FieldKind::String => Some(CaptureKind::Text),
            FieldKind::Int => Some(CaptureKind::Integer),
            FieldKind::UInt => Some(CaptureKind::Unsigned),
            FieldKind::Float => Some(CaptureKind::Float),
            FieldKind::Bool => Some(CaptureKind::Bool),
            FieldKind::Any => Some(CaptureKind::Opaque),
            FieldKind::DateTime => None,
        }
    }
}

/// A string-keyed map that can receive captured columns
pub trait DynamicMap: Default {
    type Item: FieldType;

    fn insert_value(&mut self, key: String, value: Value) -> Result<(), Mismatch>;
}

impl<V: FieldType> DynamicMap for HashMap<String, V> {
    type Item = V;

    fn insert_value(&mut self, key: String, value: Value) -> Result<(), Mismatch> {
        self.insert(key, V::from_value(value)?);
        Ok(())
    }
}

impl<V: FieldType> DynamicMap for BTreeMap<String, V> {
    type Item = V;

    fn insert_value(&mut self, key: String, value: Value) -> Result<(), Mismatch> {
        self.insert(key, V::from_value(value)?);
        Ok(())
    }
}

/// One declared record field
pub struct FieldDef<R> {
    name: String,
    tag: Tag,
    kind: FieldKind,
    optional: bool,
    getter: Getter<R>,
    setter: Setter<R>,
}

impl<R> FieldDef<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Column this field is bound to by its annotation
    pub fn column(&self) -> Option<&str> {
        self.tag.column()
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_text(&self) -> bool {
        matches!(self.tag, Tag::Column { text: true, .. })
    }

    pub fn width(&self) -> Option<f64> {
        match self.tag {
            Tag::Column { width, .. } => width,
            _ => None,
        }
    }

    /// Current field value
    pub fn get(&self, record: &R) -> Value {
        (self.getter)(record)
    }

    /// Assign a value, coercing it into the declared type
    ///
    /// `Null` clears optional fields and leaves other fields untouched.
    pub fn set(&self, record: &mut R, value: Value) -> Result<(), MappingError> {
        if value.is_null() && !self.optional {
            return Ok(());
        }
        (self.setter)(record, value).map_err(|m| MappingError::TypeMismatch {
            field: self.name.clone(),
            expected: m.expected,
            found: m.found,
        })
    }
}

impl<R> std::fmt::Debug for FieldDef<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .finish()
    }
}

/// The field that absorbs unclaimed columns
pub struct DynamicField<R> {
    name: String,
    filter: Option<Regex>,
    capture: CaptureKind,
    inserter: Inserter<R>,
}

impl<R> DynamicField<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> Option<&Regex> {
        self.filter.as_ref()
    }

    pub fn capture(&self) -> CaptureKind {
        self.capture
    }

    /// Whether a column passes the capture filter
    pub fn accepts(&self, column: &str) -> bool {
        self.filter.as_ref().is_none_or(|re| re.is_match(column))
    }

    pub(crate) fn insert(&self, record: &mut R, column: String, value: Value) -> bool {
        (self.inserter)(record, column, value).is_ok()
    }
}

/// Binding catalog for a record type, built once and shared read-only
pub struct Schema<R> {
    fields: Vec<FieldDef<R>>,
    dynamic: Option<DynamicField<R>>,
}

impl<R: 'static> Schema<R> {
    pub fn builder() -> SchemaBuilder<R> {
        SchemaBuilder {
            fields: Vec::new(),
            dynamic: None,
            error: None,
        }
    }
}

impl<R> Schema<R> {
    /// All declared fields in declaration order, bound or not
    pub fn fields(&self) -> &[FieldDef<R>] {
        &self.fields
    }

    /// Look up a field by name, with its declaration position
    pub fn field(&self, name: &str) -> Option<(usize, &FieldDef<R>)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn dynamic(&self) -> Option<&DynamicField<R>> {
        self.dynamic.as_ref()
    }

    /// Column -> field position for every annotated field
    pub fn bindings(&self) -> impl Iterator<Item = (&str, usize)> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.column().map(|c| (c, i)))
    }

    /// Export header order derived from declaration order
    pub fn inferred_headers(&self) -> Vec<String> {
        self.bindings().map(|(c, _)| c.to_string()).collect()
    }

    /// Whether a field name is declared (ordinary or dynamic)
    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some() || self.dynamic.as_ref().is_some_and(|d| d.name == name)
    }
}

impl<R> std::fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("dynamic", &self.dynamic.as_ref().map(|d| &d.name))
            .finish()
    }
}

/// Declares the fields of a record type
///
/// Errors are collected and reported by [`SchemaBuilder::build`].
pub struct SchemaBuilder<R> {
    fields: Vec<FieldDef<R>>,
    dynamic: Option<DynamicField<R>>,
    error: Option<SchemaError>,
}

impl<R: 'static> SchemaBuilder<R> {
    /// Declare a field with its annotation and accessors
    pub fn field<T: FieldType + 'static>(
        mut self,
        name: &str,
        annotation: &str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        let tag = Tag::parse(annotation);
        if matches!(tag, Tag::Dynamic { .. }) {
            self.fail(SchemaError::DynamicNotMap(name.to_string()));
            return self;
        }
        if self.is_declared(name) {
            self.fail(SchemaError::DuplicateField(name.to_string()));
            return self;
        }

        self.fields.push(FieldDef {
            name: name.to_string(),
            tag,
            kind: T::KIND,
            optional: T::OPTIONAL,
            getter: Box::new(move |record| get(record).to_value()),
            setter: Box::new(move |record, value| {
                *get_mut(record) = T::from_value(value)?;
                Ok(())
            }),
        });
        self
    }

    /// Declare the dynamic-capture field
    pub fn dynamic<M: DynamicMap + 'static>(
        mut self,
        name: &str,
        annotation: &str,
        get_mut: fn(&mut R) -> &mut M,
    ) -> Self {
        let pattern = match Tag::parse(annotation) {
            Tag::Dynamic { pattern } => pattern,
            _ => {
                self.fail(SchemaError::NotDynamic(name.to_string()));
                return self;
            }
        };
        if let Some(existing) = &self.dynamic {
            let err = SchemaError::MultipleDynamicFields {
                first: existing.name.clone(),
                second: name.to_string(),
            };
            self.fail(err);
            return self;
        }
        if self.is_declared(name) {
            self.fail(SchemaError::DuplicateField(name.to_string()));
            return self;
        }

        let Some(capture) = CaptureKind::for_kind(<M::Item as FieldType>::KIND) else {
            self.fail(SchemaError::UnsupportedCapture {
                field: name.to_string(),
                kind: <M::Item as FieldType>::KIND.name(),
            });
            return self;
        };

        let filter = match pattern.as_deref().map(Regex::new).transpose() {
            Ok(filter) => filter,
            Err(e) => {
                self.fail(SchemaError::InvalidPattern {
                    field: name.to_string(),
                    message: e.to_string(),
                });
                return self;
            }
        };

        self.dynamic = Some(DynamicField {
            name: name.to_string(),
            filter,
            capture,
            inserter: Box::new(move |record, key, value| get_mut(record).insert_value(key, value)),
        });
        self
    }

    pub fn build(self) -> Result<Schema<R>, SchemaError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut seen = HashSet::new();
        for column in self.fields.iter().filter_map(|f| f.column()) {
            if !seen.insert(column) {
                return Err(SchemaError::DuplicateColumn(column.to_string()));
            }
        }

        Ok(Schema {
            fields: self.fields,
            dynamic: self.dynamic,
        })
    }

    fn is_declared(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
            || self.dynamic.as_ref().is_some_and(|d| d.name == name)
    }

    fn fail(&mut self, err: SchemaError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Reading {
        account: String,
        date: String,
        internal: u32,
        slots: HashMap<String, String>,
        other: BTreeMap<String, f64>,
    }

    fn base() -> SchemaBuilder<Reading> {
        Schema::builder()
            .field("account", "Account,text", |r: &Reading| &r.account, |r| &mut r.account)
            .field("date", "Date,width:18", |r: &Reading| &r.date, |r| &mut r.date)
            .field("internal", "-", |r: &Reading| &r.internal, |r| &mut r.internal)
    }

    #[test]
    fn test_bindings_follow_declaration_order() {
        let schema = base()
            .dynamic("slots", r"extra,pattern:^\d{2}:\d{2}$", |r: &mut Reading| &mut r.slots)
            .build()
            .unwrap();

        assert_eq!(schema.inferred_headers(), vec!["Account", "Date"]);
        assert_eq!(schema.bindings().collect::<Vec<_>>(), vec![("Account", 0), ("Date", 1)]);

        let (pos, internal) = schema.field("internal").unwrap();
        assert_eq!(pos, 2);
        assert_eq!(internal.column(), None);

        let dynamic = schema.dynamic().unwrap();
        assert_eq!(dynamic.capture(), CaptureKind::Text);
        assert!(dynamic.accepts("00:30"));
        assert!(!dynamic.accepts("note"));
        assert!(schema.declares("slots"));
    }

    #[test]
    fn test_export_hints() {
        let schema = base().build().unwrap();
        let (_, account) = schema.field("account").unwrap();
        let (_, date) = schema.field("date").unwrap();
        assert!(account.is_text());
        assert_eq!(date.width(), Some(18.0));
        assert_eq!(account.kind(), FieldKind::String);
    }

    #[test]
    fn test_inference_is_stable() {
        let first = base().build().unwrap().inferred_headers();
        let second = base().build().unwrap().inferred_headers();
        assert_eq!(first, second);
    }

    #[test]
    fn test_second_dynamic_field_rejected() {
        let err = base()
            .dynamic("slots", "extra", |r: &mut Reading| &mut r.slots)
            .dynamic("other", "*", |r: &mut Reading| &mut r.other)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MultipleDynamicFields {
                first: "slots".into(),
                second: "other".into()
            }
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = base()
            .field("internal2", "Account", |r: &Reading| &r.internal, |r| &mut r.internal)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("Account".into()));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = base()
            .dynamic("slots", "extra,pattern:([", |r: &mut Reading| &mut r.slots)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { .. }));
    }

    #[test]
    fn test_dynamic_tag_on_scalar_rejected() {
        let err = base()
            .field("account2", "extra", |r: &Reading| &r.account, |r| &mut r.account)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DynamicNotMap("account2".into()));
    }

    #[test]
    fn test_set_coerces_and_reports_mismatch() {
        let schema = base().build().unwrap();
        let (_, internal) = schema.field("internal").unwrap();
        let mut record = Reading::default();

        internal.set(&mut record, Value::Int(7)).unwrap();
        assert_eq!(record.internal, 7);

        // Null leaves a non-optional field as it was
        internal.set(&mut record, Value::Null).unwrap();
        assert_eq!(record.internal, 7);

        let err = internal.set(&mut record, Value::from("seven")).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { ref field, .. } if field == "internal"));
    }
}
