//! Cell value representation and the typed record field model

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Format used when a temporal value is rendered into a cell
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value moving between a record field and a table cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Absent value (empty cell, `None` field)
    #[default]
    Null,
    /// Text
    String(String),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Date and time without timezone
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short type name used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Int(_) => "integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "datetime",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

/// Declared shape of a record field, used to pick the parse rule on import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    UInt,
    Float,
    Bool,
    DateTime,
    /// Field holds a raw [`Value`]; cells are stored as text
    Any,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int => "integer",
            FieldKind::UInt => "unsigned integer",
            FieldKind::Float => "float",
            FieldKind::Bool => "bool",
            FieldKind::DateTime => "datetime",
            FieldKind::Any => "any",
        }
    }
}

/// A value could not be coerced into a field's declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl Mismatch {
    fn new(expected: FieldKind, found: &Value) -> Self {
        Mismatch {
            expected: expected.name(),
            found: found.type_name(),
        }
    }
}

/// A Rust type that can be bound to a table column
///
/// Implementations convert the field to a [`Value`] for export and back from a
/// decoded or user-produced [`Value`] on import, coercing between numeric
/// representations when the target can hold the value.
pub trait FieldType: Sized {
    const KIND: FieldKind;
    const OPTIONAL: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, Mismatch>;
}

macro_rules! signed_field {
    ($($ty:ty),*) => {$(
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::Int;

            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn from_value(value: Value) -> Result<Self, Mismatch> {
                let converted = match &value {
                    Value::Int(i) => <$ty>::try_from(*i).ok(),
                    Value::UInt(u) => <$ty>::try_from(*u).ok(),
                    Value::Float(f) => whole_float(*f).and_then(|i| <$ty>::try_from(i).ok()),
                    _ => None,
                };
                converted.ok_or_else(|| Mismatch::new(Self::KIND, &value))
            }
        }
    )*};
}

macro_rules! unsigned_field {
    ($($ty:ty),*) => {$(
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::UInt;

            fn to_value(&self) -> Value {
                Value::UInt(*self as u64)
            }

            fn from_value(value: Value) -> Result<Self, Mismatch> {
                let converted = match &value {
                    Value::UInt(u) => <$ty>::try_from(*u).ok(),
                    Value::Int(i) => <$ty>::try_from(*i).ok(),
                    Value::Float(f) => whole_float(*f).and_then(|i| <$ty>::try_from(i).ok()),
                    _ => None,
                };
                converted.ok_or_else(|| Mismatch::new(Self::KIND, &value))
            }
        }
    )*};
}

signed_field!(i8, i16, i32, i64, isize);
unsigned_field!(u8, u16, u32, u64, usize);

fn whole_float(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl FieldType for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        value
            .as_float()
            .ok_or_else(|| Mismatch::new(Self::KIND, &value))
    }
}

impl FieldType for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        value
            .as_float()
            .map(|f| f as f32)
            .ok_or_else(|| Mismatch::new(Self::KIND, &value))
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Mismatch::new(Self::KIND, &other)),
        }
    }
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        value
            .as_bool()
            .ok_or_else(|| Mismatch::new(Self::KIND, &value))
    }
}

impl FieldType for NaiveDateTime {
    const KIND: FieldKind = FieldKind::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(Mismatch::new(Self::KIND, &other)),
        }
    }
}

impl FieldType for NaiveDate {
    const KIND: FieldKind = FieldKind::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(self.and_time(NaiveTime::MIN))
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        match value {
            Value::DateTime(dt) => Ok(dt.date()),
            other => Err(Mismatch::new(Self::KIND, &other)),
        }
    }
}

impl FieldType for Value {
    const KIND: FieldKind = FieldKind::Any;

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        Ok(value)
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: FieldKind = T::KIND;
    const OPTIONAL: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Mismatch> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrowing_integer_coercion() {
        assert_eq!(i32::from_value(Value::Int(42)), Ok(42));
        assert_eq!(u8::from_value(Value::Int(200)), Ok(200));
        assert_eq!(i64::from_value(Value::Float(3.0)), Ok(3));

        let err = i8::from_value(Value::Int(1000)).unwrap_err();
        assert_eq!(err.expected, "integer");
        assert_eq!(err.found, "integer");

        assert!(u32::from_value(Value::Int(-1)).is_err());
        assert!(i32::from_value(Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_float_past_i64_range_mismatches() {
        // 2^63 is exactly representable as f64 but not as i64
        assert!(i64::from_value(Value::Float(9_223_372_036_854_775_808.0)).is_err());
        assert_eq!(
            i64::from_value(Value::Float(-9_223_372_036_854_775_808.0)),
            Ok(i64::MIN)
        );
    }

    #[test]
    fn test_unrelated_types_mismatch() {
        let err = String::from_value(Value::Int(5)).unwrap_err();
        assert_eq!(err, Mismatch { expected: "string", found: "integer" });
        assert!(bool::from_value(Value::String("true".into())).is_err());
    }

    #[test]
    fn test_float_accepts_integers() {
        assert_eq!(f64::from_value(Value::Int(7)), Ok(7.0));
        assert_eq!(f32::from_value(Value::Float(0.5)), Ok(0.5));
    }

    #[test]
    fn test_option_wraps_inner() {
        assert_eq!(Option::<i32>::from_value(Value::Null), Ok(None));
        assert_eq!(Option::<i32>::from_value(Value::Int(4)), Ok(Some(4)));
        assert_eq!(Some(2.5f64).to_value(), Value::Float(2.5));
        assert_eq!(Option::<String>::None.to_value(), Value::Null);
        assert!(<Option<u8> as FieldType>::OPTIONAL);
    }

    #[test]
    fn test_date_roundtrips_through_datetime() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(NaiveDate::from_value(date.to_value()), Ok(date));
    }

    #[test]
    fn test_display() {
        let dt = NaiveDate::from_ymd_opt(2023, 10, 1)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2023-10-01 08:05:00");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(88.5).to_string(), "88.5");
    }
}
