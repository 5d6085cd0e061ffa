//! Conversion between cell text and field values

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::catalog::CaptureKind;
use crate::config::{ExportConverter, ImportConverter};
use crate::error::MappingError;
use crate::value::{DATETIME_FORMAT, FieldKind, Value};

/// Localized affirmative accepted as `true` alongside "true" and "1"
const AFFIRMATIVE: &str = "是";

/// Date-only layouts tried after the full datetime layout, in order
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Decodes cell text for the fields of one import run
pub struct Decoder<'a> {
    converters: &'a HashMap<String, ImportConverter>,
    defaults: &'a BTreeMap<String, Value>,
}

impl<'a> Decoder<'a> {
    pub fn new(
        converters: &'a HashMap<String, ImportConverter>,
        defaults: &'a BTreeMap<String, Value>,
    ) -> Self {
        Decoder {
            converters,
            defaults,
        }
    }

    /// Default value registered for a field
    pub fn default_for(&self, field: &str) -> Option<&Value> {
        self.defaults.get(field)
    }

    /// Decode one cell for `field`
    ///
    /// A registered converter takes precedence over everything else. Empty text
    /// falls back to the field's default, then to the built-in parse rules.
    pub fn decode(
        &self,
        raw: &str,
        kind: FieldKind,
        optional: bool,
        field: &str,
    ) -> Result<Value, MappingError> {
        if let Some(converter) = self.converters.get(field) {
            return converter(raw).map_err(|e| MappingError::Conversion {
                field: field.to_string(),
                value: raw.to_string(),
                message: format!("{:#}", e),
            });
        }

        if raw.is_empty() {
            if let Some(default) = self.defaults.get(field) {
                return Ok(default.clone());
            }
        }

        if optional && raw.is_empty() {
            return Ok(Value::Null);
        }

        parse_kind(raw, kind).map_err(|message| MappingError::Conversion {
            field: field.to_string(),
            value: raw.to_string(),
            message,
        })
    }
}

/// Built-in parse rule for a field kind
pub fn parse_kind(raw: &str, kind: FieldKind) -> Result<Value, String> {
    match kind {
        FieldKind::String | FieldKind::Any => Ok(Value::String(raw.to_string())),
        FieldKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("invalid integer: {}", raw)),
        FieldKind::UInt => raw
            .parse::<u64>()
            .map(Value::UInt)
            .map_err(|_| format!("invalid uint: {}", raw)),
        FieldKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid float: {}", raw)),
        FieldKind::Bool => Ok(Value::Bool(parse_bool(raw))),
        FieldKind::DateTime => parse_datetime(raw)
            .map(Value::DateTime)
            .ok_or_else(|| format!("invalid time: {}", raw)),
    }
}

/// Convert a captured dynamic cell; malformed cells yield `None` and are skipped
pub fn decode_capture(raw: &str, capture: CaptureKind) -> Option<Value> {
    match capture {
        CaptureKind::Text | CaptureKind::Opaque => Some(Value::String(raw.to_string())),
        CaptureKind::Integer => raw.parse().ok().map(Value::Int),
        CaptureKind::Unsigned => raw.parse().ok().map(Value::UInt),
        CaptureKind::Float => raw.parse().ok().map(Value::Float),
        CaptureKind::Bool => Some(Value::Bool(parse_bool(raw))),
    }
}

pub fn parse_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true") || raw == "1" || raw == AFFIRMATIVE
}

/// Parse `YYYY-MM-DD HH:MM:SS`, then `YYYY-MM-DD`, then `YYYY/MM/DD`
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT) {
        return Some(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Produce the cell value for a field value on export
pub fn encode(value: Value, converter: Option<&ExportConverter>) -> Value {
    if let Some(converter) = converter {
        return converter(&value);
    }
    match value {
        Value::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        other => other,
    }
}
