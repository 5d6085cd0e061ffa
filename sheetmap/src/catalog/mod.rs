//! Field catalog: annotations and the per-type schema

mod schema;
mod tag;

pub use schema::{CaptureKind, DynamicField, DynamicMap, FieldDef, Record, Schema, SchemaBuilder};
pub use tag::Tag;
