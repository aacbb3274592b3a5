//! Columnar backend.
//!
//! Entries expose a typed reader per field, addressed by the index's
//! field id or, for dynamic fields, by name.

use std::collections::BTreeMap;

/// One element of a list-typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Null,
    Empty,
    Value(Vec<u8>),
}

/// Tagged value produced by a columnar field reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Empty,
    Null,
    /// Numeric term stored alongside its textual form.
    Tuple { long: i64, double: f64, text: Vec<u8> },
    TupleList(Vec<ListItem>),
    /// Geohash of a spatial point.
    SpatialPoint(Vec<u8>),
    SpatialPointList(Vec<Vec<u8>>),
    List(Vec<ListItem>),
    /// Serialized BSON documents.
    RawList(Vec<Vec<u8>>),
    Raw(Vec<u8>),
    Scalar(Vec<u8>),
    /// No readable value for the field.
    Invalid,
}

/// Field reader capability of the columnar backend.
pub trait ColumnarReader {
    fn read_by_id(&self, field_id: u32) -> ColumnValue;
    fn read_by_name(&self, name: &str) -> ColumnValue;
}

/// Known (statically declared) fields of a columnar index: name -> id.
pub type FieldBindings = BTreeMap<String, u32>;

/// An in-memory columnar entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnarEntry {
    pub by_id: BTreeMap<u32, ColumnValue>,
    pub dynamic: BTreeMap<String, ColumnValue>,
}

impl ColumnarEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field_id: u32, value: ColumnValue) -> Self {
        self.by_id.insert(field_id, value);
        self
    }

    pub fn with_dynamic(mut self, name: impl Into<String>, value: ColumnValue) -> Self {
        self.dynamic.insert(name.into(), value);
        self
    }
}

impl ColumnarReader for ColumnarEntry {
    fn read_by_id(&self, field_id: u32) -> ColumnValue {
        self.by_id
            .get(&field_id)
            .cloned()
            .unwrap_or(ColumnValue::Invalid)
    }

    fn read_by_name(&self, name: &str) -> ColumnValue {
        self.dynamic
            .get(name)
            .cloned()
            .unwrap_or(ColumnValue::Invalid)
    }
}
