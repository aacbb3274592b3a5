//! Token-postings backend.
//!
//! Each matched entry carries a flat list of stored postings. Several
//! postings may share a name (one per array element). Sibling postings with
//! reserved suffixes describe how the logical field was indexed.

/// Marks `<field>` as array-valued.
pub const IS_ARRAY_SUFFIX: &str = "_IsArray";
/// Marks `<field>` as holding JSON text.
pub const CONVERT_TO_JSON_SUFFIX: &str = "_ConvertToJson";
/// Numeric range companion postings.
pub const RANGE_DOUBLE_SUFFIX: &str = "_D_Range";
pub const RANGE_LONG_SUFFIX: &str = "_L_Range";

/// Sentinels written for untokenized null / empty values.
pub const NULL_VALUE: &str = "NULL_VALUE";
pub const EMPTY_STRING: &str = "EMPTY_STRING";

#[derive(Debug, Clone, PartialEq)]
pub enum PostingValue {
    Text(Option<String>),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostingField {
    pub name: String,
    pub value: PostingValue,
    pub tokenized: bool,
}

impl PostingField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PostingValue::Text(Some(value.into())),
            tokenized: true,
        }
    }

    pub fn untokenized(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tokenized: false,
            ..Self::text(name, value)
        }
    }

    pub fn binary(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value: PostingValue::Binary(bytes),
            tokenized: false,
        }
    }
}

/// Field reader capability of the postings backend.
pub trait PostingsReader {
    fn fields(&self) -> &[PostingField];
}

/// An in-memory postings entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingsDocument {
    pub fields: Vec<PostingField>,
}

impl PostingsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: PostingField) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds one posting per element plus the array marker.
    pub fn with_array<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.fields.push(PostingField::text(name, value));
        }
        self.with_marker(name, IS_ARRAY_SUFFIX)
    }

    pub fn with_json(self, name: &str, json: impl Into<String>) -> Self {
        self.with(PostingField::untokenized(name, json))
            .with_marker(name, CONVERT_TO_JSON_SUFFIX)
    }

    pub fn with_marker(mut self, name: &str, suffix: &str) -> Self {
        self.fields
            .push(PostingField::untokenized(format!("{name}{suffix}"), "true"));
        self
    }
}

impl PostingsReader for PostingsDocument {
    fn fields(&self) -> &[PostingField] {
        &self.fields
    }
}

/// How a logical postings field was indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldType {
    pub is_array: bool,
    pub is_json: bool,
    pub is_numeric: bool,
}

impl FieldType {
    /// Classify `field` from its sibling marker postings. Absence of a
    /// marker leaves the flag unset.
    pub fn classify(field: &str, fields: &[PostingField]) -> Self {
        let mut ty = FieldType::default();
        for f in fields {
            let Some(suffix) = f.name.strip_prefix(field) else {
                continue;
            };
            if suffix == IS_ARRAY_SUFFIX {
                ty.is_array = true;
                continue;
            }
            if suffix == CONVERT_TO_JSON_SUFFIX {
                // json wins, remaining markers are irrelevant
                ty.is_json = true;
                break;
            }
            if suffix == RANGE_DOUBLE_SUFFIX {
                ty.is_numeric = true;
            }
        }
        ty
    }
}

pub(crate) fn is_reserved_suffix(name: &str) -> bool {
    [
        IS_ARRAY_SUFFIX,
        CONVERT_TO_JSON_SUFFIX,
        RANGE_DOUBLE_SUFFIX,
        RANGE_LONG_SUFFIX,
    ]
    .iter()
    .any(|suffix| name.ends_with(suffix))
}
