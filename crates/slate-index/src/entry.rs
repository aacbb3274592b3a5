use std::collections::HashSet;
use std::fmt;

use bson::Bson;
use slate_query::IndexFieldDef;

use crate::columnar::{ColumnarReader, FieldBindings};
use crate::decode::{decode_column, decode_posting};
use crate::error::IndexError;
use crate::postings::{FieldType, PostingsReader, is_reserved_suffix};

// Reserved index field names. Never projected as user fields.
pub const DOCUMENT_ID_FIELD: &str = "id()";
pub const SOURCE_DOCUMENT_ID_FIELD: &str = "sourcedocid()";
pub const REDUCE_KEY_HASH_FIELD: &str = "hash(key())";
pub const REDUCE_KEY_VALUE_FIELD: &str = "reduce-key-value";
pub const VALUE_FIELD: &str = "json()";

const RESERVED: [&str; 5] = [
    DOCUMENT_ID_FIELD,
    SOURCE_DOCUMENT_ID_FIELD,
    REDUCE_KEY_HASH_FIELD,
    REDUCE_KEY_VALUE_FIELD,
    VALUE_FIELD,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postings,
    Columnar,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Postings => f.write_str("postings"),
            Backend::Columnar => f.write_str("columnar"),
        }
    }
}

/// A matched entry of whichever backend served the query.
///
/// This is the only place that knows which backend is active; everything
/// above it reads fields through these methods.
#[derive(Clone, Copy)]
pub enum IndexEntry<'a> {
    Postings(&'a dyn PostingsReader),
    Columnar {
        reader: &'a dyn ColumnarReader,
        known_fields: &'a FieldBindings,
    },
}

impl fmt::Debug for IndexEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IndexEntry").field(&self.backend()).finish()
    }
}

impl<'a> IndexEntry<'a> {
    pub fn backend(&self) -> Backend {
        match self {
            IndexEntry::Postings(_) => Backend::Postings,
            IndexEntry::Columnar { .. } => Backend::Columnar,
        }
    }

    /// Read and decode a logical field. `Ok(None)` when the entry holds no
    /// value for it.
    ///
    /// Postings fields marked as arrays always decode to an array, even
    /// with a single posting. Otherwise the last posting wins.
    pub fn read_field(&self, name: &str) -> Result<Option<Bson>, IndexError> {
        match *self {
            IndexEntry::Postings(reader) => {
                let fields = reader.fields();
                let mut classified: Option<FieldType> = None;
                let mut array: Option<Vec<Bson>> = None;
                let mut single = None;
                for field in fields.iter().filter(|f| f.name == name) {
                    let ty = *classified
                        .get_or_insert_with(|| FieldType::classify(&field.name, fields));
                    let value = decode_posting(field, ty)?;
                    if ty.is_array {
                        array.get_or_insert_with(Vec::new).push(value);
                    } else {
                        single = Some(value);
                    }
                }
                Ok(array.map(Bson::Array).or(single))
            }
            IndexEntry::Columnar {
                reader,
                known_fields,
            } => {
                let value = match known_fields.get(name) {
                    Some(id) => reader.read_by_id(*id),
                    None => reader.read_by_name(name),
                };
                decode_column(name, &value)
            }
        }
    }

    /// Read a field through its index definition (id when present).
    pub fn read_defined(&self, def: &IndexFieldDef) -> Result<Option<Bson>, IndexError> {
        match (*self, def.id) {
            (IndexEntry::Columnar { reader, .. }, Some(id)) => {
                decode_column(&def.name, &reader.read_by_id(id))
            }
            (IndexEntry::Columnar { reader, .. }, None) => {
                decode_column(&def.name, &reader.read_by_name(&def.name))
            }
            (IndexEntry::Postings(_), _) => self.read_field(&def.name),
        }
    }

    /// Every decoded posting named `name`, one value per posting. Columnar
    /// entries flatten an array value into its elements.
    pub fn read_values(&self, name: &str) -> Result<Vec<Bson>, IndexError> {
        match *self {
            IndexEntry::Postings(reader) => {
                let fields = reader.fields();
                fields
                    .iter()
                    .filter(|f| f.name == name)
                    .map(|f| decode_posting(f, FieldType::classify(&f.name, fields)))
                    .collect()
            }
            IndexEntry::Columnar { .. } => Ok(match self.read_field(name)? {
                Some(Bson::Array(items)) => items,
                Some(value) => vec![value],
                None => Vec::new(),
            }),
        }
    }

    /// The document key this entry was produced for.
    pub fn document_id(&self) -> Result<Option<String>, IndexError> {
        Ok(match self.read_field(DOCUMENT_ID_FIELD)? {
            Some(Bson::String(id)) => Some(id),
            Some(Bson::Array(mut ids)) => match ids.pop() {
                Some(Bson::String(id)) => Some(id),
                _ => None,
            },
            _ => None,
        })
    }

    /// Names of the user fields stored in this entry, deduplicated
    /// case-insensitively, reserved and marker fields excluded.
    pub fn stored_field_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let names: Box<dyn Iterator<Item = &str> + '_> = match self {
            IndexEntry::Postings(reader) => {
                Box::new(reader.fields().iter().map(|f| f.name.as_str()))
            }
            IndexEntry::Columnar { known_fields, .. } => {
                Box::new(known_fields.keys().map(String::as_str))
            }
        };
        names
            .filter(|name| !RESERVED.contains(name) && !is_reserved_suffix(name))
            .filter(|name| seen.insert(name.to_lowercase()))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::{ColumnValue, ColumnarEntry, ListItem};
    use crate::postings::{PostingField, PostingsDocument, RANGE_DOUBLE_SUFFIX};

    fn postings() -> PostingsDocument {
        PostingsDocument::new()
            .with(PostingField::untokenized(DOCUMENT_ID_FIELD, "users/1"))
            .with(PostingField::text("Name", "Arek"))
            .with_array("Tags", ["red"])
            .with(PostingField::text("Age", "30"))
            .with_marker("Age", RANGE_DOUBLE_SUFFIX)
            .with(PostingField::text("name", "dup"))
    }

    #[test]
    fn postings_read_field() {
        let doc = postings();
        let entry = IndexEntry::Postings(&doc);
        assert_eq!(entry.read_field("Name").unwrap(), Some(Bson::String("Arek".into())));
        assert_eq!(
            entry.read_field("Tags").unwrap(),
            Some(Bson::Array(vec![Bson::String("red".into())]))
        );
        assert_eq!(entry.read_field("Missing").unwrap(), None);
        assert_eq!(entry.document_id().unwrap(), Some("users/1".into()));
    }

    #[test]
    fn postings_read_values_keeps_every_posting() {
        let doc = PostingsDocument::new()
            .with(PostingField::text("Friend", "users/2"))
            .with(PostingField::text("Friend", "users/3"));
        let entry = IndexEntry::Postings(&doc);
        assert_eq!(
            entry.read_values("Friend").unwrap(),
            vec![Bson::String("users/2".into()), Bson::String("users/3".into())]
        );
        // not marked as array: last one wins for a plain read
        assert_eq!(entry.read_field("Friend").unwrap(), Some(Bson::String("users/3".into())));
    }

    #[test]
    fn postings_stored_names() {
        let doc = postings();
        let names = IndexEntry::Postings(&doc).stored_field_names();
        assert_eq!(names, vec!["Name", "Tags", "Age"]);
    }

    #[test]
    fn columnar_known_and_dynamic() {
        let entry = ColumnarEntry::new()
            .with_field(1, ColumnValue::Scalar(b"Arek".to_vec()))
            .with_field(
                2,
                ColumnValue::List(vec![ListItem::Value(b"a".to_vec()), ListItem::Null]),
            )
            .with_dynamic("Extra", ColumnValue::Scalar(b"dyn".to_vec()));
        let known: FieldBindings = [("Name".to_string(), 1), ("Tags".to_string(), 2)].into();
        let entry = IndexEntry::Columnar {
            reader: &entry,
            known_fields: &known,
        };

        assert_eq!(entry.backend(), Backend::Columnar);
        assert_eq!(entry.read_field("Name").unwrap(), Some(Bson::String("Arek".into())));
        assert_eq!(entry.read_field("Extra").unwrap(), Some(Bson::String("dyn".into())));
        assert_eq!(entry.read_field("Nope").unwrap(), None);
        assert_eq!(
            entry.read_values("Tags").unwrap(),
            vec![Bson::String("a".into()), Bson::Null]
        );
        assert_eq!(
            entry
                .read_defined(&IndexFieldDef { name: "Tags".into(), id: Some(2) })
                .unwrap()
                .map(|v| matches!(v, Bson::Array(_))),
            Some(true)
        );
        assert_eq!(entry.stored_field_names(), vec!["Name", "Tags"]);
    }
}
