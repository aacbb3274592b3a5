use bson::{Bson, Document, RawDocumentBuf};

use crate::columnar::{ColumnValue, ListItem};
use crate::error::IndexError;
use crate::postings::{EMPTY_STRING, FieldType, NULL_VALUE, PostingField, PostingValue};

// ── Postings ────────────────────────────────────────────────────

/// Decode one stored posting according to its field classification.
pub fn decode_posting(field: &PostingField, ty: FieldType) -> Result<Bson, IndexError> {
    let text = match &field.value {
        PostingValue::Binary(_) => return Err(IndexError::BinaryValue(field.name.clone())),
        PostingValue::Text(None) => return Ok(Bson::Null),
        PostingValue::Text(Some(text)) => text,
    };

    if text.is_empty() {
        return Ok(Bson::String(String::new()));
    }

    // Sentinels are only written untokenized, so a tokenized "NULL_VALUE"
    // is real user text.
    if !field.tokenized {
        match text.as_str() {
            NULL_VALUE => return Ok(Bson::Null),
            EMPTY_STRING => return Ok(Bson::String(String::new())),
            _ => {}
        }
    }

    if !ty.is_json {
        return Ok(Bson::String(text.clone()));
    }

    serde_json::from_str::<Bson>(text)
        .map_err(|e| IndexError::MalformedJson(format!("{}: {e}", field.name)))
}

// ── Columnar ────────────────────────────────────────────────────

/// Decode a tagged columnar value. `Ok(None)` means the reader had no
/// value to offer (invalid tag); malformed payloads are errors.
pub fn decode_column(field: &str, value: &ColumnValue) -> Result<Option<Bson>, IndexError> {
    let decoded = match value {
        ColumnValue::Empty => Bson::String(String::new()),
        ColumnValue::Null => Bson::Null,
        ColumnValue::Tuple { text, .. } => utf8(text)?,
        ColumnValue::TupleList(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    ListItem::Null => out.push(Bson::Null),
                    // the numeric part had to come from somewhere
                    ListItem::Empty => return Err(IndexError::EmptyTupleItem(field.to_string())),
                    ListItem::Value(bytes) => out.push(utf8(bytes)?),
                }
            }
            Bson::Array(out)
        }
        ColumnValue::SpatialPoint(hash) => utf8(hash)?,
        ColumnValue::SpatialPointList(hashes) => Bson::Array(
            hashes
                .iter()
                .map(|h| utf8(h))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ColumnValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(match item {
                    ListItem::Null => Bson::Null,
                    ListItem::Empty => Bson::String(String::new()),
                    ListItem::Value(bytes) => utf8(bytes)?,
                });
            }
            Bson::Array(out)
        }
        ColumnValue::RawList(blobs) => Bson::Array(
            blobs
                .iter()
                .map(|b| raw_document(b).map(Bson::Document))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ColumnValue::Raw(bytes) => Bson::Document(raw_document(bytes)?),
        ColumnValue::Scalar(bytes) => utf8(bytes)?,
        ColumnValue::Invalid => return Ok(None),
    };
    Ok(Some(decoded))
}

fn utf8(bytes: &[u8]) -> Result<Bson, IndexError> {
    std::str::from_utf8(bytes)
        .map(|s| Bson::String(s.to_string()))
        .map_err(|e| IndexError::InvalidUtf8(e.to_string()))
}

fn raw_document(bytes: &[u8]) -> Result<Document, IndexError> {
    let raw = RawDocumentBuf::from_bytes(bytes.to_vec())
        .map_err(|e| IndexError::MalformedRaw(e.to_string()))?;
    Document::try_from(raw).map_err(|e| IndexError::MalformedRaw(e.to_string()))
}
