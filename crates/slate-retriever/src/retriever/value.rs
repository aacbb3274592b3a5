use std::sync::Arc;

use bson::{Bson, Document};
use slate_query::{FieldToFetch, QueryField, QueryFieldKind, ValueTokenType};
use slate_vm::{CancellationToken, TimeSeriesResult};
use tracing::trace;

use super::Retriever;
use super::load::id_string;
use crate::document::RetrievedDocument;
use crate::error::RetrieverError;
use crate::input::RetrieverInput;
use crate::traits::DocumentLoader;

/// A field's value before it is placed in the result.
#[derive(Debug, Clone)]
pub(crate) enum FieldValue {
    Value(Bson),
    Document(Arc<RetrievedDocument>),
    List(Vec<FieldValue>),
    Stream(TimeSeriesResult),
}

impl FieldValue {
    /// Form stored inside a result body.
    pub(crate) fn into_embedded(self) -> Bson {
        match self {
            FieldValue::Value(v) => v,
            FieldValue::Document(doc) => Bson::Document(doc.embedded_data()),
            FieldValue::List(items) => {
                Bson::Array(items.into_iter().map(FieldValue::into_embedded).collect())
            }
            FieldValue::Stream(ts) => Bson::Array(ts.rows.into_iter().map(Bson::Document).collect()),
        }
    }

    pub(crate) fn to_bson(&self) -> Bson {
        self.clone().into_embedded()
    }
}

type Keyed = Option<(String, FieldValue)>;

impl<L: DocumentLoader> Retriever<'_, L> {
    /// Value of one field for `doc`, with the key it lands under. `None`
    /// when the field resolves to nothing.
    pub(super) fn try_get_value(
        &mut self,
        field: &FieldToFetch,
        doc: &Arc<RetrievedDocument>,
        input: &RetrieverInput<'_>,
        token: &CancellationToken,
    ) -> Result<Keyed, RetrieverError> {
        let key = field.key().to_string();
        let Some(q) = &field.query_field else {
            return Ok(self.field_from_document(doc, field).map(|v| (key, FieldValue::Value(v))));
        };
        match &q.kind {
            QueryFieldKind::Function { name } => {
                let value = self.function_value(field, name, doc, input, token)?;
                Ok(Some((key, value)))
            }
            QueryFieldKind::Counter { name, raw } => {
                self.counter_value(field, q, name, *raw, doc).map(Some)
            }
            QueryFieldKind::Literal { value, token: kind } => {
                if *kind != ValueTokenType::Parameter {
                    return Ok(Some((key, FieldValue::Value(value.clone()))));
                }
                let params = self
                    .query
                    .parameters
                    .as_ref()
                    .ok_or(RetrieverError::MissingParameters)?;
                let resolved = value
                    .as_str()
                    .and_then(|name| params.get(name))
                    .cloned()
                    .unwrap_or(Bson::Null);
                Ok(Some((key, FieldValue::Value(resolved))))
            }
            QueryFieldKind::Field if !q.has_source_alias => {
                Ok(self.field_from_document(doc, field).map(|v| (key, FieldValue::Value(v))))
            }
            QueryFieldKind::Field => Ok(self
                .load_field(field, q, doc, input, token)?
                .map(|v| (key, v))),
        }
    }

    /// Plain read of `field` from the document body.
    pub(super) fn field_from_document(
        &self,
        doc: &RetrievedDocument,
        field: &FieldToFetch,
    ) -> Option<Bson> {
        if field.is_document_id {
            return Some(doc.resolve_id().map(Bson::String).unwrap_or(Bson::Null));
        }
        if field.is_composite() {
            let mut component = Document::new();
            for name in &field.components {
                if let Some(value) = self.traverser.read(&doc.data, name) {
                    component.insert(name.clone(), value);
                }
            }
            return Some(Bson::Document(component));
        }
        self.traverser.read(&doc.data, &field.name).or_else(|| {
            field
                .projected_name
                .as_deref()
                .and_then(|name| self.traverser.read(&doc.data, name))
        })
    }

    fn counter_value(
        &self,
        field: &FieldToFetch,
        q: &QueryField,
        name: &str,
        raw: bool,
        doc: &RetrievedDocument,
    ) -> Result<(String, FieldValue), RetrieverError> {
        let mut key = field.key().to_string();
        let counter = if q.is_parameter {
            let params = self
                .query
                .parameters
                .as_ref()
                .ok_or(RetrieverError::MissingParameters)?;
            let value = params
                .get(name)
                .ok_or_else(|| RetrieverError::MissingParameter(name.to_string()))?;
            let resolved = id_string(value);
            key = q.alias.clone().unwrap_or_else(|| resolved.clone());
            resolved
        } else {
            name.to_string()
        };

        let mut owner = doc.id.clone();
        if let Some(alias) = &q.source_alias {
            if let Some(value) = self.traverser.read(&doc.data, alias) {
                owner = Some(id_string(&value));
            }
        }

        let (Some(counters), Some(owner)) = (self.counters.as_ref(), owner) else {
            trace!(counter = %counter, "no counter source, projecting null");
            return Ok((key, FieldValue::Value(Bson::Null)));
        };
        let value = if raw {
            counters.get_raw(&owner, &counter)?.map(Bson::Document)
        } else {
            counters.get_value(&owner, &counter)?.map(Bson::Int64)
        };
        Ok((key, FieldValue::Value(value.unwrap_or(Bson::Null))))
    }
}
