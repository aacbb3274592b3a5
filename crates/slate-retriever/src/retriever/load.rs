use std::collections::HashSet;
use std::sync::Arc;

use bson::Bson;
use slate_index::Backend;
use slate_query::{DocumentFields, FieldToFetch, QueryField};
use slate_vm::CancellationToken;
use tracing::{debug, trace};

use super::Retriever;
use super::value::FieldValue;
use crate::document::RetrievedDocument;
use crate::error::RetrieverError;
use crate::input::RetrieverInput;
use crate::timings::TimingScope;
use crate::traits::DocumentLoader;

/// Document id spelled by a stored value.
pub(super) fn id_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<L: DocumentLoader> Retriever<'_, L> {
    /// Resolve a `load` clause: find the referenced ids, load each document
    /// and read `field` from it.
    pub(super) fn load_field(
        &mut self,
        field: &FieldToFetch,
        q: &QueryField,
        doc: &Arc<RetrievedDocument>,
        input: &RetrieverInput<'_>,
        token: &CancellationToken,
    ) -> Result<Option<FieldValue>, RetrieverError> {
        let ids = self.resolve_load_ids(field, q, doc, input)?;

        if ids.is_empty() {
            return Ok(self.is_array_sourced(field).then(|| FieldValue::List(Vec::new())));
        }

        let mut buffer = Vec::new();
        for id in &ids {
            let Some(loaded) = self.load_document(doc, &id.to_lowercase(), token)? else {
                continue;
            };
            if let Some(alias) = &q.alias {
                self.loaded_by_alias.insert(alias.clone(), Arc::clone(&loaded));
            }
            if field.name.is_empty() {
                buffer.push(FieldValue::Document(loaded));
                continue;
            }
            match self.field_from_document(&loaded, field) {
                Some(Bson::Array(items)) => {
                    buffer.extend(items.into_iter().map(FieldValue::Value));
                    self.mark_array_sourced(field);
                }
                Some(value) => buffer.push(FieldValue::Value(value)),
                None => {}
            }
        }

        if self.is_array_sourced(field) {
            return Ok(Some(FieldValue::List(buffer)));
        }
        match buffer.len() {
            0 => Ok(None),
            1 => Ok(buffer.pop()),
            _ => Err(RetrieverError::ShapeViolation {
                field: field.key().to_string(),
            }),
        }
    }

    /// Referenced ids in first-seen order, without duplicates.
    fn resolve_load_ids(
        &mut self,
        field: &FieldToFetch,
        q: &QueryField,
        doc: &RetrievedDocument,
        input: &RetrieverInput<'_>,
    ) -> Result<Vec<String>, RetrieverError> {
        let mut ids = Vec::new();
        match &q.source_alias {
            None => {
                ids.push(doc.id.clone().unwrap_or_default());
                self.loaded_by_alias.clear();
            }
            Some(alias) if q.is_quoted => ids.push(alias.clone()),
            Some(alias) if q.is_parameter => {
                let params = self
                    .query
                    .parameters
                    .as_ref()
                    .ok_or(RetrieverError::MissingParameters)?;
                match params.get(alias) {
                    Some(Bson::Array(items)) => ids.extend(items.iter().map(id_string)),
                    Some(value) => ids.push(id_string(value)),
                    None => return Err(RetrieverError::MissingParameter(alias.clone())),
                }
            }
            Some(alias) if q.load_from_alias.is_some() => {
                let from = q
                    .load_from_alias
                    .as_ref()
                    .and_then(|name| self.loaded_by_alias.get(name));
                match from {
                    Some(from) => self.traverser.read_ids(&from.data, alias, &mut ids),
                    None => trace!(alias = %alias, "load source alias not bound on this row"),
                }
            }
            Some(alias) if field.can_extract_from_index && input.entry.is_some() => {
                self.index_ids(alias, input, &mut ids)?
            }
            Some(alias) => self.traverser.read_ids(&doc.data, alias, &mut ids),
        }

        let mut seen = HashSet::with_capacity(ids.len());
        ids.retain(|id| seen.insert(id.clone()));
        Ok(ids)
    }

    fn index_ids(
        &self,
        alias: &str,
        input: &RetrieverInput<'_>,
        ids: &mut Vec<String>,
    ) -> Result<(), RetrieverError> {
        let Some(entry) = input.entry else {
            return Ok(());
        };
        let values = match entry.backend() {
            Backend::Postings => entry.read_values(alias)?,
            Backend::Columnar => {
                let def = self
                    .plan
                    .index_fields
                    .get(alias)
                    .ok_or_else(|| RetrieverError::IndexFieldNotFound(alias.to_string()))?;
                let value = entry
                    .read_defined(def)?
                    .ok_or_else(|| RetrieverError::IndexFieldNotFound(alias.to_string()))?;
                match value {
                    Bson::Array(items) => items,
                    other => vec![other],
                }
            }
        };
        ids.extend(
            values
                .iter()
                .filter(|v| !matches!(v, Bson::Null))
                .map(id_string),
        );
        Ok(())
    }

    /// A referenced document, cached and held by `parent` through one
    /// reference that is dropped when the parent is released. The parent's
    /// own id stands for the parent itself and adds nothing.
    fn load_document(
        &mut self,
        parent: &Arc<RetrievedDocument>,
        lower_id: &str,
        token: &CancellationToken,
    ) -> Result<Option<Arc<RetrievedDocument>>, RetrieverError> {
        if lower_id.is_empty() || parent.lower_id.as_deref() == Some(lower_id) {
            return Ok(Some(Arc::clone(parent)));
        }
        self.timed(TimingScope::Load, |this| -> Result<_, RetrieverError> {
            let Some(doc) = this.direct_get(lower_id, DocumentFields::All, token)? else {
                debug!(id = lower_id, "referenced document not found");
                return Ok(None);
            };
            let linked = parent
                .lower_id
                .as_deref()
                .is_some_and(|p| this.cache.link(p, lower_id));
            if !linked {
                // nothing holds the load beyond this row
                this.cache.release_document(&doc);
            }
            Ok(Some(doc))
        })
    }

    fn is_array_sourced(&self, field: &FieldToFetch) -> bool {
        field.declared_array_source()
            || self.array_sourced.get(field.slot().0).copied().unwrap_or(false)
    }

    fn mark_array_sourced(&mut self, field: &FieldToFetch) {
        let slot = field.slot().0;
        if self.array_sourced.len() <= slot {
            self.array_sourced.resize(slot + 1, false);
        }
        self.array_sourced[slot] = true;
    }
}
