use std::sync::Arc;

use bson::{Bson, Document};
use slate_index::Backend;
use slate_query::{DocumentFields, FieldToFetch, TIME_SERIES_QUERY_FUNCTION};
use slate_vm::CancellationToken;
use tracing::{debug, trace};

use super::value::FieldValue;
use super::{Retriever, RowResult};
use crate::document::{
    ProjectionResult, RetrievedDocument, TimeSeriesStream, mark_projection, merge_metadata,
};
use crate::error::RetrieverError;
use crate::input::RetrieverInput;
use crate::timings::TimingScope;
use crate::traits::DocumentLoader;

/// State gathered while one row's fields are assembled.
#[derive(Debug, Default)]
pub(super) struct RowState {
    stream: Option<TimeSeriesStream>,
}

/// Stamp the row's score and distance on an outgoing document.
pub(super) fn finish(doc: &mut RetrievedDocument, input: &RetrieverInput<'_>) {
    if let Some(score) = input.score {
        doc.score = Some(score);
    }
    if let Some(distance) = input.distance {
        doc.distance = Some(distance);
    }
}

impl<L: DocumentLoader> Retriever<'_, L> {
    // ── Index rows ──────────────────────────────────────────────

    pub(super) fn project_row(
        &mut self,
        input: &RetrieverInput<'_>,
        lower_id: &str,
        token: &CancellationToken,
    ) -> RowResult {
        let plan = self.plan;
        let behavior = plan.behavior;

        if !plan.any_extractable_from_index() {
            let loaded = self.timed(TimingScope::Storage, |this| {
                this.direct_get(lower_id, DocumentFields::All, token)
            })?;
            let Some(doc) = loaded else {
                if behavior.must_extract_from_document() && behavior.must_extract_or_throw() {
                    return Err(RetrieverError::DocumentMissing {
                        id: lower_id.to_string(),
                    });
                }
                debug!(id = lower_id, "projected document not found, skipping row");
                return Ok(None);
            };
            return self.project_document(doc, input, token);
        }

        let merged;
        let fields: &[FieldToFetch] = match input.entry {
            Some(entry) if plan.extract_all_from_index() => {
                merged = plan.merged_with_index_fields(entry.stored_field_names());
                &merged
            }
            _ => plan.fields(),
        };

        let mut doc = None;
        let out = self.project_index_fields(fields, input, lower_id, &mut doc, token);
        if let Some(doc) = doc {
            self.cache.release_document(&doc);
        }
        out
    }

    /// Field loop of an index row. A document loaded on the way is left in
    /// `doc` for the caller to release, whatever the outcome.
    fn project_index_fields(
        &mut self,
        fields: &[FieldToFetch],
        input: &RetrieverInput<'_>,
        lower_id: &str,
        doc: &mut Option<Arc<RetrievedDocument>>,
        token: &CancellationToken,
    ) -> RowResult {
        let behavior = self.plan.behavior;
        let mut result = Document::new();
        let mut row = RowState::default();
        for field in fields {
            token.check()?;
            if field.can_extract_from_index && self.extract_from_index(field, input, &mut result)? {
                continue;
            }
            if behavior.must_extract_from_index() {
                if !behavior.must_extract_or_throw() {
                    continue;
                }
                if self.extract_from_index(field, input, &mut result)? {
                    continue;
                }
                return Err(RetrieverError::NotExtractable {
                    field: field.name.clone(),
                });
            }

            let current = match doc.clone() {
                Some(d) => d,
                None => {
                    let loaded = self.timed(TimingScope::Storage, |this| {
                        this.direct_get(lower_id, DocumentFields::All, token)
                    })?;
                    match loaded {
                        Some(d) => {
                            *doc = Some(Arc::clone(&d));
                            d
                        }
                        None if behavior.must_extract_from_document() => {
                            if behavior.must_extract_or_throw() {
                                return Err(RetrieverError::DocumentMissing {
                                    id: lower_id.to_string(),
                                });
                            }
                            break;
                        }
                        None => {
                            debug!(id = lower_id, "projected document not found, skipping row");
                            return Ok(None);
                        }
                    }
                }
            };

            match self.try_get_value(field, &current, input, token)? {
                Some((key, value)) => {
                    if let Some(done) =
                        self.add_projection(&mut result, &mut row, &current, key, value, input)?
                    {
                        return Ok(Some(done));
                    }
                }
                None if behavior.must_extract_from_document() && behavior.must_extract_or_throw() => {
                    return Err(RetrieverError::FieldMissing {
                        id: lower_id.to_string(),
                        field: field.name.clone(),
                    });
                }
                None => trace!(field = %field.name, "field not found in document"),
            }
        }

        let out = match doc.as_ref() {
            Some(d) => return_projection(result, row, d, input),
            None => return_projection(
                result,
                row,
                &RetrievedDocument::from_index(lower_id),
                input,
            ),
        };
        Ok(Some(ProjectionResult::Single(out)))
    }

    /// `true` when the index produced a value for `field`.
    fn extract_from_index(
        &self,
        field: &FieldToFetch,
        input: &RetrieverInput<'_>,
        result: &mut Document,
    ) -> Result<bool, RetrieverError> {
        let Some(entry) = input.entry else {
            return Ok(false);
        };
        if entry.backend() == Backend::Columnar
            && !field.can_extract_from_index
            && !field.is_document_id
        {
            return Ok(false);
        }
        match entry.read_field(&field.name)? {
            Some(value) => {
                result.insert(field.key(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Document rows ───────────────────────────────────────────

    /// Build the row's result from `doc`, which holds one cache reference
    /// owned by this call. The reference is dropped on every exit.
    pub(super) fn project_document(
        &mut self,
        doc: Arc<RetrievedDocument>,
        input: &RetrieverInput<'_>,
        token: &CancellationToken,
    ) -> RowResult {
        let out = self.project_document_fields(&doc, input, token);
        self.cache.release_document(&doc);
        out
    }

    fn project_document_fields(
        &mut self,
        doc: &Arc<RetrievedDocument>,
        input: &RetrieverInput<'_>,
        token: &CancellationToken,
    ) -> RowResult {
        let plan = self.plan;
        let behavior = plan.behavior;
        if plan.fields().is_empty() {
            let mut out = (**doc).clone();
            finish(&mut out, input);
            return Ok(Some(ProjectionResult::Single(out)));
        }

        let mut result = Document::new();
        let mut row = RowState::default();
        for field in plan.fields() {
            token.check()?;
            let (key, value) = match self.try_get_value(field, doc, input, token)? {
                Some(found) => found,
                None => {
                    if behavior.must_extract_from_document() && behavior.must_extract_or_throw() {
                        return Err(RetrieverError::FieldMissing {
                            id: doc.lower_id.clone().unwrap_or_default(),
                            field: field.name.clone(),
                        });
                    }
                    if field.query_field.as_ref().is_some_and(|q| q.has_source_alias) {
                        continue;
                    }
                    (field.key().to_string(), FieldValue::Value(Bson::Null))
                }
            };
            if let Some(done) = self.add_projection(&mut result, &mut row, doc, key, value, input)? {
                return Ok(Some(done));
            }
        }
        Ok(Some(ProjectionResult::Single(return_projection(
            result, row, doc, input,
        ))))
    }

    // ── Assembly ────────────────────────────────────────────────

    /// Place one value. A lone unaliased function or whole-body load ends
    /// the row with its own result document(s).
    fn add_projection(
        &self,
        result: &mut Document,
        row: &mut RowState,
        doc: &RetrievedDocument,
        key: String,
        value: FieldValue,
        input: &RetrieverInput<'_>,
    ) -> Result<Option<ProjectionResult>, RetrieverError> {
        let value = match value {
            FieldValue::Stream(ts)
                if self.query.is_stream && key.starts_with(TIME_SERIES_QUERY_FUNCTION) =>
            {
                merge_metadata(result, ts.metadata);
                row.stream = Some(TimeSeriesStream { key, rows: ts.rows });
                return Ok(None);
            }
            other => other,
        };

        if self.plan.single_body_or_method_with_no_alias() {
            let mut out = self.create_new_document(doc, &key, value)?;
            match &mut out {
                ProjectionResult::Single(d) => finish(d, input),
                ProjectionResult::Many(docs) => docs.iter_mut().for_each(|d| finish(d, input)),
            }
            return Ok(Some(out));
        }

        result.insert(key, value.into_embedded());
        Ok(None)
    }

    /// Turn a lone value into result documents.
    fn create_new_document(
        &self,
        doc: &RetrievedDocument,
        key: &str,
        value: FieldValue,
    ) -> Result<ProjectionResult, RetrieverError> {
        let out = match value {
            FieldValue::List(items) => {
                let mut docs = Vec::with_capacity(items.len());
                for item in items {
                    match self.create_new_document(doc, key, item)? {
                        ProjectionResult::Single(d) => docs.push(d),
                        ProjectionResult::Many(many) => docs.extend(many),
                    }
                }
                return Ok(ProjectionResult::Many(docs));
            }
            FieldValue::Value(Bson::Document(body)) => doc.clone_with(body),
            FieldValue::Document(loaded) => (*loaded).clone(),
            FieldValue::Stream(ts) => {
                let mut out = doc.clone_with(ts.metadata);
                out.time_series_stream = Some(TimeSeriesStream {
                    key: key.to_string(),
                    rows: ts.rows,
                });
                out
            }
            FieldValue::Value(other) => {
                return Err(RetrieverError::FunctionContractViolation(other.to_string()));
            }
        };
        Ok(ProjectionResult::Single(out))
    }
}

fn return_projection(
    mut result: Document,
    row: RowState,
    doc: &RetrievedDocument,
    input: &RetrieverInput<'_>,
) -> RetrievedDocument {
    mark_projection(&mut result);
    let mut out = doc.clone_with(result);
    if let Some(stream) = row.stream {
        out.time_series_stream = Some(stream);
    }
    finish(&mut out, input);
    out
}
