use std::sync::Arc;

use bson::{Bson, Document, doc};
use slate_query::FieldToFetch;
use slate_vm::{CancellationToken, DocumentArg, ScriptArg, TimeSeriesResult};
use tracing::{debug, trace};

use super::Retriever;
use super::value::FieldValue;
use crate::document::{RetrievedDocument, mark_projection, merge_metadata};
use crate::error::RetrieverError;
use crate::input::RetrieverInput;
use crate::timings::TimingScope;
use crate::traits::DocumentLoader;

impl<L: DocumentLoader> Retriever<'_, L> {
    /// Evaluate the arguments of a function field and call it.
    pub(super) fn function_value(
        &mut self,
        field: &FieldToFetch,
        name: &str,
        doc: &Arc<RetrievedDocument>,
        input: &RetrieverInput<'_>,
        token: &CancellationToken,
    ) -> Result<FieldValue, RetrieverError> {
        let plan = self.plan;
        let mut resolved = Vec::with_capacity(field.function_args.len());
        for arg in &field.function_args {
            resolved.push(self.try_get_value(arg, doc, input, token)?.map(|(_, v)| v));
        }

        let mut args = Vec::with_capacity(resolved.len() + 1);
        for value in &resolved {
            args.push(match value {
                // the row's own document keeps its index entry
                Some(FieldValue::Document(d)) if Arc::ptr_eq(d, doc) => {
                    ScriptArg::Document(DocumentArg {
                        id: doc.id.as_deref(),
                        data: &doc.data,
                        entry: input.entry,
                        index_fields: &plan.index_fields,
                        behavior: plan.behavior,
                    })
                }
                Some(value) => ScriptArg::Value(value.to_bson()),
                None => ScriptArg::Value(Bson::Null),
            });
        }
        args.push(ScriptArg::Value(
            self.query
                .parameters
                .clone()
                .map(Bson::Document)
                .unwrap_or(Bson::Null),
        ));

        self.timed(TimingScope::Function, |this| {
            this.invoke_function(name, doc.id.as_deref(), &args, token)
        })
    }

    fn invoke_function(
        &mut self,
        name: &str,
        document_id: Option<&str>,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<FieldValue, RetrieverError> {
        token.check()?;
        let query = self.query;

        if let Some(function) = query.time_series_function(name) {
            let Some(functions) = self.time_series.as_mut() else {
                return Err(RetrieverError::FunctionUnavailable(name.to_string()));
            };
            debug!(function = name, document = ?document_id, "invoking time-series function");
            let result = functions.invoke(function, document_id, args, token)?;
            if query.is_stream {
                return Ok(FieldValue::Stream(result));
            }
            return Ok(FieldValue::Value(Bson::Document(materialize(result))));
        }

        let Some(runner) = self.runner.as_mut() else {
            return Err(RetrieverError::FunctionUnavailable(name.to_string()));
        };
        trace!(function = name, args = args.len(), "invoking script function");
        let output = runner.run(&self.script_key, name, args, token)?;
        if !output.includes.is_empty() {
            self.includes.add(output.includes, document_id);
        }
        Ok(translate(output.value))
    }
}

/// Time-series rows folded into a plain result body.
fn materialize(result: TimeSeriesResult) -> Document {
    let count = i64::try_from(result.rows.len()).unwrap_or(i64::MAX);
    let rows: Vec<Bson> = result.rows.into_iter().map(Bson::Document).collect();
    let mut body = doc! { "Count": count, "Results": rows };
    if !result.metadata.is_empty() {
        merge_metadata(&mut body, result.metadata);
    }
    body
}

/// Script results that are objects are projections of their own.
fn translate(value: Bson) -> FieldValue {
    match value {
        Bson::Null => FieldValue::Value(Bson::Null),
        Bson::Document(mut body) => {
            mark_projection(&mut body);
            FieldValue::Value(Bson::Document(body))
        }
        Bson::Array(items) => FieldValue::List(items.into_iter().map(translate).collect()),
        other => FieldValue::Value(other),
    }
}
