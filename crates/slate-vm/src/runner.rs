use std::collections::BTreeMap;

use bson::{Bson, DateTime, Document};
use slate_index::{IndexEntry, IndexError};
use slate_query::{DeclaredFunction, IndexFieldDef, ProjectionBehavior};

use crate::cancel::CancellationToken;
use crate::error::VmError;
use crate::key::ScriptKey;

// ── Arguments ───────────────────────────────────────────────────

/// The row's own document handed to a function, together with what is
/// needed to read index-only data for it.
#[derive(Debug, Clone, Copy)]
pub struct DocumentArg<'a> {
    pub id: Option<&'a str>,
    pub data: &'a Document,
    pub entry: Option<IndexEntry<'a>>,
    pub index_fields: &'a BTreeMap<String, IndexFieldDef>,
    pub behavior: ProjectionBehavior,
}

impl DocumentArg<'_> {
    /// Read a stored index field for this row. `Ok(None)` when the row was
    /// not produced by an index or the field is not stored.
    pub fn index_value(&self, name: &str) -> Result<Option<Bson>, IndexError> {
        let Some(entry) = self.entry else {
            return Ok(None);
        };
        match self.index_fields.get(name) {
            Some(def) => entry.read_defined(def),
            None => entry.read_field(name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScriptArg<'a> {
    Value(Bson),
    Document(DocumentArg<'a>),
}

impl ScriptArg<'_> {
    /// Plain document-model view of the argument.
    pub fn to_bson(&self) -> Bson {
        match self {
            ScriptArg::Value(v) => v.clone(),
            ScriptArg::Document(d) => Bson::Document(d.data.clone()),
        }
    }
}

// ── Results ─────────────────────────────────────────────────────

/// Side outputs requested by a script run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptIncludes {
    pub documents: Vec<String>,
    pub revision_change_vectors: Vec<String>,
    pub revisions_before: Option<DateTime>,
    pub compare_exchange: Vec<String>,
}

impl ScriptIncludes {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.revision_change_vectors.is_empty()
            && self.revisions_before.is_none()
            && self.compare_exchange.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptOutput {
    pub value: Bson,
    pub includes: ScriptIncludes,
}

impl ScriptOutput {
    pub fn value(value: impl Into<Bson>) -> Self {
        Self {
            value: value.into(),
            includes: ScriptIncludes::default(),
        }
    }
}

/// Rows produced by a time-series function plus the result metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesResult {
    pub rows: Vec<Document>,
    pub metadata: Document,
}

// ── Collaborators ───────────────────────────────────────────────

/// Runs declared script functions.
///
/// The last element of `args` is always the query parameters (or null).
pub trait FunctionRunner {
    fn run(
        &mut self,
        key: &ScriptKey,
        function: &str,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<ScriptOutput, VmError>;
}

/// Evaluates declared time-series functions for one document.
pub trait TimeSeriesFunctions {
    fn invoke(
        &mut self,
        function: &DeclaredFunction,
        document_id: Option<&str>,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<TimeSeriesResult, VmError>;
}

impl<T: FunctionRunner + ?Sized> FunctionRunner for &mut T {
    fn run(
        &mut self,
        key: &ScriptKey,
        function: &str,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<ScriptOutput, VmError> {
        (**self).run(key, function, args, token)
    }
}

impl<T: TimeSeriesFunctions + ?Sized> TimeSeriesFunctions for &mut T {
    fn invoke(
        &mut self,
        function: &DeclaredFunction,
        document_id: Option<&str>,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<TimeSeriesResult, VmError> {
        (**self).invoke(function, document_id, args, token)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use slate_index::{PostingField, PostingsDocument};

    use super::*;

    #[test]
    fn document_arg_reads_index() {
        let data = doc! { "Name": "Arek" };
        let postings = PostingsDocument::new().with(PostingField::text("Total", "12"));
        let defs = BTreeMap::new();
        let arg = DocumentArg {
            id: Some("orders/1"),
            data: &data,
            entry: Some(IndexEntry::Postings(&postings)),
            index_fields: &defs,
            behavior: ProjectionBehavior::Default,
        };
        assert_eq!(arg.index_value("Total").unwrap(), Some(Bson::String("12".into())));
        assert_eq!(arg.index_value("Missing").unwrap(), None);

        let detached = DocumentArg { entry: None, ..arg };
        assert_eq!(detached.index_value("Total").unwrap(), None);
        assert_eq!(
            ScriptArg::Document(detached).to_bson(),
            Bson::Document(doc! { "Name": "Arek" })
        );
    }

    #[test]
    fn empty_includes() {
        assert!(ScriptIncludes::default().is_empty());
        let some = ScriptIncludes {
            compare_exchange: vec!["k".into()],
            ..Default::default()
        };
        assert!(!some.is_empty());
    }
}
