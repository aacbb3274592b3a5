#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;

use bson::{Bson, Document, doc};
use slate_index::{DOCUMENT_ID_FIELD, PostingField, PostingsDocument};
use slate_query::{DeclaredFunction, DocumentFields};
use slate_retriever::{CounterLookup, DocumentLoader, RetrievedDocument, StorageError};
use slate_vm::{
    CancellationToken, FunctionRunner, ScriptArg, ScriptKey, ScriptOutput, TimeSeriesFunctions,
    TimeSeriesResult, VmError,
};

// ── Storage ─────────────────────────────────────────────────────

/// Documents keyed by lowercase id. Counts every storage read.
#[derive(Default)]
pub struct MemoryLoader {
    docs: HashMap<String, RetrievedDocument>,
    reads: Cell<usize>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, data: Document) -> Self {
        self.docs
            .insert(id.to_lowercase(), RetrievedDocument::new(id, data));
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl DocumentLoader for MemoryLoader {
    fn get(
        &self,
        lower_id: &str,
        _fields: DocumentFields,
        _token: &CancellationToken,
    ) -> Result<Option<RetrievedDocument>, StorageError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.docs.get(lower_id).cloned())
    }
}

/// Loader whose every read fails.
pub struct BrokenLoader;

impl DocumentLoader for BrokenLoader {
    fn get(
        &self,
        lower_id: &str,
        _fields: DocumentFields,
        _token: &CancellationToken,
    ) -> Result<Option<RetrievedDocument>, StorageError> {
        Err(StorageError::new(format!("disk gone while reading {lower_id}")))
    }
}

/// The sample data set: users, people, companies and orders.
pub fn sample_loader() -> MemoryLoader {
    MemoryLoader::new()
        .with("users/1", doc! { "Id": "users/1", "Name": "Arek", "Age": 33 })
        .with("users/2", doc! { "Name": "Oren", "Age": 44 })
        .with(
            "people/1",
            doc! { "Name": "Arava", "Tags": ["dev", "ops"], "Employer": "companies/1" },
        )
        .with("people/2", doc! { "Name": "Oscar", "Tags": "sales" })
        .with("companies/1", doc! { "Name": "Hibernating Rhinos", "City": "Hadera" })
        .with(
            "orders/1",
            doc! {
                "Company": "companies/1",
                "People": ["people/1", "people/2"],
                "Owner": "people/1",
                "Lines": [
                    { "Product": "ball", "Qty": 2 },
                    { "Product": "bat", "Qty": 1 },
                ],
            },
        )
}

/// A postings entry for `id` with extra stored fields.
pub fn postings(id: &str, fields: &[(&str, &str)]) -> PostingsDocument {
    let mut doc = PostingsDocument::new().with(PostingField::untokenized(DOCUMENT_ID_FIELD, id));
    for (name, value) in fields {
        doc = doc.with(PostingField::text(*name, *value));
    }
    doc
}

// ── Counters ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCounters {
    values: HashMap<(String, String), i64>,
}

impl MemoryCounters {
    pub fn with(mut self, document_id: &str, name: &str, value: i64) -> Self {
        self.values
            .insert((document_id.to_string(), name.to_string()), value);
        self
    }
}

impl CounterLookup for MemoryCounters {
    fn get_value(&self, document_id: &str, name: &str) -> Result<Option<i64>, StorageError> {
        Ok(self
            .values
            .get(&(document_id.to_string(), name.to_string()))
            .copied())
    }

    fn get_raw(&self, document_id: &str, name: &str) -> Result<Option<Document>, StorageError> {
        Ok(self
            .get_value(document_id, name)?
            .map(|total| doc! { "A": total }))
    }
}

// ── Functions ───────────────────────────────────────────────────

/// Runner backed by a closure over the function name and arguments.
pub struct FnRunner<F> {
    f: F,
    pub calls: usize,
}

impl<F> FnRunner<F>
where
    F: FnMut(&str, &[ScriptArg<'_>]) -> Result<ScriptOutput, VmError>,
{
    pub fn new(f: F) -> Self {
        Self { f, calls: 0 }
    }
}

impl<F> FunctionRunner for FnRunner<F>
where
    F: FnMut(&str, &[ScriptArg<'_>]) -> Result<ScriptOutput, VmError>,
{
    fn run(
        &mut self,
        _key: &ScriptKey,
        function: &str,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<ScriptOutput, VmError> {
        token.check()?;
        self.calls += 1;
        (self.f)(function, args)
    }
}

/// Returns `rows` for every call, tagged with the function name.
pub struct FixedTimeSeries {
    pub rows: Vec<Document>,
}

impl TimeSeriesFunctions for FixedTimeSeries {
    fn invoke(
        &mut self,
        function: &DeclaredFunction,
        document_id: Option<&str>,
        _args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<TimeSeriesResult, VmError> {
        token.check()?;
        Ok(TimeSeriesResult {
            rows: self.rows.clone(),
            metadata: doc! {
                "@function": function.name.clone(),
                "@owner": document_id.map(Bson::from).unwrap_or(Bson::Null),
            },
        })
    }
}

/// Body without the `@metadata` member.
pub fn body(doc: &RetrievedDocument) -> Document {
    let mut data = doc.data.clone();
    data.remove("@metadata");
    data
}
