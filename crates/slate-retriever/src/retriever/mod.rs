//! Turns matched index entries into result documents.
//!
//! One [`Retriever`] serves one query execution from a single thread. It
//! owns the execution's document cache and the per-execution state that
//! the field plan itself must not carry.

mod function;
mod load;
mod row;
mod value;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use slate_query::{DocumentFields, FieldsToFetch, IndexQuery};
use slate_vm::{CancellationToken, FunctionRunner, ScriptKey, TimeSeriesFunctions};
use tracing::{debug, trace};

use crate::cache::DocumentCache;
use crate::config::RetrieverConfig;
use crate::document::{ProjectionResult, RetrievedDocument};
use crate::error::RetrieverError;
use crate::includes::Includes;
use crate::input::RetrieverInput;
use crate::timings::{QueryTimings, TimingScope};
use crate::traits::{CounterLookup, DocumentLoader};
use crate::traverse::Traverser;

type RowResult = Result<Option<ProjectionResult>, RetrieverError>;

pub struct Retriever<'a, L> {
    loader: L,
    query: &'a IndexQuery,
    plan: &'a FieldsToFetch,
    cache: DocumentCache,
    traverser: Traverser,
    script_key: ScriptKey,
    counters: Option<Box<dyn CounterLookup + 'a>>,
    runner: Option<Box<dyn FunctionRunner + 'a>>,
    time_series: Option<Box<dyn TimeSeriesFunctions + 'a>>,
    includes: Includes,
    timings: Option<QueryTimings>,
    /// Fields found to hold arrays during this execution, by slot.
    array_sourced: Vec<bool>,
    loaded_by_alias: HashMap<String, Arc<RetrievedDocument>>,
}

impl<'a, L: DocumentLoader> Retriever<'a, L> {
    pub fn new(
        loader: L,
        query: &'a IndexQuery,
        plan: &'a FieldsToFetch,
        config: RetrieverConfig,
    ) -> Self {
        debug!(
            fields = plan.fields().len(),
            extract_all = plan.extract_all_from_index(),
            tracking = config.track_references,
            "creating retriever"
        );
        Self {
            loader,
            query,
            plan,
            cache: DocumentCache::new(config.cache_capacity, config.track_references),
            traverser: Traverser::new(config.reduce_results),
            script_key: ScriptKey::new(query.declared_functions.values()),
            counters: None,
            runner: None,
            time_series: None,
            includes: Includes::default(),
            timings: config.collect_timings.then(QueryTimings::default),
            array_sourced: vec![false; plan.slot_count()],
            loaded_by_alias: HashMap::new(),
        }
    }

    pub fn with_counters(mut self, counters: impl CounterLookup + 'a) -> Self {
        self.counters = Some(Box::new(counters));
        self
    }

    pub fn with_runner(mut self, runner: impl FunctionRunner + 'a) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    pub fn with_time_series(mut self, functions: impl TimeSeriesFunctions + 'a) -> Self {
        self.time_series = Some(Box::new(functions));
        self
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn timings(&self) -> Option<&QueryTimings> {
        self.timings.as_ref()
    }

    pub fn includes(&self) -> &Includes {
        &self.includes
    }

    pub fn take_includes(&mut self) -> Includes {
        std::mem::take(&mut self.includes)
    }

    /// End of execution: drop every cached document.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.loaded_by_alias.clear();
    }

    // ── Entry points ────────────────────────────────────────────

    /// Produce the result for one matched row. `Ok(None)` skips the row.
    pub fn get(&mut self, input: RetrieverInput<'_>, token: &CancellationToken) -> RowResult {
        self.timed(TimingScope::Retriever, |this| -> RowResult {
            token.check()?;
            let Some(id) = this.try_get_key(&input)? else {
                trace!("matched entry has no document key, skipping row");
                return Ok(None);
            };
            let lower_id = id.to_lowercase();
            if this.plan.is_projection() {
                return this.get_projection(input, &lower_id, token);
            }

            let fields = this.query.document_fields;
            let loaded = this.timed(TimingScope::Storage, |this| {
                this.direct_get(&lower_id, fields, token)
            })?;
            let Some(doc) = loaded else {
                debug!(id = %lower_id, "document not found, skipping row");
                return Ok(None);
            };
            let mut out = (*doc).clone();
            this.cache.release_document(&doc);
            row::finish(&mut out, &input);
            Ok(Some(ProjectionResult::Single(out)))
        })
    }

    /// The document key stored in the matched entry.
    pub fn try_get_key(&self, input: &RetrieverInput<'_>) -> Result<Option<String>, RetrieverError> {
        match input.entry {
            Some(entry) => Ok(entry.document_id()?),
            None => Ok(None),
        }
    }

    /// Cached storage read. The returned document holds a cache reference
    /// until passed to [`release`](Self::release).
    pub fn direct_get(
        &mut self,
        lower_id: &str,
        fields: DocumentFields,
        token: &CancellationToken,
    ) -> Result<Option<Arc<RetrievedDocument>>, RetrieverError> {
        token.check()?;
        let loader = &self.loader;
        let doc = self.cache.get_or_load(lower_id, || {
            let found = loader.get(lower_id, fields, token)?;
            Ok::<_, RetrieverError>(found.map(|mut doc| {
                doc.lower_id = Some(lower_id.to_string());
                doc
            }))
        })?;
        Ok(doc)
    }

    pub fn release(&mut self, doc: &Arc<RetrievedDocument>) {
        self.cache.release_document(doc);
    }

    /// Project one row identified by `lower_id`.
    pub fn get_projection(
        &mut self,
        input: RetrieverInput<'_>,
        lower_id: &str,
        token: &CancellationToken,
    ) -> RowResult {
        self.timed(TimingScope::Projection, |this| {
            this.project_row(&input, lower_id, token)
        })
    }

    /// Project a document the caller already materialized. The cached
    /// instance is used when one exists.
    pub fn get_projection_from_document(
        &mut self,
        doc: RetrievedDocument,
        input: RetrieverInput<'_>,
        token: &CancellationToken,
    ) -> RowResult {
        self.timed(TimingScope::Retriever, |this| {
            this.timed(TimingScope::Projection, |this| -> RowResult {
                let lower_id = doc
                    .lower_id
                    .clone()
                    .or_else(|| doc.id.as_deref().map(str::to_lowercase));
                let cached = match lower_id {
                    Some(lower_id) => {
                        let mut doc = doc;
                        doc.lower_id = Some(lower_id.clone());
                        this.cache.insert_referenced(&lower_id, doc)
                    }
                    None => Arc::new(doc),
                };
                this.project_document(cached, &input, token)
            })
        })
    }

    fn timed<T>(&mut self, scope: TimingScope, f: impl FnOnce(&mut Self) -> T) -> T {
        if self.timings.is_none() {
            return f(self);
        }
        let started = Instant::now();
        let out = f(self);
        if let Some(timings) = self.timings.as_mut() {
            timings.record(scope, started.elapsed());
        }
        out
    }
}
