use std::collections::BTreeMap;

use bson::DateTime;
use slate_vm::ScriptIncludes;

/// Side outputs collected from script runs over one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Includes {
    /// Included document ids, keyed by the id of the document whose
    /// projection asked for them.
    pub documents: BTreeMap<String, Vec<String>>,
    pub revision_change_vectors: Vec<String>,
    pub revisions_before: BTreeMap<String, DateTime>,
    pub compare_exchange: Vec<String>,
}

impl Includes {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.revision_change_vectors.is_empty()
            && self.revisions_before.is_empty()
            && self.compare_exchange.is_empty()
    }

    pub(crate) fn add(&mut self, from: ScriptIncludes, source_id: Option<&str>) {
        let source = source_id.unwrap_or_default();
        if !from.documents.is_empty() {
            let ids = self.documents.entry(source.to_string()).or_default();
            push_unique(ids, from.documents);
        }
        push_unique(&mut self.revision_change_vectors, from.revision_change_vectors);
        if let Some(before) = from.revisions_before {
            self.revisions_before.insert(source.to_string(), before);
        }
        push_unique(&mut self.compare_exchange, from.compare_exchange);
    }
}

fn push_unique(into: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !into.contains(&value) {
            into.push(value);
        }
    }
}
