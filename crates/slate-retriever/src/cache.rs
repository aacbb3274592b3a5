//! Loaded-documents cache for one query execution.
//!
//! Documents live in an arena of slots addressed by lowercase id through an
//! LRU index. In tracking mode every slot carries a reference count and the
//! list of children whose counts it holds; only unreferenced slots are
//! evicted. The plain mode keeps no counts and evicts strictly by recency.

use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace};

use crate::document::RetrievedDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotId(usize);

#[derive(Debug)]
struct Slot {
    doc: Arc<RetrievedDocument>,
    refs: usize,
    children: Vec<SlotId>,
}

#[derive(Debug)]
pub struct DocumentCache {
    capacity: usize,
    tracking: bool,
    slots: Vec<Option<Slot>>,
    free: Vec<SlotId>,
    by_id: LruCache<String, SlotId>,
}

impl DocumentCache {
    pub fn new(capacity: usize, tracking: bool) -> Self {
        Self {
            capacity: capacity.max(1),
            tracking,
            slots: Vec::new(),
            free: Vec::new(),
            by_id: LruCache::unbounded(),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Cached document, promoted to most recently used. Does not count as a
    /// reference.
    pub fn get(&mut self, lower_id: &str) -> Option<Arc<RetrievedDocument>> {
        let slot = *self.by_id.get(lower_id)?;
        self.slot(slot).map(|s| Arc::clone(&s.doc))
    }

    pub fn contains(&self, lower_id: &str) -> bool {
        self.by_id.contains(lower_id)
    }

    /// Cache `doc` unless an entry exists already; returns the cached
    /// instance either way.
    pub fn insert(&mut self, lower_id: &str, doc: RetrievedDocument) -> Arc<RetrievedDocument> {
        match self.get(lower_id) {
            Some(existing) => existing,
            None => self.insert_slot(lower_id, doc, 0),
        }
    }

    /// Like [`insert`](Self::insert), and the returned document gains a
    /// reference. A new entry holds its reference before anything is
    /// evicted, so it can never be the victim of its own insertion.
    pub fn insert_referenced(
        &mut self,
        lower_id: &str,
        doc: RetrievedDocument,
    ) -> Arc<RetrievedDocument> {
        match self.get(lower_id) {
            Some(existing) => {
                self.increase_reference(lower_id);
                existing
            }
            None => self.insert_slot(lower_id, doc, usize::from(self.tracking)),
        }
    }

    fn insert_slot(
        &mut self,
        lower_id: &str,
        doc: RetrievedDocument,
        refs: usize,
    ) -> Arc<RetrievedDocument> {
        let doc = Arc::new(doc);
        let slot = Slot {
            doc: Arc::clone(&doc),
            refs,
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.0] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                SlotId(self.slots.len() - 1)
            }
        };
        self.by_id.put(lower_id.to_string(), id);
        self.evict();
        doc
    }

    /// Cached document on a hit, otherwise the result of `load`, inserted.
    /// Either way the returned document gains a reference. A missing
    /// document is not remembered, so the next call asks `load` again.
    pub fn get_or_load<E>(
        &mut self,
        lower_id: &str,
        load: impl FnOnce() -> Result<Option<RetrievedDocument>, E>,
    ) -> Result<Option<Arc<RetrievedDocument>>, E> {
        if let Some(doc) = self.get(lower_id) {
            self.increase_reference(lower_id);
            return Ok(Some(doc));
        }
        trace!(id = lower_id, "document cache miss");
        let Some(loaded) = load()? else {
            return Ok(None);
        };
        Ok(Some(self.insert_referenced(lower_id, loaded)))
    }

    pub fn increase_reference(&mut self, lower_id: &str) -> bool {
        if !self.tracking {
            return false;
        }
        let Some(slot) = self.by_id.peek(lower_id).copied() else {
            return false;
        };
        match self.slot_mut(slot) {
            Some(s) => {
                s.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Record that `parent`'s projection embeds `child`: the child gains a
    /// reference that is held until the parent is released. No-op unless
    /// tracking, both are cached and they are different documents.
    pub fn track(&mut self, parent: &str, child: &str) -> bool {
        if !self.link(parent, child) {
            return false;
        }
        self.increase_reference(child)
    }

    /// Hand a reference the caller already holds on `child` over to
    /// `parent`; it is dropped when the parent is released. `false` when no
    /// edge was recorded, in which case the caller still owns it.
    pub fn link(&mut self, parent: &str, child: &str) -> bool {
        if !self.tracking {
            return false;
        }
        let (Some(p), Some(c)) = (
            self.by_id.peek(parent).copied(),
            self.by_id.peek(child).copied(),
        ) else {
            return false;
        };
        if p == c {
            return false;
        }
        match self.slot_mut(p) {
            Some(s) => {
                s.children.push(c);
                true
            }
            None => false,
        }
    }

    /// Drop one reference. At zero the document releases its children and
    /// becomes evictable.
    pub fn release(&mut self, lower_id: &str) {
        if !self.tracking {
            return;
        }
        if let Some(slot) = self.by_id.peek(lower_id).copied() {
            self.release_slot(slot);
        }
        self.evict();
    }

    /// Release `doc` if it is the instance cached under its id. Documents
    /// built outside the cache are ignored.
    pub fn release_document(&mut self, doc: &Arc<RetrievedDocument>) {
        if let Some(lower_id) = self.cached_id(doc) {
            self.release(&lower_id);
        }
    }

    fn cached_id(&self, doc: &Arc<RetrievedDocument>) -> Option<String> {
        let lower_id = doc.lower_id.as_deref()?;
        let slot = self.slot(*self.by_id.peek(lower_id)?)?;
        Arc::ptr_eq(&slot.doc, doc).then(|| lower_id.to_string())
    }

    pub fn reference_count(&self, lower_id: &str) -> Option<usize> {
        let slot = self.by_id.peek(lower_id)?;
        self.slot(*slot).map(|s| s.refs)
    }

    /// Drop every entry. Called once when the execution ends.
    pub fn clear(&mut self) {
        debug!(entries = self.by_id.len(), "clearing document cache");
        self.by_id.clear();
        self.slots.clear();
        self.free.clear();
    }

    fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    fn release_slot(&mut self, id: SlotId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(slot) = self.slot_mut(id) else {
                continue;
            };
            if slot.refs == 0 {
                continue;
            }
            slot.refs -= 1;
            if slot.refs == 0 {
                pending.append(&mut slot.children);
            }
        }
    }

    fn evict(&mut self) {
        while self.by_id.len() > self.capacity {
            let victim = self
                .by_id
                .iter()
                .rev()
                .find(|(_, slot)| !self.tracking || self.slot(**slot).is_none_or(|s| s.refs == 0))
                .map(|(key, _)| key.clone());
            let Some(key) = victim else {
                debug!(
                    entries = self.by_id.len(),
                    capacity = self.capacity,
                    "document cache over capacity, every entry is referenced"
                );
                return;
            };
            if let Some(id) = self.by_id.pop(&key) {
                trace!(id = %key, "evicting cached document");
                let children = self
                    .slots
                    .get_mut(id.0)
                    .and_then(Option::take)
                    .map(|s| s.children)
                    .unwrap_or_default();
                self.free.push(id);
                for child in children {
                    self.release_slot(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn doc(id: &str) -> RetrievedDocument {
        RetrievedDocument::new(id, doc! { "Name": id })
    }

    fn load(id: &str) -> impl FnOnce() -> Result<Option<RetrievedDocument>, ()> + '_ {
        move || Ok(Some(doc(id)))
    }

    #[test]
    fn hit_returns_same_instance_and_counts() {
        let mut cache = DocumentCache::new(16, true);
        let a = cache.get_or_load("users/1", load("users/1")).unwrap().unwrap();
        let b = cache
            .get_or_load("users/1", || -> Result<_, ()> { panic!("loaded twice") })
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.reference_count("users/1"), Some(2));
    }

    #[test]
    fn missing_is_not_cached() {
        let mut cache = DocumentCache::new(16, true);
        let mut calls = 0;
        for _ in 0..2 {
            let found = cache
                .get_or_load("users/9", || -> Result<_, ()> {
                    calls += 1;
                    Ok(None)
                })
                .unwrap();
            assert!(found.is_none());
        }
        assert_eq!(calls, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn referenced_entries_survive_eviction() {
        let mut cache = DocumentCache::new(2, true);
        cache.get_or_load("a", load("a")).unwrap();
        cache.insert("b", doc("b"));
        cache.insert("c", doc("c"));
        // "a" is the oldest but referenced, so "b" goes
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));

        cache.release("a");
        cache.insert("d", doc("d"));
        assert!(!cache.contains("a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn plain_mode_is_lru() {
        let mut cache = DocumentCache::new(2, false);
        cache.get_or_load("a", load("a")).unwrap();
        cache.insert("b", doc("b"));
        cache.get("a");
        cache.insert("c", doc("c"));
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(cache.reference_count("a"), Some(0));
        cache.track("a", "c");
        assert_eq!(cache.reference_count("c"), Some(0));
    }

    #[test]
    fn children_are_held_by_their_parent() {
        let mut cache = DocumentCache::new(16, true);
        cache.get_or_load("orders/1", load("orders/1")).unwrap();
        cache.get_or_load("companies/1", load("companies/1")).unwrap();
        cache.track("orders/1", "companies/1");
        assert_eq!(cache.reference_count("companies/1"), Some(2));

        cache.release("companies/1");
        assert_eq!(cache.reference_count("companies/1"), Some(1));
        cache.release("orders/1");
        assert_eq!(cache.reference_count("orders/1"), Some(0));
        assert_eq!(cache.reference_count("companies/1"), Some(0));
    }

    #[test]
    fn self_tracking_is_ignored() {
        let mut cache = DocumentCache::new(16, true);
        cache.get_or_load("users/1", load("users/1")).unwrap();
        assert!(!cache.track("users/1", "users/1"));
        assert_eq!(cache.reference_count("users/1"), Some(1));
        cache.release("users/1");
        assert_eq!(cache.reference_count("users/1"), Some(0));
    }

    #[test]
    fn linked_child_is_released_once_with_its_parent() {
        let mut cache = DocumentCache::new(16, true);
        cache.get_or_load("orders/1", load("orders/1")).unwrap();
        cache.get_or_load("companies/1", load("companies/1")).unwrap();
        cache.get_or_load("companies/1", load("companies/1")).unwrap();
        assert!(cache.link("orders/1", "companies/1"));
        assert_eq!(cache.reference_count("companies/1"), Some(2));

        cache.release("orders/1");
        assert_eq!(cache.reference_count("companies/1"), Some(1));
        assert!(!cache.link("orders/1", "missing/1"));
    }

    #[test]
    fn fresh_load_survives_a_full_cache() {
        let mut cache = DocumentCache::new(1, true);
        cache.get_or_load("users/1", load("users/1")).unwrap();
        let loaded = cache.get_or_load("users/2", load("users/2")).unwrap().unwrap();
        assert!(cache.contains("users/2"));
        assert_eq!(cache.reference_count("users/2"), Some(1));
        let again = cache
            .get_or_load("users/2", || -> Result<_, ()> { panic!("loaded twice") })
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&loaded, &again));

        // both released: the next insertion evicts back down to capacity
        cache.release("users/1");
        cache.release("users/2");
        cache.release("users/2");
        cache.insert("users/3", doc("users/3"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn slots_are_reused_after_eviction() {
        let mut cache = DocumentCache::new(1, true);
        cache.insert("a", doc("a"));
        cache.insert("b", doc("b"));
        cache.insert("c", doc("c"));
        assert_eq!(cache.slots.len(), 2);
        assert_eq!(cache.get("c").map(|d| d.data.clone()), Some(doc! { "Name": "c" }));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("c").is_none());
    }
}
