use bson::{Bson, Document};

pub const METADATA_KEY: &str = "@metadata";
pub const METADATA_ID: &str = "@id";
pub const ID_PROPERTY: &str = "Id";
pub const PROJECTION_FLAG: &str = "@projection";

/// Time-series rows streamed alongside a result instead of being
/// materialized into its body.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesStream {
    pub key: String,
    pub rows: Vec<Document>,
}

/// A stored document as read from storage, or a projection of one.
///
/// The body is never edited in place; [`clone_with`](Self::clone_with)
/// produces a new instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedDocument {
    pub id: Option<String>,
    pub lower_id: Option<String>,
    pub data: Document,
    /// Out-of-band metadata supplied by storage.
    pub metadata: Document,
    pub change_vector: Option<String>,
    pub score: Option<f32>,
    pub distance: Option<f64>,
    pub time_series_stream: Option<TimeSeriesStream>,
}

impl RetrievedDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        let id = id.into();
        Self {
            lower_id: Some(id.to_lowercase()),
            id: Some(id),
            data,
            ..Self::default()
        }
    }

    /// Placeholder for rows whose every field came from the index.
    pub(crate) fn from_index(lower_id: &str) -> Self {
        Self {
            id: Some(lower_id.to_string()),
            lower_id: Some(lower_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_change_vector(mut self, change_vector: impl Into<String>) -> Self {
        self.change_vector = Some(change_vector.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Document) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same identity and metadata, new body.
    pub fn clone_with(&self, data: Document) -> Self {
        Self {
            id: self.id.clone(),
            lower_id: self.lower_id.clone(),
            data,
            metadata: self.metadata.clone(),
            change_vector: self.change_vector.clone(),
            score: self.score,
            distance: self.distance,
            time_series_stream: self.time_series_stream.clone(),
        }
    }

    /// The id from, in order: the document itself, the body's `Id`
    /// property, the body's `@metadata` (`@id`, then `Id`), storage metadata.
    pub fn resolve_id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }
        if let Ok(id) = self.data.get_str(ID_PROPERTY) {
            return Some(id.to_string());
        }
        if let Ok(md) = self.data.get_document(METADATA_KEY) {
            if let Ok(id) = md.get_str(METADATA_ID).or_else(|_| md.get_str(ID_PROPERTY)) {
                return Some(id.to_string());
            }
        }
        self.metadata.get_str(METADATA_ID).ok().map(str::to_string)
    }

    /// Body to embed inside another result, with `@metadata.@id` present.
    pub fn embedded_data(&self) -> Document {
        let mut data = self.data.clone();
        if let Some(id) = &self.id {
            ensure_metadata_id(&mut data, id);
        }
        data
    }

    pub fn is_projection(&self) -> bool {
        self.data
            .get_document(METADATA_KEY)
            .and_then(|md| md.get_bool(PROJECTION_FLAG))
            .unwrap_or(false)
    }
}

// ── Metadata helpers ────────────────────────────────────────────

/// Apply `f` to the body's `@metadata`, creating it when absent.
pub(crate) fn update_metadata(data: &mut Document, f: impl FnOnce(&mut Document)) {
    if let Some(Bson::Document(md)) = data.get_mut(METADATA_KEY) {
        f(md);
        return;
    }
    let mut md = Document::new();
    f(&mut md);
    data.insert(METADATA_KEY, md);
}

pub(crate) fn mark_projection(data: &mut Document) {
    update_metadata(data, |md| {
        md.insert(PROJECTION_FLAG, true);
    });
}

pub(crate) fn merge_metadata(data: &mut Document, extra: Document) {
    update_metadata(data, |md| {
        for (k, v) in extra {
            md.insert(k, v);
        }
    });
}

fn ensure_metadata_id(data: &mut Document, id: &str) {
    update_metadata(data, |md| {
        if !md.contains_key(METADATA_ID) {
            md.insert(METADATA_ID, id);
        }
    });
}

// ── Results ─────────────────────────────────────────────────────

/// Output of one row: a single document, or a fan-out of several.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionResult {
    Single(RetrievedDocument),
    Many(Vec<RetrievedDocument>),
}

impl ProjectionResult {
    pub fn documents(&self) -> &[RetrievedDocument] {
        match self {
            Self::Single(doc) => std::slice::from_ref(doc),
            Self::Many(docs) => docs,
        }
    }

    pub fn into_documents(self) -> Vec<RetrievedDocument> {
        match self {
            Self::Single(doc) => vec![doc],
            Self::Many(docs) => docs,
        }
    }

    pub fn single(self) -> Option<RetrievedDocument> {
        match self {
            Self::Single(doc) => Some(doc),
            Self::Many(_) => None,
        }
    }
}
