use slate_index::{ColumnarReader, FieldBindings, IndexEntry, PostingsReader};

/// One matched row as handed over by the query executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieverInput<'e> {
    pub entry: Option<IndexEntry<'e>>,
    pub score: Option<f32>,
    pub distance: Option<f64>,
}

impl<'e> RetrieverInput<'e> {
    pub fn postings(reader: &'e dyn PostingsReader) -> Self {
        Self {
            entry: Some(IndexEntry::Postings(reader)),
            ..Self::default()
        }
    }

    pub fn columnar(reader: &'e dyn ColumnarReader, known_fields: &'e FieldBindings) -> Self {
        Self {
            entry: Some(IndexEntry::Columnar {
                reader,
                known_fields,
            }),
            ..Self::default()
        }
    }

    /// A row that did not come from an index (collection scans).
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }
}
