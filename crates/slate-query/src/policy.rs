use serde::{Deserialize, Serialize};

/// How strictly a projection must be satisfied from a single source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionBehavior {
    /// Prefer the index, fall back to the stored document.
    #[default]
    Default,
    FromIndex,
    FromIndexOrThrow,
    FromDocument,
    FromDocumentOrThrow,
}

impl ProjectionBehavior {
    pub fn must_extract_from_index(self) -> bool {
        matches!(self, Self::FromIndex | Self::FromIndexOrThrow)
    }

    pub fn must_extract_from_document(self) -> bool {
        matches!(self, Self::FromDocument | Self::FromDocumentOrThrow)
    }

    pub fn must_extract_or_throw(self) -> bool {
        matches!(self, Self::FromIndexOrThrow | Self::FromDocumentOrThrow)
    }
}
