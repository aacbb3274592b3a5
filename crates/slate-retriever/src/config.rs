use serde::{Deserialize, Serialize};

/// Capacity of the loaded-documents cache when none is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Maximum number of unreferenced documents kept per execution.
    pub cache_capacity: usize,
    /// Reference-count cached documents and record which projections embed
    /// them. Off selects the plain LRU cache.
    pub track_references: bool,
    /// Read paths through arrays element-wise, as map-reduce outputs need.
    pub reduce_results: bool,
    pub collect_timings: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            track_references: true,
            reduce_results: false,
            collect_timings: false,
        }
    }
}
