mod cache;
mod config;
mod document;
mod error;
mod includes;
mod input;
mod retriever;
mod timings;
mod traits;
mod traverse;

pub use bson::{Bson, Document};
pub use cache::DocumentCache;
pub use config::{DEFAULT_CACHE_CAPACITY, RetrieverConfig};
pub use document::{
    ID_PROPERTY, METADATA_ID, METADATA_KEY, PROJECTION_FLAG, ProjectionResult, RetrievedDocument,
    TimeSeriesStream,
};
pub use error::{RetrieverError, StorageError};
pub use includes::Includes;
pub use input::RetrieverInput;
pub use retriever::Retriever;
pub use slate_vm::CancellationToken;
pub use timings::{QueryTimings, TimingScope};
pub use traits::{CounterLookup, DocumentLoader};
pub use traverse::Traverser;
