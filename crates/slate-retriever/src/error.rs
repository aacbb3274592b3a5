use slate_index::IndexError;
use slate_vm::VmError;

/// Failure reported by a [`DocumentLoader`](crate::DocumentLoader) or
/// [`CounterLookup`](crate::CounterLookup). Opaque to the retriever.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub String);

impl StorageError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error(
        "could not extract field '{field}' from index, because index does not contain such a field or the field value is not stored"
    )]
    NotExtractable { field: String },

    #[error("could not extract projection from document '{id}', because it does not exist")]
    DocumentMissing { id: String },

    #[error("could not extract field '{field}' from document '{id}', because the document does not contain such a field")]
    FieldMissing { id: String, field: String },

    #[error("unsupported index value: {0}")]
    Unsupported(#[from] IndexError),

    #[error(
        "attempted to read multiple values in field {field}, but it isn't an array and should have only a single value, did you forget '[]'?"
    )]
    ShapeViolation { field: String },

    #[error("query returning a single function call result must return an object, but got: {0}")]
    FunctionContractViolation(String),

    #[error("the query is parametrized but the actual values of parameters were not provided")]
    MissingParameters,

    #[error("value of parameter '{0}' was not provided")]
    MissingParameter(String),

    #[error("field {0} not found in index")]
    IndexFieldNotFound(String),

    #[error("no collaborator can run function '{0}'")]
    FunctionUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("script error: {0}")]
    Script(VmError),

    #[error("query execution cancelled")]
    Cancelled,
}

impl From<VmError> for RetrieverError {
    fn from(e: VmError) -> Self {
        match e {
            VmError::Cancelled => Self::Cancelled,
            VmError::Unavailable(name) => Self::FunctionUnavailable(name),
            other => Self::Script(other),
        }
    }
}
