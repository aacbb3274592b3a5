use bson::Document;
use slate_query::DocumentFields;
use slate_vm::CancellationToken;

use crate::document::RetrievedDocument;
use crate::error::StorageError;

/// Storage read capability.
pub trait DocumentLoader {
    /// `Ok(None)` when no document with `lower_id` exists.
    fn get(
        &self,
        lower_id: &str,
        fields: DocumentFields,
        token: &CancellationToken,
    ) -> Result<Option<RetrievedDocument>, StorageError>;
}

/// Counter values attached to documents.
pub trait CounterLookup {
    fn get_value(&self, document_id: &str, name: &str) -> Result<Option<i64>, StorageError>;

    /// Per-node values instead of the total.
    fn get_raw(&self, document_id: &str, name: &str) -> Result<Option<Document>, StorageError>;
}

impl<T: DocumentLoader + ?Sized> DocumentLoader for &T {
    fn get(
        &self,
        lower_id: &str,
        fields: DocumentFields,
        token: &CancellationToken,
    ) -> Result<Option<RetrievedDocument>, StorageError> {
        (**self).get(lower_id, fields, token)
    }
}

impl<T: CounterLookup + ?Sized> CounterLookup for &T {
    fn get_value(&self, document_id: &str, name: &str) -> Result<Option<i64>, StorageError> {
        (**self).get_value(document_id, name)
    }

    fn get_raw(&self, document_id: &str, name: &str) -> Result<Option<Document>, StorageError> {
        (**self).get_raw(document_id, name)
    }
}
