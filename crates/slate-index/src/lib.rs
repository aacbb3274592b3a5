mod columnar;
mod decode;
mod entry;
mod error;
mod postings;

pub use columnar::{ColumnValue, ColumnarEntry, ColumnarReader, FieldBindings, ListItem};
pub use decode::{decode_column, decode_posting};
pub use entry::{
    Backend, DOCUMENT_ID_FIELD, IndexEntry, REDUCE_KEY_HASH_FIELD, REDUCE_KEY_VALUE_FIELD,
    SOURCE_DOCUMENT_ID_FIELD, VALUE_FIELD,
};
pub use error::IndexError;
pub use postings::{
    CONVERT_TO_JSON_SUFFIX, EMPTY_STRING, FieldType, IS_ARRAY_SUFFIX, NULL_VALUE,
    PostingField, PostingValue, PostingsDocument, PostingsReader, RANGE_DOUBLE_SUFFIX,
    RANGE_LONG_SUFFIX,
};
