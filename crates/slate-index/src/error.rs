use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Binary postings cannot be projected.
    BinaryValue(String),
    InvalidUtf8(String),
    /// A tuple list carried an empty-string element.
    EmptyTupleItem(String),
    MalformedJson(String),
    MalformedRaw(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinaryValue(field) => write!(f, "cannot convert binary values (field '{field}')"),
            Self::InvalidUtf8(msg) => write!(f, "invalid utf-8 in index entry: {msg}"),
            Self::EmptyTupleItem(field) => {
                write!(f, "tuple list in field '{field}' cannot contain an empty string")
            }
            Self::MalformedJson(msg) => write!(f, "malformed json posting: {msg}"),
            Self::MalformedRaw(msg) => write!(f, "malformed raw index value: {msg}"),
        }
    }
}

impl std::error::Error for IndexError {}
