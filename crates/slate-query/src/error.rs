use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    DuplicateKey(String),
    EmptyComposite(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::DuplicateKey(key) => write!(f, "duplicate projection key: {key}"),
            PlanError::EmptyComposite(name) => {
                write!(f, "composite field '{name}' has no components")
            }
        }
    }
}

impl std::error::Error for PlanError {}
