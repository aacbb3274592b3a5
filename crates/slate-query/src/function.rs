use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Script,
    TimeSeries,
}

/// A helper function declared in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFunction {
    pub name: String,
    pub text: String,
    pub kind: FunctionKind,
}

impl DeclaredFunction {
    pub fn script(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: FunctionKind::Script,
        }
    }

    pub fn time_series(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: FunctionKind::TimeSeries,
        }
    }
}
