use std::collections::BTreeMap;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::function::{DeclaredFunction, FunctionKind};

/// Output keys produced by time-series projections start with this prefix.
pub const TIME_SERIES_QUERY_FUNCTION: &str = "__timeSeriesQueryFunction";

/// Which parts of a stored document a storage read must materialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFields {
    Id,
    Data,
    #[default]
    All,
}

/// Query-level inputs the retriever needs beyond the field plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexQuery {
    pub parameters: Option<Document>,
    pub declared_functions: BTreeMap<String, DeclaredFunction>,
    pub is_stream: bool,
    pub document_fields: DocumentFields,
}

impl IndexQuery {
    pub fn with_parameters(mut self, parameters: Document) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn declare(mut self, function: DeclaredFunction) -> Self {
        self.declared_functions
            .insert(function.name.clone(), function);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Bson> {
        self.parameters.as_ref()?.get(name)
    }

    /// The declared time-series function with this name, if any.
    pub fn time_series_function(&self, name: &str) -> Option<&DeclaredFunction> {
        self.declared_functions
            .get(name)
            .filter(|f| f.kind == FunctionKind::TimeSeries)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn parameter_lookup() {
        let query = IndexQuery::default().with_parameters(doc! { "id": "users/1" });
        assert_eq!(query.parameter("id"), Some(&Bson::String("users/1".into())));
        assert_eq!(query.parameter("missing"), None);
        assert_eq!(IndexQuery::default().parameter("id"), None);
    }

    #[test]
    fn time_series_lookup_ignores_scripts() {
        let query = IndexQuery::default()
            .declare(DeclaredFunction::script("output", "function output(d) return d end"))
            .declare(DeclaredFunction::time_series("ts", "from Heartrate"));
        assert!(query.time_series_function("output").is_none());
        assert_eq!(query.time_series_function("ts").map(|f| f.name.as_str()), Some("ts"));
        assert!(query.time_series_function("nope").is_none());
    }
}
