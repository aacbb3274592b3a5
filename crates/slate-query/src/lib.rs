mod error;
mod fields;
mod function;
mod policy;
mod query;

pub use error::PlanError;
pub use fields::{FieldSlot, FieldToFetch, FieldsToFetch, IndexFieldDef, QueryField, QueryFieldKind, ValueTokenType};
pub use function::{DeclaredFunction, FunctionKind};
pub use policy::ProjectionBehavior;
pub use query::{DocumentFields, IndexQuery, TIME_SERIES_QUERY_FUNCTION};
