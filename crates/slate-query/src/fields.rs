use std::collections::{BTreeMap, HashSet};

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::policy::ProjectionBehavior;

/// Stable position of a field inside a plan, nested function arguments
/// included. Executors index per-execution state by slot so the plan itself
/// never has to be mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSlot(pub usize);

/// Lexical type of a literal projected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTokenType {
    String,
    Long,
    Double,
    True,
    False,
    Null,
    Parameter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryFieldKind {
    /// Plain document path, optionally reached through a `load`.
    Field,
    /// Call to a declared script or time-series function.
    Function { name: String },
    /// Counter value. `raw` returns per-node values instead of the total.
    Counter { name: String, raw: bool },
    /// Literal value, or a query parameter reference when `token` says so.
    Literal { value: Bson, token: ValueTokenType },
}

/// The parsed select-clause expression behind a [`FieldToFetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    pub kind: QueryFieldKind,
    pub alias: Option<String>,
    /// Where the ids of the documents to load come from. `None` together
    /// with `has_source_alias` means the root document itself.
    pub source_alias: Option<String>,
    pub has_source_alias: bool,
    /// Alias bound by an earlier `load` whose document holds the ids.
    pub load_from_alias: Option<String>,
    /// `source_alias` is a literal document id.
    pub is_quoted: bool,
    /// `source_alias` (or the counter name) is a query parameter name.
    pub is_parameter: bool,
    /// Declared as an array source (`load x[]`).
    pub source_is_array: bool,
}

impl QueryField {
    pub fn new(kind: QueryFieldKind) -> Self {
        Self {
            kind,
            alias: None,
            source_alias: None,
            has_source_alias: false,
            load_from_alias: None,
            is_quoted: false,
            is_parameter: false,
            source_is_array: false,
        }
    }

    pub fn field() -> Self {
        Self::new(QueryFieldKind::Field)
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(QueryFieldKind::Function { name: name.into() })
    }

    pub fn counter(name: impl Into<String>, raw: bool) -> Self {
        Self::new(QueryFieldKind::Counter {
            name: name.into(),
            raw,
        })
    }

    pub fn literal(value: impl Into<Bson>, token: ValueTokenType) -> Self {
        Self::new(QueryFieldKind::Literal {
            value: value.into(),
            token,
        })
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn source(mut self, source_alias: impl Into<String>) -> Self {
        self.source_alias = Some(source_alias.into());
        self.has_source_alias = true;
        self
    }

    /// Source is the root document of the row.
    pub fn root_source(mut self) -> Self {
        self.source_alias = None;
        self.has_source_alias = true;
        self
    }

    pub fn load_from(mut self, alias: impl Into<String>) -> Self {
        self.load_from_alias = Some(alias.into());
        self
    }

    pub fn quoted(mut self) -> Self {
        self.is_quoted = true;
        self
    }

    pub fn parameter(mut self) -> Self {
        self.is_parameter = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.source_is_array = true;
        self
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, QueryFieldKind::Function { .. })
    }
}

/// One output field of a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldToFetch {
    pub name: String,
    pub projected_name: Option<String>,
    pub can_extract_from_index: bool,
    pub is_document_id: bool,
    /// Non-empty for composite fields: each component is read from the
    /// document and merged into one sub-object.
    pub components: Vec<String>,
    pub function_args: Vec<FieldToFetch>,
    pub query_field: Option<QueryField>,
    slot: FieldSlot,
}

impl FieldToFetch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            projected_name: None,
            can_extract_from_index: false,
            is_document_id: false,
            components: Vec::new(),
            function_args: Vec::new(),
            query_field: None,
            slot: FieldSlot::default(),
        }
    }

    pub fn projected(mut self, name: impl Into<String>) -> Self {
        self.projected_name = Some(name.into());
        self
    }

    pub fn from_index(mut self) -> Self {
        self.can_extract_from_index = true;
        self
    }

    pub fn document_id(mut self) -> Self {
        self.is_document_id = true;
        self
    }

    pub fn composite<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn query(mut self, query_field: QueryField) -> Self {
        self.query_field = Some(query_field);
        self
    }

    pub fn args(mut self, args: Vec<FieldToFetch>) -> Self {
        self.function_args = args;
        self
    }

    /// Key under which the value lands in the projection result.
    pub fn key(&self) -> &str {
        self.projected_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn is_function_call(&self) -> bool {
        self.query_field.as_ref().is_some_and(QueryField::is_function)
    }

    pub fn slot(&self) -> FieldSlot {
        self.slot
    }

    /// Array-sourced as declared by the plan. Executors may flip this per
    /// execution when a loaded value turns out to be an array.
    pub fn declared_array_source(&self) -> bool {
        self.query_field.as_ref().is_some_and(|q| q.source_is_array)
    }
}

/// Definition of a field stored in the index, used to re-read load sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFieldDef {
    pub name: String,
    /// Columnar field id. `None` for dynamic fields addressed by name.
    pub id: Option<u32>,
}

/// The resolved projection plan. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldsToFetch {
    fields: Vec<FieldToFetch>,
    pub index_fields: BTreeMap<String, IndexFieldDef>,
    pub behavior: ProjectionBehavior,
    extract_all_from_index: bool,
    slot_count: usize,
}

impl FieldsToFetch {
    pub fn new(
        mut fields: Vec<FieldToFetch>,
        behavior: ProjectionBehavior,
    ) -> Result<Self, PlanError> {
        let mut keys = HashSet::with_capacity(fields.len());
        for field in &fields {
            validate(field)?;
            if !keys.insert(field.key().to_string()) {
                return Err(PlanError::DuplicateKey(field.key().to_string()));
            }
        }

        let mut next = 0;
        for field in &mut fields {
            assign_slots(field, &mut next);
        }

        Ok(Self {
            fields,
            index_fields: BTreeMap::new(),
            behavior,
            extract_all_from_index: false,
            slot_count: next,
        })
    }

    /// Plan that returns the whole document unchanged.
    pub fn none() -> Self {
        Self {
            fields: Vec::new(),
            index_fields: BTreeMap::new(),
            behavior: ProjectionBehavior::Default,
            extract_all_from_index: false,
            slot_count: 0,
        }
    }

    /// Project every stored index field, plus any explicit fields.
    pub fn all_from_index(
        fields: Vec<FieldToFetch>,
        behavior: ProjectionBehavior,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::new(fields, behavior)?;
        plan.extract_all_from_index = true;
        Ok(plan)
    }

    pub fn with_index_fields<I>(mut self, defs: I) -> Self
    where
        I: IntoIterator<Item = IndexFieldDef>,
    {
        for def in defs {
            self.index_fields.insert(def.name.clone(), def);
        }
        self
    }

    pub fn fields(&self) -> &[FieldToFetch] {
        &self.fields
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn extract_all_from_index(&self) -> bool {
        self.extract_all_from_index
    }

    pub fn is_projection(&self) -> bool {
        self.extract_all_from_index || !self.fields.is_empty()
    }

    pub fn any_extractable_from_index(&self) -> bool {
        self.extract_all_from_index || self.fields.iter().any(|f| f.can_extract_from_index)
    }

    /// A lone function call or whole-body load without an alias: its value
    /// replaces the result document instead of being nested under a key.
    pub fn single_body_or_method_with_no_alias(&self) -> bool {
        let [field] = self.fields.as_slice() else {
            return false;
        };
        if field.projected_name.is_some() {
            return false;
        }
        match &field.query_field {
            Some(q) if q.is_function() => true,
            Some(q) => q.has_source_alias && field.name.is_empty() && q.alias.is_none(),
            None => false,
        }
    }

    /// Index-stored field names first, then plan fields whose keys are not
    /// already present. New fields get slots past the plan's own.
    pub fn merged_with_index_fields<I>(&self, names: I) -> Vec<FieldToFetch>
    where
        I: IntoIterator<Item = String>,
    {
        let mut merged: Vec<FieldToFetch> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = self.slot_count;
        for name in names {
            if !seen.insert(name.clone()) {
                continue;
            }
            let mut field = FieldToFetch::new(name).from_index();
            field.slot = FieldSlot(next);
            next += 1;
            merged.push(field);
        }
        for field in &self.fields {
            if seen.contains(field.key()) {
                continue;
            }
            merged.push(field.clone());
        }
        merged
    }
}

fn validate(field: &FieldToFetch) -> Result<(), PlanError> {
    if field.components.iter().any(String::is_empty) {
        return Err(PlanError::EmptyComposite(field.name.clone()));
    }
    for arg in &field.function_args {
        validate(arg)?;
    }
    Ok(())
}

fn assign_slots(field: &mut FieldToFetch, next: &mut usize) {
    field.slot = FieldSlot(*next);
    *next += 1;
    for arg in &mut field.function_args {
        assign_slots(arg, next);
    }
}
