use std::hash::{Hash, Hasher};

use slate_query::{DeclaredFunction, FunctionKind};

/// Identity of a compiled script: the set of declared helper functions.
///
/// Equality and hashing look only at function text. Two queries that declare
/// identical bodies under different names share one compiled instance.
#[derive(Debug, Clone)]
pub struct ScriptKey {
    functions: Vec<DeclaredFunction>,
}

impl ScriptKey {
    pub fn new<'a, I>(functions: I) -> Self
    where
        I: IntoIterator<Item = &'a DeclaredFunction>,
    {
        let mut functions: Vec<DeclaredFunction> = functions.into_iter().cloned().collect();
        functions.sort_by(|a, b| a.text.cmp(&b.text));
        Self { functions }
    }

    pub fn functions(&self) -> &[DeclaredFunction] {
        &self.functions
    }

    /// Script bodies to compile, in key order. Time-series declarations are
    /// part of the identity but are not scripts.
    pub fn scripts(&self) -> impl Iterator<Item = &str> {
        self.functions
            .iter()
            .filter(|f| f.kind == FunctionKind::Script)
            .map(|f| f.text.as_str())
    }
}

impl PartialEq for ScriptKey {
    fn eq(&self, other: &Self) -> bool {
        self.functions.len() == other.functions.len()
            && self
                .functions
                .iter()
                .zip(&other.functions)
                .all(|(a, b)| a.text == b.text)
    }
}

impl Eq for ScriptKey {}

impl Hash for ScriptKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.functions.len().hash(state);
        for f in &self.functions {
            f.text.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_do_not_participate() {
        let a = [DeclaredFunction::script("first", "function f() return 1 end")];
        let b = [DeclaredFunction::script("second", "function f() return 1 end")];
        let mut set = HashSet::new();
        set.insert(ScriptKey::new(&a));
        assert!(set.contains(&ScriptKey::new(&b)));
    }

    #[test]
    fn declaration_order_is_irrelevant() {
        let x = DeclaredFunction::script("x", "function x() return 1 end");
        let y = DeclaredFunction::script("y", "function y() return 2 end");
        assert_eq!(ScriptKey::new([&x, &y]), ScriptKey::new([&y, &x]));
        assert_ne!(ScriptKey::new([&x]), ScriptKey::new([&x, &y]));
    }

    #[test]
    fn scripts_skip_time_series() {
        let key = ScriptKey::new(&[
            DeclaredFunction::script("s", "function s() end"),
            DeclaredFunction::time_series("ts", "from Heartrate"),
        ]);
        assert_eq!(key.scripts().collect::<Vec<_>>(), vec!["function s() end"]);
        assert_eq!(key.functions().len(), 2);
    }
}
