//! Lexical binding scopes.
//!
//! Bindings merge move parameters with names introduced by `let`, `forEach`,
//! aggregates and event dispatch. Scopes form a stack: lookups search from
//! the innermost entry outwards, so inner bindings shadow outer ones.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::core::{MoveParam, Value};

/// A scope stack of named values.
///
/// SmallVec keeps the common case (a handful of params plus a loop variable)
/// off the heap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    entries: SmallVec<[(String, Value); 8]>,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings holding the given move parameters.
    #[must_use]
    pub fn from_params(params: &BTreeMap<String, MoveParam>) -> Self {
        let mut bindings = Self::new();
        for (name, value) in params {
            bindings.push(name.clone(), Value::from(value.clone()));
        }
        bindings
    }

    /// Look up a name, innermost first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind a name in the innermost scope.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }

    /// Current depth, for restoring with `truncate`.
    #[must_use]
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Drop every binding pushed since `mark`.
    pub fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    /// A copy with one more binding.
    #[must_use]
    pub fn with(&self, name: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.push(name, value);
        next
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scalar;

    #[test]
    fn test_shadowing() {
        let mut bindings = Bindings::new();
        bindings.push("$x", Value::int(1));
        let mark = bindings.mark();
        bindings.push("$x", Value::int(2));
        assert_eq!(bindings.get("$x"), Some(&Value::int(2)));

        bindings.truncate(mark);
        assert_eq!(bindings.get("$x"), Some(&Value::int(1)));
        assert!(bindings.get("$y").is_none());
    }

    #[test]
    fn test_from_params() {
        let mut params = BTreeMap::new();
        params.insert("space".to_string(), MoveParam::Scalar(Scalar::str("a:none")));
        params.insert("$n".to_string(), MoveParam::Array(vec![Scalar::Int(1)]));
        let bindings = Bindings::from_params(&params);

        assert_eq!(bindings.get("space"), Some(&Value::str("a:none")));
        assert_eq!(bindings.get("$n"), Some(&Value::Array(vec![Scalar::Int(1)])));
        assert_eq!(bindings.len(), 2);
    }
}
