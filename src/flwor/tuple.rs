//! Tuples and grouping keys

use indexmap::IndexMap;

use crate::context::{Bindings, Value};
use crate::item::Item;

/// One row of the clause pipeline: variable name to value, in binding order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlworTuple {
    variables: IndexMap<String, Value>,
}

impl FlworTuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this tuple with `name` bound to `value`
    pub fn with(&self, name: &str, value: Value) -> Self {
        let mut extended = self.clone();
        extended.insert(name, value);
        extended
    }

    /// Binds `name`; an existing binding keeps its place
    pub fn insert(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn to_bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        for (name, value) in &self.variables {
            bindings.bind(name.clone(), value.clone());
        }
        bindings
    }
}

/// Grouping key of one tuple; `None` components are empty sequences
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlworKey(pub Vec<Option<Item>>);

impl FlworKey {
    pub fn components(&self) -> &[Option<Item>] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_insert_keeps_binding_order() {
        let mut tuple = FlworTuple::new();
        tuple.insert("b", Value::single(Item::Integer(1)));
        tuple.insert("a", Value::single(Item::Integer(2)));
        tuple.insert("b", Value::single(Item::Integer(3)));

        assert_eq!(tuple.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(tuple.get("b"), Some(&Value::single(Item::Integer(3))));
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let tuple = FlworTuple::new().with("x", Value::empty());
        let extended = tuple.with("y", Value::empty());
        assert_eq!(tuple.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn test_empty_components_are_equal() {
        let mut keys = HashSet::new();
        keys.insert(FlworKey(vec![None, Some(Item::Integer(1))]));
        keys.insert(FlworKey(vec![None, Some(Item::Decimal(bigdecimal::BigDecimal::from(1)))]));
        assert_eq!(keys.len(), 1);
    }
}
