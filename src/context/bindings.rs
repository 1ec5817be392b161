//! Binding maps split by representation
//!
//! A name lives in at most one of the three maps. Binding a name removes it
//! from the other two, so a later binding always shadows an earlier one.

use std::collections::HashMap;

use super::value::Value;
use crate::cluster::{Collection, DataFrame};
use crate::item::{Item, Sequence};

/// Variable bindings of one frame or one closure
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    local: HashMap<String, Sequence>,
    rows: HashMap<String, Collection<Item>>,
    columns: HashMap<String, DataFrame>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.local.remove(&name);
        self.rows.remove(&name);
        self.columns.remove(&name);
        match value {
            Value::Local(items) => {
                self.local.insert(name, items);
            }
            Value::Rows(rows) => {
                self.rows.insert(name, rows);
            }
            Value::Columns(frame) => {
                self.columns.insert(name, frame);
            }
        }
    }

    /// Builder form of [`Bindings::bind`]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bind(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(items) = self.local.get(name) {
            return Some(Value::Local(items.clone()));
        }
        if let Some(rows) = self.rows.get(name) {
            return Some(Value::Rows(rows.clone()));
        }
        self.columns.get(name).map(|frame| Value::Columns(frame.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.local.contains_key(name)
            || self.rows.contains_key(name)
            || self.columns.contains_key(name)
    }

    /// Copies every binding of `other` over this one
    pub fn merge(&mut self, other: &Bindings) {
        for (name, items) in &other.local {
            self.bind(name.clone(), Value::Local(items.clone()));
        }
        for (name, rows) in &other.rows {
            self.bind(name.clone(), Value::Rows(rows.clone()));
        }
        for (name, frame) in &other.columns {
            self.bind(name.clone(), Value::Columns(frame.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.local.len() + self.rows.len() + self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bound names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .local
            .keys()
            .chain(self.rows.keys())
            .chain(self.columns.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExecutionMode;

    #[test]
    fn test_rebinding_moves_between_maps() {
        let mut bindings = Bindings::new();
        bindings.bind("x", Value::Local(vec![Item::Integer(1)]));
        bindings.bind("x", Value::Rows(Collection::parallelize(vec![Item::Integer(2)], 1)));

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("x").unwrap().mode(), ExecutionMode::ParallelRowWise);
    }

    #[test]
    fn test_merge_overrides() {
        let base = Bindings::new()
            .with("a", Value::single(Item::Integer(1)))
            .with("b", Value::single(Item::Integer(2)));
        let mut merged = base.clone();
        merged.merge(&Bindings::new().with("b", Value::single(Item::Integer(3))));

        assert_eq!(merged.get("b"), Some(Value::single(Item::Integer(3))));
        assert_eq!(base.get("b"), Some(Value::single(Item::Integer(2))));
        assert_eq!(merged.names(), vec!["a", "b"]);
    }
}
