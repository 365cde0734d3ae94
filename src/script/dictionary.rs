//! Per-run variable frame.

use indexmap::{map, IndexMap};

use crate::identifier::{self, InvalidIdentifier};
use crate::runner::ds::value::Value;

/// Mapping from identifier to nullable value. A stored null is distinct
/// from an absent key. Iteration follows first binding order; rebinding a
/// key keeps its place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    vars: IndexMap<String, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Bind `key`, returning the previous value.
    pub fn put(
        &mut self,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, InvalidIdentifier> {
        identifier::validate(key)?;
        Ok(self.vars.insert(key.to_string(), value.into()))
    }

    /// Keys written by the evaluator are identifiers by construction.
    pub(crate) fn set(&mut self, key: &str, value: Value) {
        match self.vars.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                self.vars.insert(key.to_string(), value);
            }
        }
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.vars.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.shift_remove(key)
    }

    pub fn for_each<F: FnMut(&str, &Value)>(&self, mut action: F) {
        for (k, v) in &self.vars {
            action(k, v);
        }
    }

    pub fn iter(&self) -> map::Iter<'_, String, Value> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
