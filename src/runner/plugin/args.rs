use std::any::Any;

use crate::error::ScriptError;
use crate::runner::ds::class::Class;
use crate::runner::ds::conversion::{enum_from_value, FromValue};
use crate::runner::ds::value::{ScriptEnum, Value};

use super::binding::Signature;
use super::registry::Registry;

static NULL: Value = Value::Null;

/// Bound arguments of one call, in declaration order, after fallbacks and
/// parameter policies have been applied.
pub struct Args<'a> {
    signature: &'a Signature,
    values: Vec<Value>,
    registry: &'a Registry,
}

impl<'a> Args<'a> {
    pub(crate) fn new(signature: &'a Signature, values: Vec<Value>, registry: &'a Registry) -> Self {
        Args {
            signature,
            values,
            registry,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Raw value at `index`; null past the end.
    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    fn label(&self, index: usize) -> String {
        self.signature
            .params()
            .get(index)
            .map(|p| p.label().to_string())
            .unwrap_or_else(|| format!("arg{}", index))
    }

    fn index_of(&self, label: &str) -> Result<usize, ScriptError> {
        self.signature
            .params()
            .iter()
            .position(|p| p.label() == label)
            .ok_or_else(|| {
                ScriptError::new(format!(
                    "'{}' has no parameter named '{}'",
                    self.signature.name(),
                    label
                ))
            })
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, ScriptError> {
        T::from_value(self.value(index)).map_err(|e| {
            ScriptError::new(format!("argument '{}': {}", self.label(index), e))
        })
    }

    pub fn get_named<T: FromValue>(&self, label: &str) -> Result<T, ScriptError> {
        self.get(self.index_of(label)?)
    }

    /// Host object argument viewed as `T`, following declared ancestry.
    pub fn object<T: Any + Send + Sync>(&self, index: usize) -> Result<&T, ScriptError> {
        let target = Class::of::<T>();
        let mismatch = || {
            ScriptError::new(format!(
                "argument '{}': expected {}, found {}",
                self.label(index),
                target.simple_name(),
                self.value(index).describe()
            ))
        };
        let object = match self.value(index) {
            Value::Object(o) => o,
            _ => return Err(mismatch()),
        };
        let projection = self
            .registry
            .projection(object.class(), target)
            .ok_or_else(mismatch)?;
        projection
            .apply(object.as_any())
            .and_then(|v| v.downcast_ref::<T>())
            .ok_or_else(mismatch)
    }

    pub fn enumeration<E: ScriptEnum>(&self, index: usize) -> Result<E, ScriptError> {
        enum_from_value::<E>(self.value(index)).map_err(|e| {
            ScriptError::new(format!("argument '{}': {}", self.label(index), e))
        })
    }
}
