//! `helix:list`
//!
//! Lists are values; every operation returns a new list.

use std::cmp::Ordering;

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::conversion::Kind;
use crate::runner::ds::value::Value;
use crate::runner::plugin::binding::{BindingTarget, Param};
use crate::runner::plugin::namespace::Namespace;

fn items(name: &str) -> BindingTarget {
    BindingTarget::new(name).param(Param::new("items", Kind::list(Kind::Any)).not_null())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn order(a: &Value, b: &Value) -> Result<Ordering, ScriptError> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(y)),
        (Value::Duration(x), Value::Duration(y)) => Some(x.cmp(y)),
        _ => match (number(a), number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    ordering.ok_or_else(|| {
        ScriptError::new(format!("cannot order {} and {}", a.describe(), b.describe()))
    })
}

/// Sorted copy; every adjacent pair must be comparable.
pub fn sorted(mut values: Vec<Value>) -> Result<Vec<Value>, ScriptError> {
    for pair in values.windows(2) {
        order(&pair[0], &pair[1])?;
    }
    values.sort_by(|a, b| order(a, b).unwrap_or(Ordering::Equal));
    Ok(values)
}

pub fn register(ns: &Namespace) -> Result<(), RegistrationError> {
    ns.method(items("contains").param(Param::new("value", Kind::Any)), |args| {
        let values: Vec<Value> = args.get(0)?;
        Ok(values.contains(args.value(1)))
    })?
    .method(items("append").param(Param::new("value", Kind::Any)), |args| {
        let mut values: Vec<Value> = args.get(0)?;
        values.push(args.value(1).clone());
        Ok(values)
    })?
    .method(items("reverse"), |args| {
        let mut values: Vec<Value> = args.get(0)?;
        values.reverse();
        Ok(values)
    })?
    .method(items("sort"), |args| sorted(args.get(0)?))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_numbers_and_strings() {
        let values = vec![Value::Int(3), Value::Float(1.5), Value::Int(2)];
        assert_eq!(
            sorted(values).unwrap(),
            vec![Value::Float(1.5), Value::Int(2), Value::Int(3)]
        );
        let names = vec![Value::str("b"), Value::str("a")];
        assert_eq!(sorted(names).unwrap(), vec![Value::str("a"), Value::str("b")]);
    }

    #[test]
    fn rejects_mixed_kinds() {
        assert!(sorted(vec![Value::Int(1), Value::str("a")]).is_err());
    }
}
