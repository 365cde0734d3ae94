//! Root functions of the built-in module.

use tracing::info;

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::conversion::Kind;
use crate::runner::ds::value::Value;
use crate::runner::plugin::binding::{BindingTarget, Param};
use crate::runner::plugin::namespace::Namespace;

/// Number of elements of a list or map, or characters of a string.
pub fn length(value: &Value) -> Result<i64, ScriptError> {
    let len = match value {
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Str(s) => s.chars().count(),
        other => {
            return Err(ScriptError::new(format!(
                "{} has no length",
                other.describe()
            )))
        }
    };
    Ok(i64::try_from(len).unwrap_or(i64::MAX))
}

pub fn to_int(value: &Value) -> Result<i64, ScriptError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) if f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Ok(f.trunc() as i64)
        }
        Value::Float(f) => Err(ScriptError::new(format!("{:?} does not fit in an int", f))),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Char(c) => Ok(i64::from(u32::from(*c))),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ScriptError::new(format!("\"{}\" is not an int", s))),
        other => Err(ScriptError::new(format!(
            "cannot convert {} to int",
            other.describe()
        ))),
    }
}

pub fn to_float(value: &Value) -> Result<f64, ScriptError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScriptError::new(format!("\"{}\" is not a float", s))),
        other => Err(ScriptError::new(format!(
            "cannot convert {} to float",
            other.describe()
        ))),
    }
}

fn range(start: i64, end: i64) -> Value {
    (start..end.max(start)).map(Value::Int).collect::<Vec<_>>().into()
}

pub fn register(root: &Namespace) -> Result<(), RegistrationError> {
    root.method(
        BindingTarget::new("log")
            .param(Param::new("value", Kind::Any))
            .returns(Kind::Void),
        |args| {
            info!(target: "helix::script", "{}", args.value(0));
            Ok(())
        },
    )?
    .method(
        BindingTarget::new("len").param(Param::new("value", Kind::Any).not_null()),
        |args| length(args.value(0)),
    )?
    .method(
        BindingTarget::new("str").param(Param::new("value", Kind::Any)),
        |args| Ok(args.value(0).to_string()),
    )?
    .method(
        BindingTarget::new("int").param(Param::new("value", Kind::Any).not_null()),
        |args| to_int(args.value(0)),
    )?
    .method(
        BindingTarget::new("float").param(Param::new("value", Kind::Any).not_null()),
        |args| to_float(args.value(0)),
    )?
    .method(
        BindingTarget::new("range")
            .param(Param::new("start", Kind::Int).not_null())
            .param(Param::new("end", Kind::Int).not_null()),
        |args| Ok(range(args.get(0)?, args.get(1)?)),
    )?
    .method(
        BindingTarget::new("type_of").param(Param::new("value", Kind::Any)),
        |args| Ok(args.value(0).describe()),
    )?;
    Ok(())
}
