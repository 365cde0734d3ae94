//! `helix:math`

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::conversion::Kind;
use crate::runner::ds::value::Value;
use crate::runner::plugin::binding::{BindingTarget, Param};
use crate::runner::plugin::namespace::Namespace;

fn number(value: &Value) -> Result<f64, ScriptError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(ScriptError::new(format!(
            "expected a number, found {}",
            other.describe()
        ))),
    }
}

fn abs(value: &Value) -> Result<Value, ScriptError> {
    match value {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::new("integer overflow")),
        other => Ok(Value::Float(number(other)?.abs())),
    }
}

/// Ints stay ints; a float on either side widens the result.
fn pick(a: &Value, b: &Value, prefer_left: fn(f64, f64) -> bool) -> Result<Value, ScriptError> {
    let (x, y) = (number(a)?, number(b)?);
    match (a, b) {
        (Value::Int(_), Value::Int(_)) => Ok(if prefer_left(x, y) { a.clone() } else { b.clone() }),
        _ => Ok(Value::Float(if prefer_left(x, y) { x } else { y })),
    }
}

fn to_int(x: f64) -> Result<i64, ScriptError> {
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(x as i64)
    } else {
        Err(ScriptError::new(format!("{:?} does not fit in an int", x)))
    }
}

fn unary(name: &str) -> BindingTarget {
    BindingTarget::new(name).param(Param::new("value", Kind::Float).not_null())
}

fn binary(name: &str, a: &str, b: &str) -> BindingTarget {
    BindingTarget::new(name)
        .param(Param::new(a, Kind::Any).not_null())
        .param(Param::new(b, Kind::Any).not_null())
}

pub fn register(math: &Namespace) -> Result<(), RegistrationError> {
    math.field("PI", std::f64::consts::PI)?
        .field("E", std::f64::consts::E)?
        .method(
            BindingTarget::new("abs").param(Param::new("value", Kind::Any).not_null()),
            |args| abs(args.value(0)),
        )?
        .method(binary("min", "a", "b"), |args| {
            pick(args.value(0), args.value(1), |x, y| x <= y)
        })?
        .method(binary("max", "a", "b"), |args| {
            pick(args.value(0), args.value(1), |x, y| x >= y)
        })?
        .method(unary("floor"), |args| to_int(args.get::<f64>(0)?.floor()))?
        .method(unary("ceil"), |args| to_int(args.get::<f64>(0)?.ceil()))?
        .method(unary("round"), |args| to_int(args.get::<f64>(0)?.round()))?
        .method(unary("sqrt"), |args| Ok(args.get::<f64>(0)?.sqrt()))?
        .method(
            BindingTarget::new("pow")
                .param(Param::new("base", Kind::Float).not_null())
                .param(Param::new("exponent", Kind::Float).not_null()),
            |args| Ok(args.get::<f64>(0)?.powf(args.get::<f64>(1)?)),
        )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_keeps_ints() {
        assert_eq!(abs(&Value::Int(-3)).unwrap(), Value::Int(3));
        assert_eq!(abs(&Value::Float(-1.5)).unwrap(), Value::Float(1.5));
        assert!(abs(&Value::Int(i64::MIN)).is_err());
    }

    #[test]
    fn min_widens_mixed_operands() {
        let min = pick(&Value::Int(2), &Value::Int(5), |x, y| x <= y).unwrap();
        assert!(matches!(min, Value::Int(2)));
        let min = pick(&Value::Int(2), &Value::Float(1.5), |x, y| x <= y).unwrap();
        assert!(matches!(min, Value::Float(f) if f == 1.5));
    }
}
