//! Expression evaluation.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::RunError;
use crate::parser::ast::{
    Argument, BinaryOperator, CallTarget, ExpressionType, LiteralData, LogicalOperator,
    UnaryOperator,
};
use crate::runner::ds::value::{HostObject, PatternMatch, Value};
use crate::runner::plugin::binding::Receiver;

use super::function::call_function;
use super::types::{script_error, EvalContext, ValueResult};

/// Evaluate an expression to a value.
pub fn evaluate_expression(expression: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match expression {
        ExpressionType::Literal { value, .. } => Ok(literal_value(value)),
        ExpressionType::List { elements, .. } => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(evaluate_expression(element, ctx)?);
            }
            Ok(Value::List(Arc::new(items)))
        }
        ExpressionType::Map { entries, .. } => {
            let mut map = IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key.clone(), evaluate_expression(value, ctx)?);
            }
            Ok(Value::Map(Arc::new(map)))
        }
        ExpressionType::Variable { name, .. } => match ctx.frame.get(name) {
            Some(value) => Ok(value.clone()),
            None => script_error(format!("variable '{}' is not defined", name)),
        },
        ExpressionType::StaticField { field, .. } => Ok(field.get(None)?),
        ExpressionType::Member { object, name, .. } => {
            let object = evaluate_expression(object, ctx)?;
            get_member(&object, name, ctx)
        }
        ExpressionType::Index { object, index, .. } => {
            let object = evaluate_expression(object, ctx)?;
            let index = evaluate_expression(index, ctx)?;
            get_index(&object, &index)
        }
        ExpressionType::Call {
            callee, arguments, ..
        } => evaluate_call(callee, arguments, ctx),
        ExpressionType::Unary {
            operator, argument, ..
        } => {
            let value = evaluate_expression(argument, ctx)?;
            apply_unary(*operator, value)
        }
        ExpressionType::Binary {
            operator,
            left,
            right,
            ..
        } => {
            let left = evaluate_expression(left, ctx)?;
            let right = evaluate_expression(right, ctx)?;
            apply_binary(*operator, left, right)
        }
        ExpressionType::Logical {
            operator,
            left,
            right,
            ..
        } => {
            let left = to_boolean(&evaluate_expression(left, ctx)?)?;
            match (operator, left) {
                (LogicalOperator::And, false) => Ok(Value::Bool(false)),
                (LogicalOperator::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(to_boolean(&evaluate_expression(right, ctx)?)?)),
            }
        }
    }
}

pub fn literal_value(literal: &LiteralData) -> Value {
    match literal {
        LiteralData::Null => Value::Null,
        LiteralData::Bool(b) => Value::Bool(*b),
        LiteralData::Int(i) => Value::Int(*i),
        LiteralData::Float(f) => Value::Float(*f),
        LiteralData::Char(c) => Value::Char(*c),
        LiteralData::Str(s) => Value::str(s),
        LiteralData::Duration(d) => Value::Duration(*d),
    }
}

/// Conditions must be booleans; there is no truthiness.
pub fn to_boolean(value: &Value) -> Result<bool, RunError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => script_error(format!("expected a bool, found {}", other.describe())),
    }
}

/// Evaluate call arguments into positional values and named pairs.
pub fn evaluate_arguments(
    arguments: &[Argument],
    ctx: &mut EvalContext,
) -> Result<(Vec<Value>, Vec<(String, Value)>), RunError> {
    let mut positional = vec![];
    let mut named = vec![];
    for argument in arguments {
        let value = evaluate_expression(&argument.value, ctx)?;
        match &argument.name {
            Some(name) => named.push((name.clone(), value)),
            None => positional.push(value),
        }
    }
    Ok((positional, named))
}

fn evaluate_call(callee: &CallTarget, arguments: &[Argument], ctx: &mut EvalContext) -> ValueResult {
    match callee {
        CallTarget::Static { method, .. } => {
            let (positional, named) = evaluate_arguments(arguments, ctx)?;
            Ok(method.invoke(ctx.registry, None, positional, named)?)
        }
        CallTarget::Function { index, .. } => {
            let (positional, _) = evaluate_arguments(arguments, ctx)?;
            call_function(*index, positional, ctx)
        }
        CallTarget::Instance { object, name } => {
            let receiver = evaluate_expression(object, ctx)?;
            let (positional, named) = evaluate_arguments(arguments, ctx)?;
            match &receiver {
                Value::Object(o) => call_instance_method(o, name, positional, named, ctx),
                Value::Match(m) if name == "group" && named.is_empty() && positional.len() == 1 => {
                    match_group(m, &positional[0])
                }
                Value::Null => script_error(format!("cannot call '{}' on null", name)),
                other => script_error(format!("{} has no method '{}'", other.describe(), name)),
            }
        }
    }
}

fn call_instance_method(
    object: &HostObject,
    name: &str,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
    ctx: &mut EvalContext,
) -> ValueResult {
    let (method, projection) = match ctx.registry.instance_method(object.class(), name) {
        Some(found) => found,
        None => {
            return script_error(format!(
                "{} has no method '{}'",
                object.class().simple_name(),
                name
            ))
        }
    };
    let receiver = Receiver::new(object, projection);
    Ok(method.invoke(ctx.registry, Some(&receiver), positional, named)?)
}

pub fn get_member(object: &Value, name: &str, ctx: &EvalContext) -> ValueResult {
    match object {
        Value::Object(o) => {
            if let Some((field, projection)) = ctx.registry.instance_field(o.class(), name) {
                let receiver = Receiver::new(o, projection);
                return Ok(field.get(Some(&receiver))?);
            }
            if ctx.registry.instance_method(o.class(), name).is_some() {
                return script_error(format!("'{}' is a method; call it with ()", name));
            }
            script_error(format!(
                "{} has no member '{}'",
                o.class().simple_name(),
                name
            ))
        }
        Value::Enum(e) => match name {
            "name" => Ok(Value::str(e.name())),
            "ordinal" => Ok(Value::from(e.ordinal())),
            _ => script_error(format!("{} has no member '{}'", e.class().simple_name(), name)),
        },
        Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or(Value::Null)),
        Value::Match(m) => match name {
            "text" => Ok(Value::str(m.text())),
            "groups" => Ok(Value::from(m.group_count())),
            _ => script_error(format!("match has no member '{}'", name)),
        },
        Value::Null => script_error(format!("cannot read '{}' of null", name)),
        other => script_error(format!("{} has no member '{}'", other.describe(), name)),
    }
}

fn position(index: &Value, len: usize) -> Result<usize, RunError> {
    match index {
        Value::Int(i) if *i >= 0 && (*i as u64) < len as u64 => Ok(*i as usize),
        Value::Int(i) => script_error(format!("index {} out of range for length {}", i, len)),
        other => script_error(format!("index must be an int, found {}", other.describe())),
    }
}

pub fn get_index(object: &Value, index: &Value) -> ValueResult {
    match object {
        Value::List(items) => Ok(items[position(index, items.len())?].clone()),
        Value::Map(entries) => match index {
            Value::Str(key) => Ok(entries.get(&**key).cloned().unwrap_or(Value::Null)),
            other => script_error(format!("map keys are strings, found {}", other.describe())),
        },
        Value::Str(s) => {
            let count = s.chars().count();
            let i = position(index, count)?;
            Ok(s.chars().nth(i).map(Value::Char).unwrap_or(Value::Null))
        }
        Value::Match(m) => match_group(m, index),
        Value::Null => script_error("cannot index null"),
        other => script_error(format!("{} cannot be indexed", other.describe())),
    }
}

fn match_group(m: &PatternMatch, group: &Value) -> ValueResult {
    let text = match group {
        Value::Int(i) if *i >= 0 => m.group(*i as usize),
        Value::Str(name) => m.named(name),
        other => {
            return script_error(format!(
                "group must be an index or a name, found {}",
                other.describe()
            ))
        }
    };
    Ok(text.map(Value::str).unwrap_or(Value::Null))
}

pub fn apply_unary(operator: UnaryOperator, value: Value) -> ValueResult {
    match (operator, value) {
        (UnaryOperator::Minus, Value::Int(i)) => match i.checked_neg() {
            Some(n) => Ok(Value::Int(n)),
            None => script_error("integer overflow"),
        },
        (UnaryOperator::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (operator, value) => script_error(format!(
            "cannot apply '{}' to {}",
            operator.symbol(),
            value.describe()
        )),
    }
}

fn overflow<T>(result: Option<T>) -> Result<T, RunError> {
    match result {
        Some(v) => Ok(v),
        None => script_error("integer overflow"),
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

pub fn apply_binary(operator: BinaryOperator, left: Value, right: Value) -> ValueResult {
    use BinaryOperator::*;
    match operator {
        Equal => return Ok(Value::Bool(left == right)),
        NotEqual => return Ok(Value::Bool(left != right)),
        Less | LessOrEqual | Greater | GreaterOrEqual => return compare(operator, &left, &right),
        _ => {}
    }
    match (operator, &left, &right) {
        (Add, Value::Str(_), _) | (Add, _, Value::Str(_)) => {
            Ok(Value::str(format!("{}{}", left, right)))
        }
        (Add, Value::List(a), Value::List(b)) => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Value::List(Arc::new(items)))
        }
        (Add, Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(overflow(a.checked_add(*b))?)),
        (Subtract, Value::Duration(a), Value::Duration(b)) => match a.checked_sub(*b) {
            Some(d) => Ok(Value::Duration(d)),
            None => script_error("duration would be negative"),
        },
        (Multiply, Value::Duration(d), Value::Int(n)) | (Multiply, Value::Int(n), Value::Duration(d)) => {
            match u32::try_from(*n).ok().and_then(|n| d.checked_mul(n)) {
                Some(d) => Ok(Value::Duration(d)),
                None => script_error(format!("cannot scale a duration by {}", n)),
            }
        }
        (_, Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match operator {
                Add => a.checked_add(b),
                Subtract => a.checked_sub(b),
                Multiply => a.checked_mul(b),
                Divide | Remainder if b == 0 => return script_error("division by zero"),
                Divide => a.checked_div(b),
                Remainder => a.checked_rem(b),
                _ => None,
            };
            Ok(Value::Int(overflow(result)?))
        }
        _ => match (as_float(&left), as_float(&right)) {
            (Some(a), Some(b)) => Ok(Value::Float(match operator {
                Add => a + b,
                Subtract => a - b,
                Multiply => a * b,
                Divide => a / b,
                _ => a % b,
            })),
            _ => script_error(format!(
                "cannot apply '{}' to {} and {}",
                operator.symbol(),
                left.describe(),
                right.describe()
            )),
        },
    }
}

fn compare(operator: BinaryOperator, left: &Value, right: &Value) -> ValueResult {
    use std::cmp::Ordering;
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return script_error(format!(
                    "cannot compare {} and {}",
                    left.describe(),
                    right.describe()
                ))
            }
        },
    };
    let result = match ordering {
        None => false,
        Some(o) => match operator {
            BinaryOperator::Less => o == Ordering::Less,
            BinaryOperator::LessOrEqual => o != Ordering::Greater,
            BinaryOperator::Greater => o == Ordering::Greater,
            _ => o != Ordering::Less,
        },
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn integer_arithmetic_is_checked() {
        assert_eq!(
            apply_binary(BinaryOperator::Add, Value::Int(2), Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert!(apply_binary(BinaryOperator::Add, Value::Int(i64::MAX), Value::Int(1)).is_err());
        let err = apply_binary(BinaryOperator::Divide, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.as_script_error().unwrap().message(), "division by zero");
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        assert_eq!(
            apply_binary(BinaryOperator::Divide, Value::Int(1), Value::Float(4.0)).unwrap(),
            Value::Float(0.25)
        );
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(
            apply_binary(BinaryOperator::Add, Value::str("n="), Value::Int(3)).unwrap(),
            Value::str("n=3")
        );
    }

    #[test]
    fn durations_add_and_scale() {
        let minute = Value::Duration(Duration::from_secs(60));
        assert_eq!(
            apply_binary(BinaryOperator::Multiply, minute.clone(), Value::Int(2)).unwrap(),
            Value::Duration(Duration::from_secs(120))
        );
        assert!(apply_binary(
            BinaryOperator::Subtract,
            Value::Duration(Duration::from_secs(1)),
            minute
        )
        .is_err());
    }

    #[test]
    fn comparisons_reject_unrelated_kinds() {
        assert_eq!(
            apply_binary(BinaryOperator::Less, Value::str("a"), Value::str("b")).unwrap(),
            Value::Bool(true)
        );
        assert!(apply_binary(BinaryOperator::Less, Value::str("a"), Value::Int(1)).is_err());
    }

    #[test]
    fn conditions_must_be_booleans() {
        assert!(to_boolean(&Value::Int(1)).is_err());
        assert!(apply_unary(UnaryOperator::Not, Value::Null).is_err());
    }
}
