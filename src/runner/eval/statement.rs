//! Statement execution.

use std::sync::Arc;

use tracing::trace;

use crate::parser::ast::{
    AssignTarget, AssignmentOperator, Block, ExpressionType, StatementType,
};
use crate::error::RunError;
use crate::runner::ds::value::Value;
use crate::runner::plugin::binding::Receiver;

use super::expression::{apply_binary, evaluate_expression, get_index, get_member, to_boolean};
use super::types::{script_error, Completion, CompletionType, EvalContext, EvalResult, ValueResult};

/// Execute a statement and return its completion.
pub fn execute_statement(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    ctx.check_cancelled()?;
    match stmt {
        StatementType::Expression { expression, .. } => {
            evaluate_expression(expression, ctx)?;
            Ok(Completion::normal())
        }
        StatementType::Assign {
            target,
            operator,
            value,
            ..
        } => {
            execute_assignment(target, *operator, value, ctx)?;
            Ok(Completion::normal())
        }
        StatementType::If {
            branches,
            otherwise,
            ..
        } => {
            for (condition, body) in branches {
                if to_boolean(&evaluate_expression(condition, ctx)?)? {
                    return execute_block(body, ctx);
                }
            }
            match otherwise {
                Some(body) => execute_block(body, ctx),
                None => Ok(Completion::normal()),
            }
        }
        StatementType::While {
            condition, body, ..
        } => execute_while(condition, body, ctx),
        StatementType::For {
            variable,
            iterable,
            body,
            ..
        } => execute_for(variable, iterable, body, ctx),
        StatementType::Break { .. } => Ok(Completion::break_completion()),
        StatementType::Continue { .. } => Ok(Completion::continue_completion()),
        StatementType::Return { value, .. } => {
            let value = match value {
                Some(expression) => evaluate_expression(expression, ctx)?,
                None => Value::Null,
            };
            Ok(Completion::return_value(value))
        }
        StatementType::Stop { meta } => {
            trace!(target: "helix::eval", line = meta.line_index + 1, "stop");
            ctx.request_stop();
            Ok(Completion::stop())
        }
    }
}

/// Execute statements in order until one completes abruptly.
pub fn execute_statements<'s, I>(statements: I, ctx: &mut EvalContext) -> EvalResult
where
    I: IntoIterator<Item = &'s StatementType>,
{
    for stmt in statements {
        let completion = execute_statement(stmt, ctx)?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
        if ctx.is_stopped() {
            return Ok(Completion::stop());
        }
    }
    Ok(Completion::normal())
}

pub fn execute_block(block: &Block, ctx: &mut EvalContext) -> EvalResult {
    execute_statements(&block.statements, ctx)
}

/// Outcome of one loop body pass.
enum LoopStep {
    Next,
    Exit(Option<Completion>),
}

fn loop_step(body: &Block, ctx: &mut EvalContext) -> Result<LoopStep, RunError> {
    ctx.check_cancelled()?;
    let completion = execute_block(body, ctx)?;
    Ok(match completion.completion_type {
        CompletionType::Normal | CompletionType::Continue => LoopStep::Next,
        CompletionType::Break => LoopStep::Exit(None),
        CompletionType::Return | CompletionType::Stop => LoopStep::Exit(Some(completion)),
    })
}

fn execute_while(condition: &ExpressionType, body: &Block, ctx: &mut EvalContext) -> EvalResult {
    while to_boolean(&evaluate_expression(condition, ctx)?)? {
        match loop_step(body, ctx)? {
            LoopStep::Next => {}
            LoopStep::Exit(Some(completion)) => return Ok(completion),
            LoopStep::Exit(None) => break,
        }
    }
    Ok(Completion::normal())
}

fn execute_for(
    variable: &str,
    iterable: &ExpressionType,
    body: &Block,
    ctx: &mut EvalContext,
) -> EvalResult {
    let items: Vec<Value> = match evaluate_expression(iterable, ctx)? {
        Value::List(items) => items.iter().cloned().collect(),
        Value::Map(entries) => entries.keys().map(Value::str).collect(),
        Value::Str(s) => s.chars().map(Value::Char).collect(),
        other => {
            return script_error(format!("cannot iterate over {}", other.describe()));
        }
    };
    for item in items {
        ctx.frame.set(variable, item);
        match loop_step(body, ctx)? {
            LoopStep::Next => {}
            LoopStep::Exit(Some(completion)) => return Ok(completion),
            LoopStep::Exit(None) => break,
        }
    }
    Ok(Completion::normal())
}

/// Combine the current value with the right-hand side for compound
/// assignment.
fn combine(
    operator: AssignmentOperator,
    current: impl FnOnce() -> ValueResult,
    value: Value,
) -> ValueResult {
    match operator.binary() {
        None => Ok(value),
        Some(binary) => apply_binary(binary, current()?, value),
    }
}

fn execute_assignment(
    target: &AssignTarget,
    operator: AssignmentOperator,
    value: &ExpressionType,
    ctx: &mut EvalContext,
) -> Result<(), RunError> {
    let value = evaluate_expression(value, ctx)?;
    match target {
        AssignTarget::Variable(name) => {
            let value = combine(
                operator,
                || match ctx.frame.get(name) {
                    Some(current) => Ok(current.clone()),
                    None => script_error(format!("variable '{}' is not defined", name)),
                },
                value,
            )?;
            ctx.frame.set(name, value);
        }
        AssignTarget::StaticField { field, .. } => {
            let value = combine(operator, || Ok(field.get(None)?), value)?;
            field.set(ctx.registry, None, value)?;
        }
        AssignTarget::Member { object, name } => {
            let base = evaluate_expression(object, ctx)?;
            let value = combine(operator, || get_member(&base, name, ctx), value)?;
            assign_member(object, base, name, value, ctx)?;
        }
        AssignTarget::Index { variable, index } => {
            let index = evaluate_expression(index, ctx)?;
            let value = combine(
                operator,
                || match ctx.frame.get(variable) {
                    Some(base) => get_index(base, &index),
                    None => script_error(format!("variable '{}' is not defined", variable)),
                },
                value,
            )?;
            assign_index(variable, index, value, ctx)?;
        }
    }
    Ok(())
}

fn assign_member(
    object: &ExpressionType,
    base: Value,
    name: &str,
    value: Value,
    ctx: &mut EvalContext,
) -> Result<(), RunError> {
    match base {
        Value::Object(o) => match ctx.registry.instance_field(o.class(), name) {
            Some((field, projection)) => {
                let receiver = Receiver::new(&o, projection);
                Ok(field.set(ctx.registry, Some(&receiver), value)?)
            }
            None => script_error(format!(
                "{} has no field '{}'",
                o.class().simple_name(),
                name
            )),
        },
        Value::Map(_) => {
            let variable = match object {
                ExpressionType::Variable { name, .. } => name,
                _ => return script_error("map entries can only be assigned through a variable"),
            };
            match ctx.frame.get_mut(variable) {
                Some(Value::Map(entries)) => {
                    Arc::make_mut(entries).insert(name.to_string(), value);
                    Ok(())
                }
                _ => script_error(format!("variable '{}' is not a map", variable)),
            }
        }
        Value::Null => script_error(format!("cannot set '{}' of null", name)),
        other => script_error(format!("cannot set '{}' of {}", name, other.describe())),
    }
}

fn assign_index(
    variable: &str,
    index: Value,
    value: Value,
    ctx: &mut EvalContext,
) -> Result<(), RunError> {
    match ctx.frame.get_mut(variable) {
        Some(Value::List(items)) => {
            let len = items.len();
            match index {
                Value::Int(i) if i >= 0 && (i as u64) < len as u64 => {
                    Arc::make_mut(items)[i as usize] = value;
                    Ok(())
                }
                Value::Int(i) => {
                    script_error(format!("index {} out of range for length {}", i, len))
                }
                other => {
                    script_error(format!("index must be an int, found {}", other.describe()))
                }
            }
        }
        Some(Value::Map(entries)) => match index {
            Value::Str(key) => {
                Arc::make_mut(entries).insert(key.to_string(), value);
                Ok(())
            }
            other => script_error(format!("map keys are strings, found {}", other.describe())),
        },
        Some(other) => script_error(format!("{} cannot be indexed", other.describe())),
        None => script_error(format!("variable '{}' is not defined", variable)),
    }
}
