//! Canonical text of a program.
//!
//! Four space indentation, one space around binary operators, and only
//! the parentheses precedence requires. Comments and blank lines are not
//! kept. Writing a parsed canonical text again yields the same bytes.

use std::fmt::Write;

use crate::runner::ds::duration::format_duration;

use super::ast::*;

const INDENT: &str = "    ";

pub fn write_program(program: &Program) -> String {
    let mut out = String::new();
    for item in &program.body {
        match item {
            TopLevel::Statement(statement) => write_statement(&mut out, statement, 0),
            TopLevel::Function(index) => {
                let function = &program.functions[*index];
                out.push_str(&format!(
                    "func {}({}) ",
                    function.name,
                    function.params.join(", ")
                ));
                write_block(&mut out, &function.body, 0);
                out.push('\n');
            }
            TopLevel::Listener(index) => {
                let listener = &program.listeners[*index];
                out.push_str("on ");
                out.push_str(&listener.path);
                if !listener.arguments.is_empty() {
                    out.push('(');
                    out.push_str(&arguments(&listener.arguments));
                    out.push(')');
                }
                out.push(' ');
                write_block(&mut out, &listener.body, 0);
                out.push('\n');
            }
        }
    }
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

/// Writes `{`, the statements, and the closing `}` without a newline.
fn write_block(out: &mut String, block: &Block, level: usize) {
    out.push_str("{\n");
    for statement in &block.statements {
        write_statement(out, statement, level + 1);
    }
    indent(out, level);
    out.push('}');
}

fn write_statement(out: &mut String, statement: &StatementType, level: usize) {
    indent(out, level);
    match statement {
        StatementType::Expression { expression, .. } => out.push_str(&expression_text(expression)),
        StatementType::Assign {
            target,
            operator,
            value,
            ..
        } => {
            let target = match target {
                AssignTarget::Variable(name) => name.clone(),
                AssignTarget::StaticField { path, .. } => path.clone(),
                AssignTarget::Member { object, name } => {
                    format!("{}.{}", operand(object, PREC_POSTFIX), name)
                }
                AssignTarget::Index { variable, index } => {
                    format!("{}[{}]", variable, expression_text(index))
                }
            };
            let _ = write!(out, "{} {} {}", target, operator.symbol(), expression_text(value));
        }
        StatementType::If {
            branches,
            otherwise,
            ..
        } => {
            for (i, (condition, block)) in branches.iter().enumerate() {
                if i > 0 {
                    out.push_str(" else ");
                }
                let _ = write!(out, "if {} ", expression_text(condition));
                write_block(out, block, level);
            }
            if let Some(block) = otherwise {
                out.push_str(" else ");
                write_block(out, block, level);
            }
        }
        StatementType::While {
            condition, body, ..
        } => {
            let _ = write!(out, "while {} ", expression_text(condition));
            write_block(out, body, level);
        }
        StatementType::For {
            variable,
            iterable,
            body,
            ..
        } => {
            let _ = write!(out, "for {} in {} ", variable, expression_text(iterable));
            write_block(out, body, level);
        }
        StatementType::Break { .. } => out.push_str("break"),
        StatementType::Continue { .. } => out.push_str("continue"),
        StatementType::Stop { .. } => out.push_str("stop"),
        StatementType::Return { value, .. } => match value {
            Some(v) => {
                let _ = write!(out, "return {}", expression_text(v));
            }
            None => out.push_str("return"),
        },
    }
    out.push('\n');
}

fn arguments(arguments: &[Argument]) -> String {
    arguments
        .iter()
        .map(|a| match &a.name {
            Some(name) => format!("{} = {}", name, expression_text(&a.value)),
            None => expression_text(&a.value),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `expression` wrapped in parentheses when it binds looser than `min`.
fn operand(expression: &ExpressionType, min: u8) -> String {
    let text = expression_text(expression);
    if expression.precedence() < min {
        format!("({})", text)
    } else {
        text
    }
}

pub(crate) fn expression_text(expression: &ExpressionType) -> String {
    match expression {
        ExpressionType::Literal { value, .. } => literal_text(value),
        ExpressionType::List { elements, .. } => format!(
            "[{}]",
            elements
                .iter()
                .map(expression_text)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ExpressionType::Map { entries, .. } => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k, '"'), expression_text(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ExpressionType::Variable { name, .. } => name.clone(),
        ExpressionType::StaticField { path, .. } => path.clone(),
        ExpressionType::Member { object, name, .. } => {
            format!("{}.{}", operand(object, PREC_POSTFIX), name)
        }
        ExpressionType::Index { object, index, .. } => format!(
            "{}[{}]",
            operand(object, PREC_POSTFIX),
            expression_text(index)
        ),
        ExpressionType::Call {
            callee, arguments: args, ..
        } => {
            let callee = match callee {
                CallTarget::Static { path, .. } => path.clone(),
                CallTarget::Function { name, .. } => name.clone(),
                CallTarget::Instance { object, name } => {
                    format!("{}.{}", operand(object, PREC_POSTFIX), name)
                }
            };
            format!("{}({})", callee, arguments(args))
        }
        ExpressionType::Unary {
            operator, argument, ..
        } => format!("{}{}", operator.symbol(), operand(argument, PREC_UNARY)),
        ExpressionType::Binary {
            operator,
            left,
            right,
            ..
        } => {
            let precedence = operator.precedence();
            format!(
                "{} {} {}",
                operand(left, precedence),
                operator.symbol(),
                operand(right, precedence + 1)
            )
        }
        ExpressionType::Logical {
            operator,
            left,
            right,
            ..
        } => {
            let precedence = operator.precedence();
            format!(
                "{} {} {}",
                operand(left, precedence),
                operator.symbol(),
                operand(right, precedence + 1)
            )
        }
    }
}

fn literal_text(value: &LiteralData) -> String {
    match value {
        LiteralData::Null => "null".to_string(),
        LiteralData::Bool(b) => b.to_string(),
        LiteralData::Int(i) => i.to_string(),
        LiteralData::Float(f) => format!("{:?}", f),
        LiteralData::Char(c) => quote(&c.to_string(), '\''),
        LiteralData::Str(s) => quote(s, '"'),
        LiteralData::Duration(d) => format_duration(*d),
    }
}

fn quote(text: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(delimiter);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_the_delimiter_only() {
        assert_eq!(quote("a\"b'c", '"'), r#""a\"b'c""#);
        assert_eq!(quote("'", '\''), r"'\''");
        assert_eq!(quote("\u{7}", '"'), r#""\u{7}""#);
    }

    #[test]
    fn floats_keep_a_fraction_or_exponent() {
        assert_eq!(literal_text(&LiteralData::Float(2.0)), "2.0");
        assert_eq!(literal_text(&LiteralData::Float(1e20)), "1e20");
    }
}
