use std::time::Instant;

use pest::error::{Error, ErrorVariant, LineColLocation};
use pest::Parser as PestParser;
use pest_derive::Parser;
use tracing::debug;

use crate::error::{ParseError, RegistrationError, SyntaxError};
use crate::runner::plugin::registry::Registry;
use crate::script::compiled::Script;
use crate::script::source::{Source, STRING_SOURCE_NAME};

use super::build::{BuildError, Builder, NESTED_TOO_DEEPLY};
use super::resolve::Resolver;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"] // relative to src
pub struct HelixParser;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 48;

/// Compiles script sources against a registry.
///
/// Parsing only reads the registry, so one parser may be shared by many
/// threads and every call is independent of the others.
#[derive(Clone, Debug)]
pub struct Parser {
    registry: Registry,
    home: Option<String>,
    max_call_depth: usize,
    max_nesting_depth: usize,
}

impl Parser {
    /// Parser resolving unqualified names through every exported module.
    pub fn new(registry: Registry) -> Self {
        Parser {
            registry,
            home: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Parser whose unqualified names resolve in `module` first.
    pub fn for_module(registry: Registry, module: &str) -> Result<Self, RegistrationError> {
        if registry.root_id(module).is_none() {
            return Err(RegistrationError::UnknownModule(module.to_string()));
        }
        Ok(Parser {
            registry,
            home: Some(module.to_string()),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        })
    }

    /// Limit script function recursion in scripts from this parser.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Limit how deeply brackets, blocks and operators may nest.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn parse(&self, source: &dyn Source) -> Result<Script, ParseError> {
        let text = source.read_to_string().map_err(|e| ParseError::Io {
            name: source.name().to_string(),
            source: e,
        })?;
        Ok(self.parse_named(source.name(), &text)?)
    }

    pub fn parse_str(&self, text: &str) -> Result<Script, SyntaxError> {
        self.parse_named(STRING_SOURCE_NAME, text)
    }

    pub fn parse_named(&self, source_name: &str, text: &str) -> Result<Script, SyntaxError> {
        let start = Instant::now();
        let text = text.replace("\r\n", "\n");
        // pest descends once per bracket, so depth is checked before it runs.
        if let Some(line_index) = too_deep(&text, self.max_nesting_depth) {
            return Err(SyntaxError::new(
                NESTED_TOO_DEEPLY,
                line_at(&text, line_index),
                line_index,
                source_name,
            ));
        }
        let pairs = HelixParser::parse(Rule::program, &text)
            .map_err(|e| from_pest_error(e, &text, source_name))?;
        let resolver = Resolver::new(&self.registry, self.home.as_deref())
            .map_err(|e| SyntaxError::new(e.to_string(), line_at(&text, 0), 0, source_name))?;
        let program = Builder::new(resolver, &text, self.max_nesting_depth)
            .build_program(pairs, source_name)
            .map_err(|BuildError { reason, line_index }| {
                SyntaxError::new(reason, line_at(&text, line_index), line_index, source_name)
            })?;
        debug!(
            target: "helix::parser",
            "parsed {} in {}us: {} statements, {} functions, {} listeners",
            source_name,
            start.elapsed().as_micros(),
            program.statements().count(),
            program.functions.len(),
            program.listeners.len()
        );
        Ok(Script::new(program, self.registry.clone(), self.max_call_depth))
    }
}

/// Line of the first bracket opened more than `limit` levels deep.
/// Brackets inside comments and quoted literals do not count.
fn too_deep(text: &str, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut line = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '#' => {
                if chars.by_ref().any(|c| c == '\n') {
                    line += 1;
                }
            }
            '"' | '\'' => {
                while let Some(q) = chars.next() {
                    match q {
                        '\\' => {
                            chars.next();
                        }
                        '\n' => {
                            line += 1;
                            break;
                        }
                        q if q == c => break,
                        _ => {}
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                if depth > limit {
                    return Some(line);
                }
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

fn line_at(text: &str, index: usize) -> String {
    text.split('\n').nth(index).unwrap_or("").to_string()
}

fn from_pest_error(error: Error<Rule>, text: &str, source_name: &str) -> SyntaxError {
    let (line, _) = match error.line_col {
        LineColLocation::Pos(position) => position,
        LineColLocation::Span(start, _) => start,
    };
    let line_index = line.saturating_sub(1);
    let reason = match &error.variant {
        ErrorVariant::ParsingError {
            positives,
            negatives,
        } => expected(positives, negatives),
        ErrorVariant::CustomError { message } => message.clone(),
    };
    SyntaxError::new(reason, line_at(text, line_index), line_index, source_name)
}

fn expected(positives: &[Rule], negatives: &[Rule]) -> String {
    let mut wanted: Vec<&str> = vec![];
    for rule in positives {
        let description = describe(*rule);
        if !wanted.contains(&description) {
            wanted.push(description);
        }
    }
    match wanted.len() {
        0 if negatives.contains(&Rule::keyword) => "unexpected keyword".to_string(),
        0 => "unexpected input".to_string(),
        1 => format!("expected {}", wanted[0]),
        n => format!(
            "expected {} or {}",
            wanted[..n - 1].join(", "),
            wanted[n - 1]
        ),
    }
}

fn describe(rule: Rule) -> &'static str {
    match rule {
        Rule::expression
        | Rule::or_expr
        | Rule::and_expr
        | Rule::eq_expr
        | Rule::cmp_expr
        | Rule::add_expr
        | Rule::mul_expr
        | Rule::unary_expr
        | Rule::unary_op
        | Rule::postfix
        | Rule::path
        | Rule::null_lit
        | Rule::bool_lit
        | Rule::duration_lit
        | Rule::float_lit
        | Rule::int_lit
        | Rule::char_lit
        | Rule::string_lit
        | Rule::list_lit
        | Rule::map_lit => "expression",
        Rule::identifier | Rule::module_id | Rule::param_list => "identifier",
        Rule::block => "block",
        Rule::assign_op => "assignment",
        Rule::or_op
        | Rule::and_op
        | Rule::eq_op
        | Rule::cmp_op
        | Rule::add_op
        | Rule::mul_op => "operator",
        Rule::call_args | Rule::arguments | Rule::named_arg => "arguments",
        Rule::member => "member",
        Rule::index => "index",
        Rule::map_entry => "map entry",
        Rule::kw_else => "'else'",
        Rule::kw_in => "'in'",
        Rule::EOI => "end of line",
        Rule::func_decl | Rule::listener => "declaration",
        _ => "statement",
    }
}
