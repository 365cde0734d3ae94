//! Builds the resolved tree from pest pairs.

use std::collections::{HashMap, HashSet};

use pest::iterators::{Pair, Pairs};

use crate::runner::ds::duration::parse_duration;
use crate::runner::plugin::registry::TriggerId;

use super::api::Rule;
use super::ast::*;
use super::resolve::{PathText, Resolved, Resolver};

/// Failure while building, positioned on a source line.
#[derive(Debug)]
pub(crate) struct BuildError {
    pub reason: String,
    pub line_index: usize,
}

type BuildResult<T> = Result<T, BuildError>;

pub(crate) const NESTED_TOO_DEEPLY: &str = "expression nested too deeply";

/// Byte offsets of line starts, for mapping spans to lines.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_for
            | Rule::kw_in
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_return
            | Rule::kw_stop
            | Rule::kw_func
            | Rule::kw_on
    )
}

/// Children of `pair` without keyword tokens.
fn children(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

/// Call chain head before it settles into a value.
enum Head {
    Value(ExpressionType),
    Method(ExpressionType),
    Function { name: String, index: usize },
    NotValue(String),
}

/// Facts about a body needed to classify listeners.
#[derive(Default, Clone)]
struct BodyTrace {
    not_async: bool,
    calls: Vec<usize>,
}

struct FunctionSlot {
    index: usize,
    arity: usize,
}

pub(crate) struct Builder<'r> {
    resolver: Resolver<'r>,
    lines: LineIndex,
    functions: HashMap<String, FunctionSlot>,
    scope: HashSet<String>,
    trace: BodyTrace,
    depth: usize,
    max_depth: usize,
}

impl<'r> Builder<'r> {
    pub fn new(resolver: Resolver<'r>, text: &str, max_depth: usize) -> Self {
        Builder {
            resolver,
            lines: LineIndex::new(text),
            functions: HashMap::new(),
            scope: HashSet::new(),
            trace: BodyTrace::default(),
            depth: 0,
            max_depth,
        }
    }

    /// Account for `levels` more tree levels below the node being built.
    ///
    /// Evaluation and rendering recurse over the tree, so its height is
    /// bounded here rather than left to the stack.
    fn descend(&mut self, pair: &Pair<Rule>, levels: usize) -> BuildResult<()> {
        self.depth += levels;
        if self.depth > self.max_depth {
            return Err(self.error(pair, NESTED_TOO_DEEPLY));
        }
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn meta(&self, pair: &Pair<Rule>) -> Meta {
        Meta {
            line_index: self.lines.line_of(pair.as_span().start()),
        }
    }

    fn error(&self, pair: &Pair<Rule>, reason: impl Into<String>) -> BuildError {
        BuildError {
            reason: reason.into(),
            line_index: self.meta(pair).line_index,
        }
    }

    fn unexpected(&self, id: i32, pair: &Pair<Rule>) -> BuildError {
        self.error(
            pair,
            format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id),
        )
    }

    fn next<'i>(
        &self,
        iter: &mut impl Iterator<Item = Pair<'i, Rule>>,
        parent: &Pair<'i, Rule>,
    ) -> BuildResult<Pair<'i, Rule>> {
        iter.next().ok_or_else(|| self.unexpected(1, parent))
    }

    // ── program ──────────────────────────────────────────────────────

    pub fn build_program(mut self, pairs: Pairs<Rule>, source_name: &str) -> BuildResult<Program> {
        let items: Vec<Pair<Rule>> = pairs
            .flat_map(|p| p.into_inner())
            .filter(|p| p.as_rule() != Rule::EOI)
            .collect();

        for item in items.iter().filter(|p| p.as_rule() == Rule::func_decl) {
            let mut inner = children(item.clone());
            let name = self.next(&mut inner, item)?.as_str().to_string();
            let arity = match inner.next() {
                Some(p) if p.as_rule() == Rule::param_list => p.into_inner().count(),
                _ => 0,
            };
            if self.functions.contains_key(&name) {
                return Err(self.error(item, format!("function '{}' is already declared", name)));
            }
            let index = self.functions.len();
            self.functions.insert(name, FunctionSlot { index, arity });
        }

        let mut program = Program {
            source_name: source_name.to_string(),
            ..Program::default()
        };
        let mut top_scope = HashSet::new();
        for item in &items {
            collect_names(item.clone(), &mut top_scope);
        }
        let mut function_traces = vec![];
        let mut listener_traces = vec![];

        for item in items {
            match item.as_rule() {
                Rule::func_decl => {
                    let (function, trace) = self.build_function(item)?;
                    program.body.push(TopLevel::Function(program.functions.len()));
                    program.functions.push(function);
                    function_traces.push(trace);
                }
                Rule::listener => {
                    let (listener, trace) = self.build_listener(item)?;
                    program.body.push(TopLevel::Listener(program.listeners.len()));
                    program.listeners.push(listener);
                    listener_traces.push(trace);
                }
                _ => {
                    self.scope = top_scope.clone();
                    let statement = self.build_statement(item)?;
                    program.body.push(TopLevel::Statement(statement));
                }
            }
        }

        let blocked = not_async_closure(&function_traces);
        for (listener, trace) in program.listeners.iter_mut().zip(listener_traces) {
            let touches_blocked = trace.not_async || trace.calls.iter().any(|i| blocked[*i]);
            listener.asynchronous = listener.asynchronous && !touches_blocked;
        }
        Ok(program)
    }

    fn build_function(&mut self, pair: Pair<Rule>) -> BuildResult<(FunctionDecl, BodyTrace)> {
        let meta = self.meta(&pair);
        let mut inner = children(pair.clone());
        let name = self.next(&mut inner, &pair)?.as_str().to_string();
        let mut params = vec![];
        let mut body_pair = self.next(&mut inner, &pair)?;
        if body_pair.as_rule() == Rule::param_list {
            for param in body_pair.into_inner() {
                let param_name = param.as_str().to_string();
                if params.contains(&param_name) {
                    return Err(self.error(
                        &param,
                        format!("parameter '{}' of '{}' is declared twice", param_name, name),
                    ));
                }
                params.push(param_name);
            }
            body_pair = self.next(&mut inner, &pair)?;
        }
        let mut scope: HashSet<String> = params.iter().cloned().collect();
        collect_names(body_pair.clone(), &mut scope);
        self.scope = scope;
        self.trace = BodyTrace::default();
        let body = self.build_block(body_pair)?;
        let trace = std::mem::take(&mut self.trace);
        Ok((
            FunctionDecl {
                meta,
                name,
                params,
                body,
            },
            trace,
        ))
    }

    fn build_listener(&mut self, pair: Pair<Rule>) -> BuildResult<(ListenerDecl, BodyTrace)> {
        let meta = self.meta(&pair);
        let mut inner = children(pair.clone());
        let path_pair = self.next(&mut inner, &pair)?;
        let path = PathText::parse(path_pair.as_str());
        let (path, trigger) = match self
            .resolver
            .resolve(&path, |_| false)
            .map_err(|reason| self.error(&path_pair, reason))?
        {
            Resolved::Trigger { path, id } => (path, id),
            _ => {
                return Err(self.error(
                    &path_pair,
                    format!("'{}' is not a trigger", path_pair.as_str()),
                ))
            }
        };

        self.scope = HashSet::new();
        let mut body_pair = self.next(&mut inner, &pair)?;
        let mut arguments = vec![];
        if body_pair.as_rule() == Rule::arguments {
            arguments = self.build_arguments(body_pair)?;
            body_pair = self.next(&mut inner, &pair)?;
        }
        let asynchronous = self.check_listener_arguments(&path_pair, trigger, &arguments)?;

        let mut scope = HashSet::new();
        collect_names(body_pair.clone(), &mut scope);
        self.scope = scope;
        self.trace = BodyTrace::default();
        let body = self.build_block(body_pair)?;
        let trace = std::mem::take(&mut self.trace);
        Ok((
            ListenerDecl {
                meta,
                path,
                trigger,
                arguments,
                body,
                asynchronous,
            },
            trace,
        ))
    }

    /// Check listener arguments against the trigger; returns whether the
    /// trigger lets listeners run asynchronously.
    fn check_listener_arguments(
        &self,
        pair: &Pair<Rule>,
        trigger: TriggerId,
        arguments: &[Argument],
    ) -> BuildResult<bool> {
        let snapshot = self
            .resolver
            .registry()
            .trigger(trigger)
            .ok_or_else(|| self.error(pair, format!("trigger '{}' is gone", pair.as_str())))?;
        match &snapshot.signature {
            Some(signature) => {
                let (positional, named) = split_arguments(arguments);
                signature
                    .check_arity(positional, &named)
                    .map_err(|reason| self.error(pair, reason))?;
            }
            None if !arguments.is_empty() => {
                return Err(self.error(
                    pair,
                    format!("trigger '{}' takes no arguments", snapshot.path),
                ))
            }
            None => {}
        }
        Ok(snapshot.allow_async)
    }

    // ── statements ───────────────────────────────────────────────────

    fn build_block(&mut self, pair: Pair<Rule>) -> BuildResult<Block> {
        self.descend(&pair, 1)?;
        let mut statements = vec![];
        for statement in pair.into_inner() {
            statements.push(self.build_statement(statement)?);
        }
        self.ascend(1);
        Ok(Block { statements })
    }

    fn build_statement(&mut self, pair: Pair<Rule>) -> BuildResult<StatementType> {
        let meta = self.meta(&pair);
        Ok(match pair.as_rule() {
            Rule::expr_stmt => {
                let mut inner = children(pair.clone());
                let expression = self.build_expression(self.next(&mut inner, &pair)?)?;
                StatementType::Expression { meta, expression }
            }
            Rule::assignment => self.build_assignment(pair)?,
            Rule::if_stmt => {
                let (branches, otherwise) = self.build_if(pair)?;
                StatementType::If {
                    meta,
                    branches,
                    otherwise,
                }
            }
            Rule::while_stmt => {
                let mut inner = children(pair.clone());
                let condition = self.build_expression(self.next(&mut inner, &pair)?)?;
                let body = self.build_block(self.next(&mut inner, &pair)?)?;
                StatementType::While {
                    meta,
                    condition,
                    body,
                }
            }
            Rule::for_stmt => {
                let mut inner = children(pair.clone());
                let variable = self.next(&mut inner, &pair)?.as_str().to_string();
                let iterable = self.build_expression(self.next(&mut inner, &pair)?)?;
                let body = self.build_block(self.next(&mut inner, &pair)?)?;
                StatementType::For {
                    meta,
                    variable,
                    iterable,
                    body,
                }
            }
            Rule::break_stmt => StatementType::Break { meta },
            Rule::continue_stmt => StatementType::Continue { meta },
            Rule::stop_stmt => StatementType::Stop { meta },
            Rule::return_stmt => {
                let value = match children(pair).next() {
                    Some(p) => Some(self.build_expression(p)?),
                    None => None,
                };
                StatementType::Return { meta, value }
            }
            _ => return Err(self.unexpected(2, &pair)),
        })
    }

    #[allow(clippy::type_complexity)]
    fn build_if(
        &mut self,
        pair: Pair<Rule>,
    ) -> BuildResult<(Vec<(ExpressionType, Block)>, Option<Block>)> {
        let mut inner = children(pair.clone());
        let condition = self.build_expression(self.next(&mut inner, &pair)?)?;
        let block = self.build_block(self.next(&mut inner, &pair)?)?;
        let mut branches = vec![(condition, block)];
        let otherwise = match inner.next() {
            None => None,
            Some(p) if p.as_rule() == Rule::if_stmt => {
                let (more, otherwise) = self.build_if(p)?;
                branches.extend(more);
                otherwise
            }
            Some(p) => Some(self.build_block(p)?),
        };
        Ok((branches, otherwise))
    }

    fn build_assignment(&mut self, pair: Pair<Rule>) -> BuildResult<StatementType> {
        let meta = self.meta(&pair);
        let mut inner = pair.clone().into_inner();
        let target_pair = self.next(&mut inner, &pair)?;
        let operator = match self.next(&mut inner, &pair)?.as_str() {
            "=" => AssignmentOperator::Assign,
            "+=" => AssignmentOperator::Add,
            "-=" => AssignmentOperator::Subtract,
            "*=" => AssignmentOperator::Multiply,
            "/=" => AssignmentOperator::Divide,
            "%=" => AssignmentOperator::Remainder,
            _ => return Err(self.unexpected(3, &pair)),
        };
        let target = self.build_assign_target(target_pair)?;
        let value = self.build_expression(self.next(&mut inner, &pair)?)?;
        Ok(StatementType::Assign {
            meta,
            target,
            operator,
            value,
        })
    }

    fn build_assign_target(&mut self, pair: Pair<Rule>) -> BuildResult<AssignTarget> {
        let single_path = {
            let mut inner = pair.clone().into_inner();
            match (inner.next(), inner.next()) {
                (Some(p), None) if p.as_rule() == Rule::path => Some(p),
                _ => None,
            }
        };
        if let Some(path_pair) = single_path {
            let path = PathText::parse(path_pair.as_str());
            if path.is_simple() {
                return Ok(AssignTarget::Variable(path.segments[0].clone()));
            }
            if let Resolved::Field {
                path,
                field,
                members,
            } = self.resolve(&path_pair, false)?
            {
                if members.is_empty() {
                    if !field.is_mutable() {
                        return Err(self.error(&pair, format!("field '{}' is read-only", path)));
                    }
                    return Ok(AssignTarget::StaticField { path, field });
                }
            }
        }
        let invalid = self.error(&pair, format!("cannot assign to '{}'", pair.as_str()));
        match self.build_postfix(pair)? {
            ExpressionType::Member { object, name, .. } => Ok(AssignTarget::Member {
                object: *object,
                name,
            }),
            ExpressionType::Index { object, index, .. } => match *object {
                ExpressionType::Variable { name, .. } => Ok(AssignTarget::Index {
                    variable: name,
                    index: *index,
                }),
                _ => Err(invalid),
            },
            _ => Err(invalid),
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    fn build_expression(&mut self, pair: Pair<Rule>) -> BuildResult<ExpressionType> {
        match pair.as_rule() {
            Rule::expression => {
                self.descend(&pair, 1)?;
                let mut inner = pair.clone().into_inner();
                let first = self.next(&mut inner, &pair)?;
                let expression = self.build_expression(first)?;
                self.ascend(1);
                Ok(expression)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::eq_expr
            | Rule::cmp_expr
            | Rule::add_expr
            | Rule::mul_expr => self.build_binary_chain(pair),
            Rule::unary_expr => self.build_unary(pair),
            Rule::postfix => self.build_postfix(pair),
            _ => Err(self.unexpected(4, &pair)),
        }
    }

    fn build_binary_chain(&mut self, pair: Pair<Rule>) -> BuildResult<ExpressionType> {
        // Operators fold into a left spine one level per operator.
        let levels = pair.clone().into_inner().count() / 2;
        self.descend(&pair, levels)?;
        let mut inner = pair.clone().into_inner();
        let mut left = self.build_expression(self.next(&mut inner, &pair)?)?;
        while let Some(op) = inner.next() {
            let meta = self.meta(&op);
            let right = self.build_expression(self.next(&mut inner, &pair)?)?;
            left = match op.as_str() {
                "||" => logical(meta, LogicalOperator::Or, left, right),
                "&&" => logical(meta, LogicalOperator::And, left, right),
                symbol => {
                    let operator = binary_operator(symbol).ok_or_else(|| self.unexpected(5, &op))?;
                    ExpressionType::Binary {
                        meta,
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                }
            };
        }
        self.ascend(levels);
        Ok(left)
    }

    fn build_unary(&mut self, pair: Pair<Rule>) -> BuildResult<ExpressionType> {
        let meta = self.meta(&pair);
        let levels = pair
            .clone()
            .into_inner()
            .filter(|p| p.as_rule() == Rule::unary_op)
            .count();
        self.descend(&pair, levels)?;
        let mut operators = vec![];
        let mut operand = None;
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::unary_op => operators.push(if p.as_str() == "-" {
                    UnaryOperator::Minus
                } else {
                    UnaryOperator::Not
                }),
                _ => operand = Some(self.build_postfix(p)?),
            }
        }
        let mut expression = operand.ok_or_else(|| self.unexpected(6, &pair))?;
        for operator in operators.into_iter().rev() {
            expression = ExpressionType::Unary {
                meta,
                operator,
                argument: Box::new(expression),
            };
        }
        self.ascend(levels);
        Ok(expression)
    }

    fn build_postfix(&mut self, pair: Pair<Rule>) -> BuildResult<ExpressionType> {
        let mut inner = pair.clone().into_inner().peekable();
        let first = self.next(&mut inner, &pair)?;
        let mut levels = pair.clone().into_inner().count().saturating_sub(1);
        if first.as_rule() == Rule::path {
            levels += first.as_str().matches('.').count();
        }
        self.descend(&pair, levels)?;
        let called = inner
            .peek()
            .map_or(false, |p| p.as_rule() == Rule::call_args);
        let mut head = match first.as_rule() {
            Rule::path => self.build_path_head(first.clone(), called)?,
            Rule::expression => Head::Value(self.build_expression(first.clone())?),
            _ => Head::Value(self.build_literal(first.clone())?),
        };
        for suffix in inner {
            let meta = self.meta(&suffix);
            head = match suffix.as_rule() {
                Rule::call_args => {
                    let arguments = match suffix.clone().into_inner().next() {
                        Some(args) => self.build_arguments(args)?,
                        None => vec![],
                    };
                    Head::Value(self.build_call(&suffix, meta, head, arguments)?)
                }
                Rule::member => {
                    let object = self.settle(&first, head)?;
                    let name = self.next(&mut suffix.clone().into_inner(), &suffix)?;
                    Head::Value(ExpressionType::Member {
                        meta,
                        object: Box::new(object),
                        name: name.as_str().to_string(),
                    })
                }
                Rule::index => {
                    let object = self.settle(&first, head)?;
                    let index = self.build_expression(self.next(&mut suffix.clone().into_inner(), &suffix)?)?;
                    Head::Value(ExpressionType::Index {
                        meta,
                        object: Box::new(object),
                        index: Box::new(index),
                    })
                }
                _ => return Err(self.unexpected(7, &suffix)),
            };
        }
        self.ascend(levels);
        self.settle(&first, head)
    }

    /// Turn a head into a value, rejecting names that are not values.
    fn settle(&self, pair: &Pair<Rule>, head: Head) -> BuildResult<ExpressionType> {
        match head {
            Head::Value(v) => Ok(v),
            Head::Method(ExpressionType::Call { callee: CallTarget::Static { path, .. }, .. }) => Err(
                self.error(pair, format!("'{}' is a method; call it with ()", path)),
            ),
            Head::Method(_) => Err(self.unexpected(8, pair)),
            Head::Function { name, .. } => Err(self.error(
                pair,
                format!("'{}' is a function; call it with ()", name),
            )),
            Head::NotValue(reason) => Err(self.error(pair, reason)),
        }
    }

    fn resolve(&self, pair: &Pair<Rule>, called: bool) -> BuildResult<Resolved> {
        let path = PathText::parse(pair.as_str());
        let scope = &self.scope;
        let skip_variables = called && path.is_simple();
        self.resolver
            .resolve(&path, |name| !skip_variables && scope.contains(name))
            .map_err(|reason| self.error(pair, reason))
    }

    fn build_path_head(&mut self, pair: Pair<Rule>, called: bool) -> BuildResult<Head> {
        let meta = self.meta(&pair);
        let path = PathText::parse(pair.as_str());
        if called && path.is_simple() {
            if let Some(slot) = self.functions.get(&path.segments[0]) {
                return Ok(Head::Function {
                    name: path.segments[0].clone(),
                    index: slot.index,
                });
            }
        }
        Ok(match self.resolve(&pair, called)? {
            Resolved::Field {
                path,
                field,
                members,
            } => Head::Value(with_members(
                ExpressionType::StaticField { meta, path, field },
                members,
                meta,
            )),
            Resolved::Method { path, method } => Head::Method(ExpressionType::Call {
                meta,
                callee: CallTarget::Static { path, method },
                arguments: vec![],
            }),
            Resolved::Trigger { path, .. } => Head::NotValue(format!(
                "'{}' is a trigger and cannot be used as a value",
                path
            )),
            Resolved::Container { path, what } => Head::NotValue(format!(
                "'{}' is a {} and cannot be used as a value",
                path, what
            )),
            Resolved::Variable { name, members } => {
                if called && members.is_empty() {
                    let reason = if self.scope.contains(&name) {
                        format!("'{}' is a variable, not a function", name)
                    } else {
                        format!("unknown function '{}'", name)
                    };
                    return Err(self.error(&pair, reason));
                }
                Head::Value(with_members(
                    ExpressionType::Variable { meta, name },
                    members,
                    meta,
                ))
            }
        })
    }

    fn build_call(
        &mut self,
        pair: &Pair<Rule>,
        meta: Meta,
        head: Head,
        arguments: Vec<Argument>,
    ) -> BuildResult<ExpressionType> {
        match head {
            Head::Method(ExpressionType::Call {
                meta,
                callee: CallTarget::Static { path, method },
                ..
            }) => {
                let (positional, named) = split_arguments(&arguments);
                method
                    .signature()
                    .check_arity(positional, &named)
                    .map_err(|reason| self.error(pair, reason))?;
                if method.signature().is_not_async() {
                    self.trace.not_async = true;
                }
                Ok(ExpressionType::Call {
                    meta,
                    callee: CallTarget::Static { path, method },
                    arguments,
                })
            }
            Head::Function { name, index } => {
                let arity = self.functions.get(&name).map_or(0, |f| f.arity);
                if arguments.iter().any(|a| a.name.is_some()) {
                    return Err(self.error(
                        pair,
                        format!("function '{}' takes no named arguments", name),
                    ));
                }
                if arguments.len() != arity {
                    return Err(self.error(
                        pair,
                        format!(
                            "function '{}' expects {} arguments, got {}",
                            name,
                            arity,
                            arguments.len()
                        ),
                    ));
                }
                self.trace.calls.push(index);
                Ok(ExpressionType::Call {
                    meta,
                    callee: CallTarget::Function { name, index },
                    arguments,
                })
            }
            Head::Value(ExpressionType::Member { object, name, .. }) => Ok(ExpressionType::Call {
                meta,
                callee: CallTarget::Instance { object, name },
                arguments,
            }),
            Head::Value(_) | Head::Method(_) => {
                Err(self.error(pair, "expression is not callable"))
            }
            Head::NotValue(reason) => Err(self.error(pair, reason)),
        }
    }

    fn build_arguments(&mut self, pair: Pair<Rule>) -> BuildResult<Vec<Argument>> {
        let mut arguments: Vec<Argument> = vec![];
        for argument in pair.into_inner() {
            let built = if argument.as_rule() == Rule::named_arg {
                let mut inner = argument.clone().into_inner();
                let name = self.next(&mut inner, &argument)?.as_str().to_string();
                let value = self.build_expression(self.next(&mut inner, &argument)?)?;
                Argument {
                    name: Some(name),
                    value,
                }
            } else {
                if arguments.iter().any(|a| a.name.is_some()) {
                    return Err(self.error(&argument, "positional argument after named argument"));
                }
                Argument {
                    name: None,
                    value: self.build_expression(argument)?,
                }
            };
            arguments.push(built);
        }
        Ok(arguments)
    }

    // ── literals ─────────────────────────────────────────────────────

    fn build_literal(&mut self, pair: Pair<Rule>) -> BuildResult<ExpressionType> {
        let meta = self.meta(&pair);
        let text = pair.as_str();
        let value = match pair.as_rule() {
            Rule::null_lit => LiteralData::Null,
            Rule::bool_lit => LiteralData::Bool(text == "true"),
            Rule::int_lit => LiteralData::Int(text.parse().map_err(|_| {
                self.error(&pair, format!("integer literal {} is out of range", text))
            })?),
            Rule::float_lit => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| self.error(&pair, format!("invalid number {}", text)))?;
                if !value.is_finite() {
                    return Err(self.error(&pair, format!("float literal {} is out of range", text)));
                }
                LiteralData::Float(value)
            }
            Rule::duration_lit => LiteralData::Duration(
                parse_duration(text).map_err(|e| self.error(&pair, e.to_string()))?,
            ),
            Rule::string_lit => LiteralData::Str(
                unescape(&text[1..text.len() - 1]).map_err(|reason| self.error(&pair, reason))?,
            ),
            Rule::char_lit => {
                let content =
                    unescape(&text[1..text.len() - 1]).map_err(|reason| self.error(&pair, reason))?;
                let mut chars = content.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => LiteralData::Char(c),
                    _ => return Err(self.error(&pair, "character literal must hold one character")),
                }
            }
            Rule::list_lit => {
                let mut elements = vec![];
                for element in pair.into_inner() {
                    elements.push(self.build_expression(element)?);
                }
                return Ok(ExpressionType::List { meta, elements });
            }
            Rule::map_lit => {
                let mut entries: Vec<(String, ExpressionType)> = vec![];
                for entry in pair.into_inner() {
                    let mut inner = entry.clone().into_inner();
                    let key_pair = self.next(&mut inner, &entry)?;
                    let key_text = key_pair.as_str();
                    let key = unescape(&key_text[1..key_text.len() - 1])
                        .map_err(|reason| self.error(&key_pair, reason))?;
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(self.error(&key_pair, format!("duplicate map key \"{}\"", key)));
                    }
                    let value = self.build_expression(self.next(&mut inner, &entry)?)?;
                    entries.push((key, value));
                }
                return Ok(ExpressionType::Map { meta, entries });
            }
            _ => return Err(self.unexpected(9, &pair)),
        };
        Ok(ExpressionType::Literal { meta, value })
    }
}

fn logical(
    meta: Meta,
    operator: LogicalOperator,
    left: ExpressionType,
    right: ExpressionType,
) -> ExpressionType {
    ExpressionType::Logical {
        meta,
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn binary_operator(symbol: &str) -> Option<BinaryOperator> {
    Some(match symbol {
        "+" => BinaryOperator::Add,
        "-" => BinaryOperator::Subtract,
        "*" => BinaryOperator::Multiply,
        "/" => BinaryOperator::Divide,
        "%" => BinaryOperator::Remainder,
        "==" => BinaryOperator::Equal,
        "!=" => BinaryOperator::NotEqual,
        "<" => BinaryOperator::Less,
        "<=" => BinaryOperator::LessOrEqual,
        ">" => BinaryOperator::Greater,
        ">=" => BinaryOperator::GreaterOrEqual,
        _ => return None,
    })
}

fn with_members(base: ExpressionType, members: Vec<String>, meta: Meta) -> ExpressionType {
    members
        .into_iter()
        .fold(base, |object, name| ExpressionType::Member {
            meta,
            object: Box::new(object),
            name,
        })
}

fn split_arguments(arguments: &[Argument]) -> (usize, Vec<&str>) {
    let positional = arguments.iter().filter(|a| a.name.is_none()).count();
    let named = arguments.iter().filter_map(|a| a.name.as_deref()).collect();
    (positional, named)
}

/// Names a body binds as variables: plain assignment targets and `for`
/// variables, at any depth.
fn collect_names(pair: Pair<Rule>, names: &mut HashSet<String>) {
    match pair.as_rule() {
        Rule::assignment => {
            if let Some(target) = pair.into_inner().next() {
                let mut inner = target.into_inner();
                if let (Some(p), None) = (inner.next(), inner.next()) {
                    if p.as_rule() == Rule::path {
                        let path = PathText::parse(p.as_str());
                        if path.is_simple() {
                            names.insert(path.segments[0].clone());
                        }
                    }
                }
            }
        }
        Rule::for_stmt => {
            for p in children(pair) {
                match p.as_rule() {
                    Rule::identifier => {
                        names.insert(p.as_str().to_string());
                    }
                    Rule::block => collect_names(p, names),
                    _ => {}
                }
            }
        }
        Rule::if_stmt | Rule::while_stmt | Rule::block => {
            for p in children(pair) {
                collect_names(p, names);
            }
        }
        _ => {}
    }
}

/// Functions that reach a `NotAsync` call, directly or through other
/// functions.
fn not_async_closure(traces: &[BodyTrace]) -> Vec<bool> {
    let mut blocked: Vec<bool> = traces.iter().map(|t| t.not_async).collect();
    let mut changed = true;
    while changed {
        changed = false;
        for (i, trace) in traces.iter().enumerate() {
            if !blocked[i] && trace.calls.iter().any(|c| blocked[*c]) {
                blocked[i] = true;
                changed = true;
            }
        }
    }
    blocked
}

/// Resolve escapes inside a string or character literal.
pub(crate) fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('u') => {
                let hex: String = chars
                    .by_ref()
                    .skip(1)
                    .take_while(|c| *c != '}')
                    .collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid unicode escape \\u{{{}}}", hex))?;
                out.push(
                    char::from_u32(code)
                        .ok_or_else(|| format!("invalid unicode escape \\u{{{}}}", hex))?,
                );
            }
            other => return Err(format!("invalid escape \\{}", other.unwrap_or(' '))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_maps_offsets() {
        let lines = LineIndex::new("a\nbc\n\nd");
        assert_eq!(lines.line_of(0), 0);
        assert_eq!(lines.line_of(2), 1);
        assert_eq!(lines.line_of(3), 1);
        assert_eq!(lines.line_of(5), 2);
        assert_eq!(lines.line_of(6), 3);
    }

    #[test]
    fn unescape_handles_every_escape() {
        assert_eq!(
            unescape(r#"a\n\t\r\0\\\"\'\u{e9}"#).unwrap(),
            "a\n\t\r\0\\\"'\u{e9}"
        );
        assert!(unescape(r"\u{110000}").is_err());
    }

    #[test]
    fn not_async_spreads_through_calls() {
        let traces = vec![
            BodyTrace {
                not_async: false,
                calls: vec![1],
            },
            BodyTrace {
                not_async: false,
                calls: vec![2],
            },
            BodyTrace {
                not_async: true,
                calls: vec![],
            },
            BodyTrace::default(),
        ];
        assert_eq!(not_async_closure(&traces), vec![true, true, true, false]);
    }
}
