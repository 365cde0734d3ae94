//! Script function calls and run entry points.

use std::cell::Cell;

use crate::error::RunError;
use crate::parser::ast::{Block, Program};
use crate::runner::ds::value::Value;
use crate::runner::plugin::registry::Registry;
use crate::runner::threading::CancelToken;
use crate::script::dictionary::Dictionary;

use super::expression::evaluate_arguments;
use super::statement::{execute_block, execute_statements};
use super::types::{script_error, Completion, CompletionType, EvalContext, ValueResult};

/// Call the script function at `index` with already evaluated arguments.
///
/// Functions see only their parameters; the caller's frame is not visible.
pub fn call_function(index: usize, args: Vec<Value>, ctx: &mut EvalContext) -> ValueResult {
    let program = ctx.program;
    let function = match program.functions.get(index) {
        Some(f) => f,
        None => return Err(RunError::internal(format!("no function at index {}", index))),
    };
    if args.len() != function.params.len() {
        return script_error(format!(
            "'{}' takes {} argument(s), got {}",
            function.name,
            function.params.len(),
            args.len()
        ));
    }
    let mut frame = Dictionary::new();
    for (param, arg) in function.params.iter().zip(args) {
        frame.set(param, arg);
    }
    let mut child = ctx.child(&mut frame)?;
    let completion = execute_block(&function.body, &mut child)?;
    match completion.completion_type {
        CompletionType::Return => Ok(completion.get_value()),
        CompletionType::Normal | CompletionType::Stop => Ok(Value::Null),
        CompletionType::Break | CompletionType::Continue => stray(&completion),
    }
}

fn stray<T>(completion: &Completion) -> Result<T, RunError> {
    let keyword = match completion.completion_type {
        CompletionType::Break => "break",
        _ => "continue",
    };
    script_error(format!("'{}' outside of a loop", keyword))
}

/// Shared run parameters.
pub struct RunContext<'a> {
    pub program: &'a Program,
    pub registry: &'a Registry,
    pub cancel: &'a CancelToken,
    pub max_depth: usize,
}

impl RunContext<'_> {
    fn finish(completion: Completion) -> Result<(), RunError> {
        match completion.completion_type {
            CompletionType::Break | CompletionType::Continue => stray(&completion),
            _ => Ok(()),
        }
    }

    /// Run the top level statements of the program against `frame`.
    pub fn run_program(&self, frame: &mut Dictionary) -> Result<(), RunError> {
        let stopped = Cell::new(false);
        let mut ctx = EvalContext::new(
            frame,
            self.program,
            self.registry,
            self.cancel,
            &stopped,
            self.max_depth,
        );
        let completion = execute_statements(self.program.statements(), &mut ctx)?;
        Self::finish(completion)
    }

    /// Run one listener body against the dictionary its trigger filled.
    pub fn run_listener(&self, index: usize, frame: &mut Dictionary) -> Result<(), RunError> {
        let body: &Block = match self.program.listeners.get(index) {
            Some(listener) => &listener.body,
            None => return Err(RunError::internal(format!("no listener at index {}", index))),
        };
        let stopped = Cell::new(false);
        let mut ctx = EvalContext::new(
            frame,
            self.program,
            self.registry,
            self.cancel,
            &stopped,
            self.max_depth,
        );
        let completion = execute_block(body, &mut ctx)?;
        Self::finish(completion)
    }

    /// Evaluate a listener's trigger arguments in an empty frame.
    pub fn listener_arguments(
        &self,
        index: usize,
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), RunError> {
        let listener = match self.program.listeners.get(index) {
            Some(listener) => listener,
            None => return Err(RunError::internal(format!("no listener at index {}", index))),
        };
        let mut frame = Dictionary::new();
        let stopped = Cell::new(false);
        let mut ctx = EvalContext::new(
            &mut frame,
            self.program,
            self.registry,
            self.cancel,
            &stopped,
            self.max_depth,
        );
        evaluate_arguments(&listener.arguments, &mut ctx)
    }
}
