//! Core types for the evaluation engine.

use std::cell::Cell;

use crate::error::{RunError, ScriptError};
use crate::parser::ast::Program;
use crate::runner::ds::value::Value;
use crate::runner::plugin::registry::Registry;
use crate::runner::threading::CancelToken;
use crate::script::dictionary::Dictionary;

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionType {
    /// Execution continues with the next statement.
    Normal,
    /// A function returns.
    Return,
    /// Leave the innermost loop.
    Break,
    /// Next iteration of the innermost loop.
    Continue,
    /// End the whole run.
    Stop,
}

/// Completion record. Every statement evaluation returns one.
#[derive(Debug, Clone)]
pub struct Completion {
    pub completion_type: CompletionType,
    /// Value of a return completion.
    pub value: Option<Value>,
}

impl Completion {
    /// Create a normal completion.
    pub fn normal() -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: None,
        }
    }

    /// Create a return completion.
    pub fn return_value(value: Value) -> Self {
        Completion {
            completion_type: CompletionType::Return,
            value: Some(value),
        }
    }

    pub fn break_completion() -> Self {
        Completion {
            completion_type: CompletionType::Break,
            value: None,
        }
    }

    pub fn continue_completion() -> Self {
        Completion {
            completion_type: CompletionType::Continue,
            value: None,
        }
    }

    pub fn stop() -> Self {
        Completion {
            completion_type: CompletionType::Stop,
            value: None,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.completion_type == CompletionType::Normal
    }

    pub fn is_abrupt(&self) -> bool {
        !self.is_normal()
    }

    /// Value of a return, or null.
    pub fn get_value(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }
}

pub type EvalResult = Result<Completion, RunError>;
pub type ValueResult = Result<Value, RunError>;

/// Shorthand for a script error result.
pub(crate) fn script_error<T>(message: impl Into<String>) -> Result<T, RunError> {
    Err(RunError::Script(ScriptError::new(message)))
}

/// State of one running frame.
///
/// Script functions get a child context with their own dictionary; the
/// program, registry, cancellation token, and stop flag are shared.
pub struct EvalContext<'a> {
    pub frame: &'a mut Dictionary,
    pub program: &'a Program,
    pub registry: &'a Registry,
    pub cancel: &'a CancelToken,
    stopped: &'a Cell<bool>,
    depth: usize,
    max_depth: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        frame: &'a mut Dictionary,
        program: &'a Program,
        registry: &'a Registry,
        cancel: &'a CancelToken,
        stopped: &'a Cell<bool>,
        max_depth: usize,
    ) -> Self {
        EvalContext {
            frame,
            program,
            registry,
            cancel,
            stopped,
            depth: 0,
            max_depth,
        }
    }

    /// Context for a script function call, one level deeper.
    pub fn child<'b>(&'b self, frame: &'b mut Dictionary) -> Result<EvalContext<'b>, RunError> {
        if self.depth + 1 > self.max_depth {
            return script_error(format!(
                "maximum call depth of {} exceeded",
                self.max_depth
            ));
        }
        Ok(EvalContext {
            frame,
            program: self.program,
            registry: self.registry,
            cancel: self.cancel,
            stopped: self.stopped,
            depth: self.depth + 1,
            max_depth: self.max_depth,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Abort if the run was cancelled or timed out.
    pub fn check_cancelled(&self) -> Result<(), RunError> {
        self.cancel.check().map_err(RunError::Cancelled)
    }

    pub fn request_stop(&self) {
        self.stopped.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}
