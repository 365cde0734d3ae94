//! Compiled, re-runnable scripts.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::RunError;
use crate::parser::ast::{ListenerDecl, Program};
use crate::parser::writer::write_program;
use crate::runner::eval::RunContext;
use crate::runner::plugin::registry::Registry;
use crate::runner::threading::CancelToken;
use crate::script::dictionary::Dictionary;

/// Per-run knobs for [`Script::run_with_options`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: CancelToken,
    pub timeout: Option<Duration>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn token(&self) -> CancelToken {
        match self.timeout {
            Some(timeout) => self.cancel.with_timeout(timeout),
            None => self.cancel.clone(),
        }
    }
}

struct CompiledScript {
    program: Program,
    registry: Registry,
    max_call_depth: usize,
}

/// A parsed program bound to the registry it was resolved against.
///
/// Cloning is cheap; clones share the compiled program. Scripts are
/// immutable, so one script may run on several threads at once, each run
/// with its own dictionary.
#[derive(Clone)]
pub struct Script {
    inner: Arc<CompiledScript>,
}

impl Script {
    pub(crate) fn new(program: Program, registry: Registry, max_call_depth: usize) -> Self {
        Script {
            inner: Arc::new(CompiledScript {
                program,
                registry,
                max_call_depth,
            }),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.inner.program.source_name
    }

    /// Run against an empty dictionary.
    pub fn run(&self) -> Result<(), RunError> {
        self.run_with(&mut Dictionary::new())
    }

    /// Run against `dict`; writes made by the script stay visible in it.
    pub fn run_with(&self, dict: &mut Dictionary) -> Result<(), RunError> {
        self.run_with_options(dict, &RunOptions::default())
    }

    pub fn run_with_options(
        &self,
        dict: &mut Dictionary,
        options: &RunOptions,
    ) -> Result<(), RunError> {
        debug!(target: "helix::eval", script = self.source_name(), "run");
        let cancel = options.token();
        self.run_context(&cancel).run_program(dict)
    }

    /// Canonical text of the script.
    pub fn compile(&self) -> String {
        write_program(&self.inner.program)
    }

    /// Write the canonical text to `out`.
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.compile().as_bytes())?;
        out.flush()
    }

    pub fn program(&self) -> &Program {
        &self.inner.program
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn listeners(&self) -> &[ListenerDecl] {
        &self.inner.program.listeners
    }

    pub(crate) fn run_context<'a>(&'a self, cancel: &'a CancelToken) -> RunContext<'a> {
        RunContext {
            program: &self.inner.program,
            registry: &self.inner.registry,
            cancel,
            max_depth: self.inner.max_call_depth,
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Script) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.source_name())
    }
}
