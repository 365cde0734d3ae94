//! Error kinds surfaced by the engine.
//!
//! `SyntaxError` and `ScriptError` are user-attributable. `RegistrationError`
//! is a module author's fault and aborts that module's load.
//! `InternalError` means an invariant broke and is routed to the host's
//! fault handler.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::identifier::InvalidIdentifier;

/// A source that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    reason: String,
    line: String,
    line_index: usize,
    source_name: String,
}

impl SyntaxError {
    pub fn new(
        reason: impl Into<String>,
        line: impl Into<String>,
        line_index: usize,
        source_name: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        SyntaxError {
            reason: if reason.is_empty() {
                "Unknown parse error".to_string()
            } else {
                reason
            },
            line: line.into(),
            line_index,
            source_name: source_name.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The offending line, without its terminator.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// 0-based line index.
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    /// 1-based line number.
    pub fn line_nr(&self) -> usize {
        self.line_index + 1
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}\n    {}",
            self.source_name,
            self.line_nr(),
            self.reason,
            self.line
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Runtime failure caused by script content or user supplied arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        ScriptError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Invariant violation inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal error: {0}")]
pub struct InternalError(pub String);

/// Which member map a duplicate key collided in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Namespace,
    Type,
    Method,
    Field,
    Trigger,
    InstanceMethod,
    InstanceField,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Namespace => "namespace",
            MemberKind::Type => "type",
            MemberKind::Method => "method",
            MemberKind::Field => "field",
            MemberKind::Trigger => "trigger",
            MemberKind::InstanceMethod => "instance method",
            MemberKind::InstanceField => "instance field",
        };
        f.write_str(name)
    }
}

/// Programmer fault detected while a module registers its members.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("{kind} '{key}' is already registered in '{namespace}'")]
    AlreadyRegistered {
        kind: MemberKind,
        key: String,
        namespace: String,
    },
    #[error("invalid binding shape for '{target}': {reason}")]
    InvalidBindingShape { target: String, reason: String },
    #[error("fallback for parameter '{param}' of '{target}' is invalid: {reason}")]
    InvalidFallback {
        target: String,
        param: String,
        reason: String,
    },
    #[error("pattern for parameter '{param}' does not compile: {reason}")]
    InvalidPattern { param: String, reason: String },
    #[error("unknown module '{0}'")]
    UnknownModule(String),
    #[error("module '{0}' is already loaded")]
    DuplicateModule(String),
    #[error("module '{module}' failed to load: {reason}")]
    ModuleLoad { module: String, reason: String },
}

/// Why a run stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    TimedOut,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled"),
            CancelReason::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Outcome of a script run that did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("script run {0}")]
    Cancelled(CancelReason),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl RunError {
    pub fn script(message: impl Into<String>) -> Self {
        RunError::Script(ScriptError::new(message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RunError::Internal(InternalError(message.into()))
    }

    pub fn as_script_error(&self) -> Option<&ScriptError> {
        match self {
            RunError::Script(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to turn a source into a script.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("cannot read '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl ParseError {
    pub fn as_syntax_error(&self) -> Option<&SyntaxError> {
        match self {
            ParseError::Syntax(e) => Some(e),
            ParseError::Io { .. } => None,
        }
    }
}

/// Rejected direct activation of a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error("trigger '{0}' does not accept null")]
    NullValue(String),
    #[error("trigger '{trigger}' expects {expected}, got {actual}")]
    TypeMismatch {
        trigger: String,
        expected: String,
        actual: String,
    },
    #[error("trigger '{0}' is no longer registered")]
    Unregistered(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for host code that does not care which stage failed.
#[derive(Debug, Error)]
pub enum HelixError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Post(#[from] PostError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<SyntaxError> for HelixError {
    fn from(e: SyntaxError) -> Self {
        HelixError::Parse(ParseError::Syntax(e))
    }
}

impl From<ScriptError> for HelixError {
    fn from(e: ScriptError) -> Self {
        HelixError::Run(RunError::Script(e))
    }
}
