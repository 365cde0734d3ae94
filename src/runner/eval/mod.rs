//! Tree-walking evaluator for resolved programs.
//!
//! Statements produce [`Completion`] records; failures travel as
//! [`RunError`](crate::error::RunError) so a script error unwinds to the
//! outermost frame without panicking.

pub mod expression;
pub mod function;
pub mod statement;
pub mod types;

pub use function::RunContext;
pub use types::{Completion, CompletionType, EvalContext};
