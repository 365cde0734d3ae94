//! Script parser: pest grammar, resolved syntax tree, canonical writer.
//!
//! ```
//! use helix::parser::Parser;
//! use helix::runner::plugin::registry::Registry;
//!
//! let parser = Parser::new(Registry::new());
//! let script = parser.parse_str("x = 1 +   2 * 3").unwrap();
//! assert_eq!(script.compile(), "x = 1 + 2 * 3\n");
//!
//! let error = parser.parse_str("x = 1 +").unwrap_err();
//! assert_eq!(error.line_nr(), 1);
//! assert_eq!(error.line(), "x = 1 +");
//! ```

mod api;
pub mod ast;
mod build;
mod resolve;
#[allow(non_fmt_panics)]
#[cfg(test)]
mod unit_tests;
pub(crate) mod writer;

pub use api::{HelixParser, Parser, Rule, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_NESTING_DEPTH};
