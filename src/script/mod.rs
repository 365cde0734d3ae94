//! Sources, variable frames, and compiled scripts.

pub mod compiled;
pub mod dictionary;
pub mod source;

pub use compiled::{RunOptions, Script};
pub use dictionary::Dictionary;
pub use source::{FileSource, Source, StringSource, WritableSource, STRING_SOURCE_NAME};
