//! Value domain shared by the registry, the evaluator and the event bus.

pub mod class;
pub mod conversion;
pub mod duration;
pub mod value;
