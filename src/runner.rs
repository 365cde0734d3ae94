//! Everything that runs: the value domain, the registry and binding
//! layer, the evaluator, triggers and the event bus, and threading.

pub mod ds;
pub mod eval;
pub mod plugin;
pub mod std_lib;
pub mod threading;
pub mod trigger;
