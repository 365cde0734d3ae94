//! The built-in `helix` module.
//!
//! Registered before any host module and resolved after all of them, so a
//! module may shadow a built-in name for its own scripts.
//!
//! ```text
//! helix
//! ├── log len str int float range type_of
//! ├── math   abs min max floor ceil round sqrt pow
//! ├── text   upper lower trim contains starts_with ends_with split join replace group
//! ├── list   contains append reverse sort
//! └── time   millis seconds of_millis
//! ```

pub mod core;
pub mod list;
pub mod math;
pub mod text;
pub mod time;

use tracing::debug;

use crate::error::RegistrationError;
use crate::runner::plugin::namespace::Namespace;
use crate::runner::plugin::registry::{ModuleInfo, Registry};

pub const MODULE_ID: &str = "helix";

/// Register the built-in module into `registry`.
pub fn register(registry: &Registry) -> Result<Namespace, RegistrationError> {
    let info = ModuleInfo {
        id: MODULE_ID.to_string(),
        name: "Helix".to_string(),
        description: "Built-in functions".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        author: String::new(),
    };
    let root = registry.add_module(info, true, true)?;
    core::register(&root)?;
    math::register(&root.namespace("math")?)?;
    text::register(&root.namespace("text")?)?;
    list::register(&root.namespace("list")?)?;
    time::register(&root.namespace("time")?)?;
    debug!(target: "helix::registry", "built-in module registered");
    Ok(root)
}
