//! # helix - embeddable scripting for host applications
//!
//! Host code exposes its objects, operations, and event sources through a
//! typed registry; end users write small line-oriented scripts against
//! those names; the event bus runs script blocks when host events occur.
//!
//! - PEG parser ([pest]) with parse-time name resolution
//! - Tree-walking interpreter with cooperative cancellation
//! - Registry of namespaces, types, extensions, and triggers
//! - Binding layer with null, fallback, and pattern policies
//! - Event bus with a work-stealing pool for asynchronous listeners
//!
//! ## Quick Start
//!
//! ```
//! use helix::runner::ds::conversion::Kind;
//! use helix::runner::plugin::binding::{BindingTarget, Param};
//! use helix::runner::plugin::registry::ModuleInfo;
//! use helix::{EngineConfig, Helix};
//!
//! let helix = Helix::new(EngineConfig::default()).unwrap();
//! let root = helix
//!     .registry()
//!     .register_module(ModuleInfo::new("shop"), true)
//!     .unwrap();
//! root.method(
//!     BindingTarget::new("price").param(Param::new("item", Kind::Str).not_null()),
//!     |args| Ok(args.get::<String>(0)?.len() as i64 * 10),
//! )
//! .unwrap();
//!
//! let script = helix
//!     .parser()
//!     .parse_str("total = 0\nfor item in [\"tea\", \"cake\"] {\n    total += price(item)\n}")
//!     .unwrap();
//! let mut dict = helix.dict();
//! script.run_with(&mut dict).unwrap();
//! assert_eq!(dict.get("total").unwrap().as_int(), Some(70));
//! ```
//!
//! ## Events
//!
//! ```
//! use helix::{EngineConfig, Helix};
//!
//! struct Saved {
//!     name: String,
//! }
//!
//! let helix = Helix::new(EngineConfig::default()).unwrap();
//! let root = helix
//!     .registry()
//!     .register_module(helix::ModuleInfo::new("files"), true)
//!     .unwrap();
//! root.trigger::<Saved, _>("on_save", |event, dict| {
//!     dict.put("file", event.name.as_str()).is_ok()
//! })
//! .unwrap();
//!
//! let script = helix.parser().parse_str("on on_save {\n    log(file)\n}").unwrap();
//! helix.event_bus().attach(&script).unwrap();
//! helix.event_bus().post(Saved { name: "notes.txt".into() });
//! assert_eq!(helix.event_bus().process_pending(), 1);
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - grammar, resolved syntax tree, canonical writer
//! - **[`script`]** - sources, dictionaries, compiled scripts
//! - **[`runner`]** - everything that runs
//!   - **[`runner::plugin`]** - registry, namespaces, types, binding layer
//!   - **[`runner::ds`]** - values, classes, conversions, durations
//!   - **[`runner::eval`]** - tree-walking interpreter
//!   - **[`runner::trigger`]** - triggers, listeners, event bus
//!   - **[`runner::threading`]** - worker pool, cancellation
//!   - **[`runner::std_lib`]** - the built-in `helix` module

#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod config;
pub mod error;
pub mod identifier;
pub mod parser;
pub mod runner;
pub mod script;

pub use api::{Helix, Module};
pub use config::EngineConfig;
pub use error::{
    HelixError, ParseError, PostError, RegistrationError, RunError, ScriptError, SyntaxError,
};
pub use runner::ds::value::Value;
pub use runner::plugin::{ModuleInfo, Namespace, Registry};
pub use runner::trigger::{EventBus, Trigger, TriggerRef};
pub use script::{Dictionary, RunOptions, Script, Source, StringSource};
