//! Registration layer: the symbol registry modules contribute to.
//!
//! Every module owns one root [`Namespace`]. Namespaces nest, and hold
//! static methods, static fields, triggers, and types. A type
//! ([`TypeHandle`]) is attached to a host class and carries instance and
//! static members; extensions of the same class merge into it at lookup.
//!
//! ```text
//! Registry
//! └── game                     (module root)
//!     ├── spawn(kind, at)      (static method)
//!     ├── Player               (type: name, health, heal(n))
//!     └── world                (namespace)
//!         ├── time             (field)
//!         └── on_tick          (trigger)
//! ```
//!
//! Host callables are described by a [`BindingTarget`]: parameter kinds,
//! fallbacks for omitted arguments, null and pattern policies, and whether
//! the callable may run on a worker thread.
//!
//! ## Example
//!
//! ```
//! use helix::runner::ds::conversion::Kind;
//! use helix::runner::plugin::binding::{BindingTarget, Fallback, Param};
//! use helix::runner::plugin::registry::{ModuleInfo, Registry};
//!
//! let registry = Registry::new();
//! let root = registry
//!     .register_module(ModuleInfo::new("demo"), true)
//!     .unwrap();
//! root.method(
//!     BindingTarget::new("greet")
//!         .param(Param::new("who", Kind::Str).optional(Fallback::Str("world".into()))),
//!     |args| Ok(format!("hello, {}", args.get::<String>(0)?)),
//! )
//! .unwrap();
//! assert_eq!(root.method_names(), vec!["greet".to_string()]);
//! ```

pub mod args;
pub mod binding;
pub mod methods;
pub mod namespace;
pub mod registry;
pub mod types;

pub use args::Args;
pub use binding::{BindingTarget, Fallback, Param};
pub use methods::{Delegate, InstanceMethodSet, InstanceMethods, StaticMethodSet, StaticMethods};
pub use namespace::Namespace;
pub use registry::{ModuleInfo, Registry};
pub use types::TypeHandle;
