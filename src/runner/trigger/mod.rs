//! Triggers: typed activation points that decide whether a listener's
//! block runs for a given event.
//!
//! A trigger is registered either with a plain predicate over
//! `(value, dictionary)` or as a [`Trigger`] implementation. The latter is
//! instantiated once per listener from the arguments written in the
//! script's `on` line, and receives lifecycle hooks for that listener.

pub mod event_bus;
pub mod listener;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ScriptError;
use crate::runner::ds::class::AnyRef;
use crate::runner::plugin::args::Args;
use crate::runner::plugin::binding::Param;
use crate::runner::plugin::registry::{Registry, TriggerId};
use crate::script::dictionary::Dictionary;

pub use event_bus::{ErrorSink, EventBus, FaultKind, ListenerFault};
pub use listener::ListenerId;

/// Trigger with constructor parameters and listener lifecycle hooks.
///
/// Use `Value = ()` for simple triggers that are activated without a value.
pub trait Trigger: Send + Sync + Sized + 'static {
    type Value: Any + Send + Sync;

    /// Script-visible constructor parameters.
    fn params() -> Vec<Param> {
        Vec::new()
    }

    fn new(args: &Args<'_>) -> Result<Self, ScriptError>;

    /// Whether listeners may run on worker threads.
    fn allows_async() -> bool {
        false
    }

    fn on_listener_register(&self) {}

    /// Decide whether the listener runs, optionally exposing variables to
    /// it through `dict`.
    fn handle(&self, value: &Self::Value, dict: &mut Dictionary) -> bool {
        let _ = (value, dict);
        true
    }

    fn on_listener_unregister(&self) {}
}

/// Object-safe view of a [`Trigger`] instance.
pub(crate) trait DynTrigger: Send + Sync {
    fn on_register(&self);
    fn on_unregister(&self);
    fn handle(&self, value: Option<&AnyRef>, dict: &mut Dictionary) -> bool;
}

impl<H: Trigger> DynTrigger for H {
    fn on_register(&self) {
        self.on_listener_register()
    }

    fn on_unregister(&self) {
        self.on_listener_unregister()
    }

    fn handle(&self, value: Option<&AnyRef>, dict: &mut Dictionary) -> bool {
        let value = match value {
            Some(v) => v.downcast_ref::<H::Value>(),
            None => (&() as &dyn Any).downcast_ref::<H::Value>(),
        };
        match value {
            Some(v) => Trigger::handle(self, v, dict),
            None => false,
        }
    }
}

pub(crate) type PredicateFn = dyn Fn(Option<&AnyRef>, &mut Dictionary) -> bool + Send + Sync;
pub(crate) type TriggerFactory =
    dyn Fn(&Args<'_>) -> Result<Arc<dyn DynTrigger>, ScriptError> + Send + Sync;

pub(crate) fn predicate<F>(f: F) -> Arc<PredicateFn>
where
    F: Fn(Option<&AnyRef>, &mut Dictionary) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn factory<F>(f: F) -> Arc<TriggerFactory>
where
    F: Fn(&Args<'_>) -> Result<Arc<dyn DynTrigger>, ScriptError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub(crate) enum TriggerHandler {
    Predicate(Arc<PredicateFn>),
    Factory(Arc<TriggerFactory>),
}

/// Handle to a registered trigger.
#[derive(Clone)]
pub struct TriggerRef {
    registry: Registry,
    id: TriggerId,
    path: String,
}

impl TriggerRef {
    pub(crate) fn new(registry: Registry, id: TriggerId, path: String) -> Self {
        TriggerRef { registry, id, path }
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// Qualified name, e.g. `game:player.on_join`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Let listeners of this trigger run on worker threads.
    pub fn allow_async(&self) -> &Self {
        self.registry.set_trigger_async(self.id, true);
        self
    }
}

impl fmt::Debug for TriggerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TriggerRef({})", self.path)
    }
}
