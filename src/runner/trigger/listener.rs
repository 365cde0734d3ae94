//! Listeners: a script's `on` block attached to a trigger.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::runner::ds::class::AnyRef;
use crate::runner::plugin::registry::TriggerId;
use crate::script::compiled::Script;
use crate::script::dictionary::Dictionary;

use super::{DynTrigger, PredicateFn};

/// Identity of an attached listener, handed out by
/// [`EventBus::attach`](super::EventBus::attach).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub(crate) fn new() -> Self {
        ListenerId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decides whether the listener's block runs for a value.
#[derive(Clone)]
pub(crate) enum ListenerHandler {
    /// Shared predicate of the trigger.
    Predicate(Arc<PredicateFn>),
    /// Trigger instance built from this listener's arguments.
    Instance(Arc<dyn DynTrigger>),
}

pub(crate) struct Listener {
    pub id: ListenerId,
    pub trigger: TriggerId,
    pub path: String,
    pub script: Script,
    /// Position of the block among the script's listeners.
    pub index: usize,
    pub handler: ListenerHandler,
    pub asynchronous: bool,
    registered: AtomicBool,
}

impl Listener {
    pub fn new(
        trigger: TriggerId,
        path: String,
        script: Script,
        index: usize,
        handler: ListenerHandler,
        asynchronous: bool,
    ) -> Self {
        Listener {
            id: ListenerId::new(),
            trigger,
            path,
            script,
            index,
            handler,
            asynchronous,
            registered: AtomicBool::new(false),
        }
    }

    pub fn handle(&self, value: Option<&AnyRef>, dict: &mut Dictionary) -> bool {
        match &self.handler {
            ListenerHandler::Predicate(p) => p(value, dict),
            ListenerHandler::Instance(h) => h.handle(value, dict),
        }
    }

    /// Run the register hook unless it already ran for this listener.
    pub fn register(&self) {
        if let ListenerHandler::Instance(h) = &self.handler {
            if !self.registered.swap(true, Ordering::SeqCst) {
                h.on_register();
            }
        }
    }

    /// Run the unregister hook if the register hook ran.
    pub fn unregister(&self) {
        if let ListenerHandler::Instance(h) = &self.handler {
            if self.registered.swap(false, Ordering::SeqCst) {
                h.on_unregister();
            }
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("trigger", &self.path)
            .field("script", &self.script.source_name())
            .field("asynchronous", &self.asynchronous)
            .finish()
    }
}
