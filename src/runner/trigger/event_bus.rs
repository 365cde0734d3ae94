//! Event bus: routes posted host objects to the listeners of every
//! trigger that accepts them.
//!
//! `post` and `post_to` only enqueue, so they may be called from any
//! thread. The host's main thread drains the queue with
//! [`EventBus::process_pending`]. For every listener of a matching trigger
//! the bus fills a fresh dictionary through the trigger's handler and, if
//! the handler accepts, runs the listener block inline or on the worker
//! pool depending on the listener's async flag.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::error::{PostError, RunError};
use crate::runner::ds::class::{AnyRef, Class};
use crate::runner::ds::value::{HostObject, Value};
use crate::runner::plugin::args::Args;
use crate::runner::plugin::registry::{Registry, TriggerId};
use crate::runner::threading::{CancelToken, WorkerPool};
use crate::script::compiled::Script;
use crate::script::dictionary::Dictionary;

use super::listener::{Listener, ListenerHandler, ListenerId};
use super::{TriggerHandler, TriggerRef};

/// What went wrong in a listener run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The script failed; attributable to its author.
    Script,
    /// The run was cancelled or hit the run timeout.
    Cancelled,
    Internal,
    /// The trigger handler or listener block panicked.
    Panic,
}

/// Report passed to the bus error sink.
#[derive(Debug, Clone)]
pub struct ListenerFault {
    pub listener: ListenerId,
    pub trigger: String,
    pub script: String,
    pub message: String,
    pub kind: FaultKind,
}

impl fmt::Display for ListenerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.script, self.trigger, self.message)
    }
}

pub type ErrorSink = dyn Fn(&ListenerFault) + Send + Sync;

fn log_fault(fault: &ListenerFault) {
    match fault.kind {
        FaultKind::Script | FaultKind::Cancelled => {
            warn!(target: "helix::bus", "listener failed: {}", fault)
        }
        FaultKind::Internal | FaultKind::Panic => {
            error!(target: "helix::bus", "listener fault: {}", fault)
        }
    }
}

enum Pending {
    /// Object posted to every trigger that accepts its class.
    Event(HostObject),
    /// Direct activation of one trigger.
    Direct {
        trigger: TriggerId,
        value: Option<HostObject>,
    },
}

#[derive(Default)]
struct ListenerTable {
    entries: IndexMap<ListenerId, Arc<Listener>>,
    by_trigger: HashMap<TriggerId, Vec<ListenerId>>,
}

impl ListenerTable {
    fn insert(&mut self, listener: Arc<Listener>) {
        self.by_trigger
            .entry(listener.trigger)
            .or_default()
            .push(listener.id);
        self.entries.insert(listener.id, listener);
    }

    fn remove(&mut self, id: ListenerId) -> Option<Arc<Listener>> {
        let listener = self.entries.shift_remove(&id)?;
        if let Some(ids) = self.by_trigger.get_mut(&listener.trigger) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_trigger.remove(&listener.trigger);
            }
        }
        Some(listener)
    }

    fn of_trigger(&self, trigger: TriggerId) -> Vec<Arc<Listener>> {
        self.by_trigger
            .get(&trigger)
            .map(|ids| ids.iter().filter_map(|id| self.entries.get(id).cloned()).collect())
            .unwrap_or_default()
    }
}

/// Matching triggers per posted class, valid for one registry generation.
#[derive(Default)]
struct DispatchCache {
    generation: u64,
    by_class: HashMap<Class, Arc<Vec<TriggerId>>>,
}

/// State a listener run needs; shared with worker jobs.
struct RunShared {
    error_sink: RwLock<Arc<ErrorSink>>,
    run_timeout: Option<Duration>,
}

impl RunShared {
    fn report(&self, listener: &Listener, kind: FaultKind, message: String) {
        let fault = ListenerFault {
            listener: listener.id,
            trigger: listener.path.clone(),
            script: listener.script.source_name().to_string(),
            message,
            kind,
        };
        let sink = self.error_sink.read().clone();
        sink(&fault);
    }

    fn run(&self, listener: &Listener, mut dict: Dictionary) {
        let cancel = match self.run_timeout {
            Some(timeout) => CancelToken::new().with_timeout(timeout),
            None => CancelToken::new(),
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            listener
                .script
                .run_context(&cancel)
                .run_listener(listener.index, &mut dict)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(RunError::Script(e))) => {
                self.report(listener, FaultKind::Script, e.message().to_string())
            }
            Ok(Err(e @ RunError::Cancelled(_))) => {
                self.report(listener, FaultKind::Cancelled, e.to_string())
            }
            Ok(Err(RunError::Internal(e))) => {
                self.report(listener, FaultKind::Internal, e.to_string())
            }
            Err(_) => self.report(listener, FaultKind::Panic, "listener panicked".to_string()),
        }
    }
}

struct BusInner {
    registry: Registry,
    queue: SegQueue<Pending>,
    listeners: RwLock<ListenerTable>,
    cache: Mutex<DispatchCache>,
    pool: WorkerPool,
    shared: Arc<RunShared>,
}

/// Dispatches host events to attached script listeners.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new(
        registry: Registry,
        worker_threads: usize,
        run_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let default_sink: Arc<ErrorSink> = Arc::new(log_fault);
        Ok(EventBus {
            inner: Arc::new(BusInner {
                registry,
                queue: SegQueue::new(),
                listeners: RwLock::new(ListenerTable::default()),
                cache: Mutex::new(DispatchCache::default()),
                pool: WorkerPool::new(worker_threads)?,
                shared: Arc::new(RunShared {
                    error_sink: RwLock::new(default_sink),
                    run_timeout,
                }),
            }),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Replace the channel listener faults are reported through. The
    /// default logs them.
    pub fn set_error_sink<F>(&self, sink: F)
    where
        F: Fn(&ListenerFault) + Send + Sync + 'static,
    {
        *self.inner.shared.error_sink.write() = Arc::new(sink);
    }

    // ── posting ──────────────────────────────────────────────────────

    /// Queue `event` for every trigger whose declared class accepts it.
    pub fn post<E: Any + Send + Sync>(&self, event: E) {
        self.post_object(HostObject::new(event));
    }

    pub fn post_object(&self, object: HostObject) {
        trace!(target: "helix::bus", "queued {}", object.class());
        self.inner.queue.push(Pending::Event(object));
    }

    /// Queue a direct activation of `trigger`, bypassing the class filter.
    ///
    /// Null is accepted only by triggers without a value class; objects
    /// must be assignable to the declared class.
    pub fn post_to(&self, trigger: &TriggerRef, value: Value) -> Result<(), PostError> {
        let snapshot = self
            .inner
            .registry
            .trigger(trigger.id())
            .ok_or_else(|| PostError::Unregistered(trigger.path().to_string()))?;
        let value = match (snapshot.class, value) {
            (None, Value::Null) => None,
            (Some(_), Value::Null) => return Err(PostError::NullValue(snapshot.path)),
            (Some(declared), Value::Object(object))
                if self.inner.registry.is_assignable(object.class(), declared) =>
            {
                Some(object)
            }
            (declared, other) => {
                return Err(PostError::TypeMismatch {
                    trigger: snapshot.path,
                    expected: declared.map_or("no value".to_string(), |c| c.to_string()),
                    actual: other.describe(),
                })
            }
        };
        self.inner.queue.push(Pending::Direct {
            trigger: trigger.id(),
            value,
        });
        Ok(())
    }

    /// Dispatch everything queued so far. Call from the main thread.
    /// Returns the number of posts processed.
    pub fn process_pending(&self) -> usize {
        let mut processed = 0;
        while let Some(pending) = self.inner.queue.pop() {
            match pending {
                Pending::Event(object) => {
                    for trigger in self.matching(object.class()).iter() {
                        self.deliver(*trigger, Some(&object));
                    }
                }
                Pending::Direct { trigger, value } => self.deliver(trigger, value.as_ref()),
            }
            processed += 1;
        }
        processed
    }

    /// Block until asynchronous listener runs have finished.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.pool.wait_idle(timeout)
    }

    fn matching(&self, class: Class) -> Arc<Vec<TriggerId>> {
        let generation = self.inner.registry.generation();
        let mut cache = self.inner.cache.lock();
        if cache.generation != generation {
            cache.by_class.clear();
            cache.generation = generation;
        }
        let registry = &self.inner.registry;
        cache
            .by_class
            .entry(class)
            .or_insert_with(|| Arc::new(registry.triggers_for(class)))
            .clone()
    }

    fn deliver(&self, trigger: TriggerId, object: Option<&HostObject>) {
        let snapshot = match self.inner.registry.trigger(trigger) {
            Some(s) => s,
            None => return,
        };
        let listeners = self.inner.listeners.read().of_trigger(trigger);
        if listeners.is_empty() {
            return;
        }
        let projection = match (object, snapshot.class) {
            (Some(o), Some(declared)) => self.inner.registry.projection(o.class(), declared),
            _ => None,
        };
        let view: Option<&AnyRef> = match (object, &projection) {
            (Some(o), Some(p)) => p.apply(o.as_any()),
            _ => None,
        };
        debug!(
            target: "helix::bus",
            "{} listener(s) for {}",
            listeners.len(),
            snapshot.path
        );
        for listener in listeners {
            self.fire(listener, view);
        }
    }

    fn fire(&self, listener: Arc<Listener>, value: Option<&AnyRef>) {
        let mut dict = Dictionary::new();
        let accepted = panic::catch_unwind(AssertUnwindSafe(|| listener.handle(value, &mut dict)));
        match accepted {
            Ok(true) => {}
            Ok(false) => {
                trace!(target: "helix::bus", "{} vetoed listener {}", listener.path, listener.id);
                return;
            }
            Err(_) => {
                self.inner.shared.report(
                    &listener,
                    FaultKind::Panic,
                    "trigger handler panicked".to_string(),
                );
                return;
            }
        }
        if listener.asynchronous {
            let shared = self.inner.shared.clone();
            self.inner.pool.spawn(move || shared.run(&listener, dict));
        } else {
            self.inner.shared.run(&listener, dict);
        }
    }

    // ── listeners ────────────────────────────────────────────────────

    /// Attach every `on` block of `script`. Trigger arguments are evaluated
    /// and each trigger instance is built before anything is attached, so a
    /// failure leaves the bus unchanged.
    pub fn attach(&self, script: &Script) -> Result<Vec<ListenerId>, RunError> {
        if !script.registry().same(&self.inner.registry) {
            return Err(RunError::internal(format!(
                "'{}' was parsed against another registry",
                script.source_name()
            )));
        }
        let mut built = Vec::with_capacity(script.listeners().len());
        for (index, decl) in script.listeners().iter().enumerate() {
            built.push(Arc::new(self.build_listener(script, index, decl.trigger, decl.asynchronous)?));
        }
        let ids: Vec<ListenerId> = built.iter().map(|l| l.id).collect();
        {
            let mut table = self.inner.listeners.write();
            for listener in &built {
                table.insert(listener.clone());
            }
        }
        for listener in &built {
            debug!(
                target: "helix::bus",
                "attached {} from {} to {}",
                listener.id,
                script.source_name(),
                listener.path
            );
            listener.register();
        }
        Ok(ids)
    }

    fn build_listener(
        &self,
        script: &Script,
        index: usize,
        trigger: TriggerId,
        asynchronous: bool,
    ) -> Result<Listener, RunError> {
        let registry = &self.inner.registry;
        let snapshot = match registry.trigger(trigger) {
            Some(s) => s,
            None => {
                let key = registry.trigger_key(trigger).unwrap_or_default();
                return Err(RunError::script(format!(
                    "trigger '{}' is no longer registered",
                    key
                )));
            }
        };
        let handler = match &snapshot.handler {
            TriggerHandler::Predicate(p) => ListenerHandler::Predicate(p.clone()),
            TriggerHandler::Factory(build) => {
                let cancel = CancelToken::new();
                let (positional, named) = script.run_context(&cancel).listener_arguments(index)?;
                let signature = match &snapshot.signature {
                    Some(s) => s.clone(),
                    None => {
                        return Err(RunError::internal(format!(
                            "trigger '{}' has no signature",
                            snapshot.path
                        )))
                    }
                };
                let values = signature.bind(positional, named, &|a, b| registry.is_assignable(a, b))?;
                let args = Args::new(&signature, values, registry);
                ListenerHandler::Instance(build(&args)?)
            }
        };
        Ok(Listener::new(
            trigger,
            snapshot.path,
            script.clone(),
            index,
            handler,
            asynchronous && snapshot.allow_async,
        ))
    }

    /// Detach one listener. Returns false if it was not attached.
    pub fn detach(&self, id: ListenerId) -> bool {
        let removed = self.inner.listeners.write().remove(id);
        match removed {
            Some(listener) => {
                debug!(target: "helix::bus", "detached {} from {}", id, listener.path);
                listener.unregister();
                true
            }
            None => false,
        }
    }

    /// Detach every listener that came from `script`.
    pub fn detach_script(&self, script: &Script) -> usize {
        let ids: Vec<ListenerId> = self
            .inner
            .listeners
            .read()
            .entries
            .values()
            .filter(|l| l.script.ptr_eq(script))
            .map(|l| l.id)
            .collect();
        ids.into_iter().filter(|id| self.detach(*id)).count()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().entries.len()
    }

    /// Listeners currently attached to `trigger`.
    pub fn listeners_of(&self, trigger: &TriggerRef) -> Vec<ListenerId> {
        self.inner
            .listeners
            .read()
            .by_trigger
            .get(&trigger.id())
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("queued", &self.inner.queue.len())
            .field("workers", &self.inner.pool.worker_count())
            .finish()
    }
}
