//! Namespaces: the nodes of a module's registration tree.
//!
//! A [`Namespace`] is a cheap handle (registry plus node id). Two handles
//! compare equal when they denote the same node of the same registry.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{MemberKind, RegistrationError, ScriptError};
use crate::runner::ds::class::Class;
use crate::runner::ds::conversion::{FromValue, Kind};
use crate::runner::ds::value::{ScriptEnum, Value};
use crate::runner::trigger::{factory, predicate, DynTrigger, Trigger, TriggerHandler, TriggerRef};
use crate::script::dictionary::Dictionary;

use super::args::Args;
use super::binding::{BindingTarget, FieldBinding, Method};
use super::methods::{self, StaticMethodSet, StaticMethods};
use super::registry::{NamespaceId, Registry};
use super::types::TypeHandle;

#[derive(Clone)]
pub struct Namespace {
    registry: Registry,
    id: NamespaceId,
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.registry.same(&other.registry)
    }
}

impl Eq for Namespace {}

impl Namespace {
    pub(crate) fn new(registry: Registry, id: NamespaceId) -> Self {
        Namespace { registry, id }
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Last path segment; the module id for a root.
    pub fn name(&self) -> String {
        self.registry.namespace_name(self.id)
    }

    /// Qualified path, e.g. `game:world.weather`.
    pub fn path(&self) -> String {
        self.registry.namespace_path(self.id)
    }

    pub fn module_id(&self) -> String {
        self.registry.namespace_module(self.id)
    }

    pub fn parent(&self) -> Option<Namespace> {
        self.registry
            .namespace_parent(self.id)
            .map(|id| Namespace::new(self.registry.clone(), id))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Child namespace `key`, created on first use.
    pub fn namespace(&self, key: &str) -> Result<Namespace, RegistrationError> {
        let id = self.registry.child_namespace(self.id, key)?;
        Ok(Namespace::new(self.registry.clone(), id))
    }

    // ── types ────────────────────────────────────────────────────────

    /// Canonical type for `T`, named after the Rust type.
    pub fn register_type<T: Any + Send + Sync>(&self) -> Result<TypeHandle<T>, RegistrationError> {
        self.register_type_as::<T>(Class::of::<T>().simple_name())
    }

    pub fn register_type_as<T: Any + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<TypeHandle<T>, RegistrationError> {
        let node = self
            .registry
            .add_type(self.id, Class::of::<T>(), name, false)?;
        Ok(TypeHandle::new(self.registry.clone(), node))
    }

    /// Contribute members to `T` wherever its canonical type lives.
    pub fn extend<T: Any + Send + Sync>(&self) -> Result<TypeHandle<T>, RegistrationError> {
        let class = Class::of::<T>();
        let node = self
            .registry
            .add_type(self.id, class, class.simple_name(), true)?;
        Ok(TypeHandle::new(self.registry.clone(), node))
    }

    /// Register `E` as a type with one static field per constant.
    pub fn enumeration<E: ScriptEnum>(&self) -> Result<TypeHandle<E>, RegistrationError> {
        let handle = self.register_type::<E>()?;
        for constant in E::constants() {
            handle.static_field(constant.constant_name(), Value::from_enum(*constant))?;
        }
        Ok(handle)
    }

    // ── triggers ─────────────────────────────────────────────────────

    /// Trigger activated by posted values of class `T` (or a subclass).
    pub fn trigger<T, F>(&self, key: &str, handler: F) -> Result<TriggerRef, RegistrationError>
    where
        T: Any + Send + Sync,
        F: Fn(&T, &mut Dictionary) -> bool + Send + Sync + 'static,
    {
        let handler = predicate(move |value, dict| {
            match value.and_then(|v| v.downcast_ref::<T>()) {
                Some(v) => handler(v, dict),
                None => false,
            }
        });
        self.registry.add_trigger(
            self.id,
            key,
            Some(Class::of::<T>()),
            TriggerHandler::Predicate(handler),
            None,
            false,
        )
    }

    /// Trigger without a value, activated only through direct posts.
    pub fn simple_trigger<F>(&self, key: &str, handler: F) -> Result<TriggerRef, RegistrationError>
    where
        F: Fn(&mut Dictionary) -> bool + Send + Sync + 'static,
    {
        let handler = predicate(move |_, dict| handler(dict));
        self.registry
            .add_trigger(self.id, key, None, TriggerHandler::Predicate(handler), None, false)
    }

    /// Trigger implemented by `H`, one instance per listener.
    pub fn trigger_type<H: Trigger>(&self, key: &str) -> Result<TriggerRef, RegistrationError> {
        let signature = H::params()
            .into_iter()
            .fold(BindingTarget::new(key), BindingTarget::param)
            .validate()?;
        let class = if TypeId::of::<H::Value>() == TypeId::of::<()>() {
            None
        } else {
            Some(Class::of::<H::Value>())
        };
        let build = factory(|args: &Args<'_>| {
            let handler: Arc<dyn DynTrigger> = Arc::new(H::new(args)?);
            Ok(handler)
        });
        self.registry.add_trigger(
            self.id,
            key,
            class,
            TriggerHandler::Factory(build),
            Some(signature),
            H::allows_async(),
        )
    }

    // ── static members ───────────────────────────────────────────────

    fn add_method(&self, method: Method) -> Result<&Self, RegistrationError> {
        self.registry.add_static_method(self.id, method)?;
        Ok(self)
    }

    fn add_field(&self, field: FieldBinding) -> Result<&Self, RegistrationError> {
        self.registry.add_static_field(self.id, field)?;
        Ok(self)
    }

    pub fn methods<S: StaticMethods>(&self) -> Result<&Self, RegistrationError> {
        for method in StaticMethodSet::collect::<S>()? {
            self.add_method(method)?;
        }
        Ok(self)
    }

    pub fn method<R, F>(&self, target: BindingTarget, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn(&Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
    {
        self.add_method(methods::static_method(target, f)?)
    }

    pub fn action<F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_method(methods::static_action(key, f)?)
    }

    pub fn computation<R, F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_method(methods::static_computation(key, f)?)
    }

    pub fn field(&self, key: &str, value: impl Into<Value>) -> Result<&Self, RegistrationError> {
        self.add_field(FieldBinding::constant(key, value.into()))
    }

    /// Read-only field whose value is computed on every read.
    pub fn field_with<R, F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_field(methods::computed_field(key, f))
    }

    pub fn mutable_field<V, G, S>(
        &self,
        key: &str,
        kind: Kind,
        get: G,
        set: S,
    ) -> Result<&Self, RegistrationError>
    where
        V: FromValue + Into<Value>,
        G: Fn() -> V + Send + Sync + 'static,
        S: Fn(V) -> Result<(), ScriptError> + Send + Sync + 'static,
    {
        self.add_field(methods::mutable_static_field(key, kind, get, set))
    }

    // ── introspection ────────────────────────────────────────────────

    pub fn child_names(&self) -> Vec<String> {
        self.registry.member_names(self.id, MemberKind::Namespace)
    }

    pub fn type_names(&self) -> Vec<String> {
        self.registry.member_names(self.id, MemberKind::Type)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.registry.member_names(self.id, MemberKind::Method)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.registry.member_names(self.id, MemberKind::Field)
    }

    pub fn trigger_names(&self) -> Vec<String> {
        self.registry.member_names(self.id, MemberKind::Trigger)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.path())
    }
}
