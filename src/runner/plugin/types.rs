//! Handles for registering members on a host class.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::class::Class;
use crate::runner::ds::conversion::{FromValue, Kind};
use crate::runner::ds::value::Value;

use super::args::Args;
use super::binding::{BindingTarget, FieldBinding, Method};
use super::methods::{self, InstanceMethodSet, InstanceMethods, StaticMethodSet, StaticMethods};
use super::registry::{Registry, TypeMember, TypeNodeId};

/// A registered type or extension for host class `T`.
///
/// Every method returns `&Self` on success so registrations chain with `?`.
pub struct TypeHandle<T> {
    registry: Registry,
    node: TypeNodeId,
    _class: PhantomData<fn() -> T>,
}

impl<T> Clone for TypeHandle<T> {
    fn clone(&self) -> Self {
        TypeHandle {
            registry: self.registry.clone(),
            node: self.node,
            _class: PhantomData,
        }
    }
}

impl<T: Any + Send + Sync> TypeHandle<T> {
    pub(crate) fn new(registry: Registry, node: TypeNodeId) -> Self {
        TypeHandle {
            registry,
            node,
            _class: PhantomData,
        }
    }

    pub fn class(&self) -> Class {
        Class::of::<T>()
    }

    pub fn name(&self) -> String {
        self.registry.type_info(self.node).1
    }

    pub fn is_extension(&self) -> bool {
        self.registry.type_info(self.node).2
    }

    fn add(&self, member: TypeMember) -> Result<&Self, RegistrationError> {
        self.registry.add_type_member(self.node, member)?;
        Ok(self)
    }

    fn add_all(
        &self,
        methods: Vec<Method>,
        wrap: fn(Method) -> TypeMember,
    ) -> Result<&Self, RegistrationError> {
        for method in methods {
            self.add(wrap(method))?;
        }
        Ok(self)
    }

    // ── instance members ─────────────────────────────────────────────

    pub fn methods<M>(&self) -> Result<&Self, RegistrationError>
    where
        M: InstanceMethods<Target = T>,
    {
        self.add_all(InstanceMethodSet::<M>::collect()?, TypeMember::InstanceMethod)
    }

    pub fn method<R, F>(&self, target: BindingTarget, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn(&T, &Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
    {
        self.add(TypeMember::InstanceMethod(methods::instance_method(target, f)?))
    }

    /// Method taking no arguments and returning nothing.
    pub fn action<F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.method(BindingTarget::new(key).returns(Kind::Void), move |this: &T, _| {
            f(this);
            Ok(())
        })
    }

    /// Method taking no arguments and returning a value.
    pub fn computation<R, F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.method(BindingTarget::new(key), move |this: &T, _| Ok(f(this)))
    }

    pub fn field<R, F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.add(TypeMember::InstanceField(methods::instance_field::<T, R, F>(key, f)))
    }

    /// Assignable instance field. Values are coerced to `kind` before the
    /// setter sees them.
    pub fn mutable_field<V, G, S>(
        &self,
        key: &str,
        kind: Kind,
        get: G,
        set: S,
    ) -> Result<&Self, RegistrationError>
    where
        V: FromValue + Into<Value>,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, V) -> Result<(), ScriptError> + Send + Sync + 'static,
    {
        self.add(TypeMember::InstanceField(methods::mutable_instance_field(
            key, kind, get, set,
        )))
    }

    // ── static members ───────────────────────────────────────────────

    pub fn static_methods<S: StaticMethods>(&self) -> Result<&Self, RegistrationError> {
        self.add_all(StaticMethodSet::collect::<S>()?, TypeMember::StaticMethod)
    }

    pub fn static_method<R, F>(&self, target: BindingTarget, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn(&Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
    {
        self.add(TypeMember::StaticMethod(methods::static_method(target, f)?))
    }

    pub fn static_action<F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add(TypeMember::StaticMethod(methods::static_action(key, f)?))
    }

    pub fn static_computation<R, F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add(TypeMember::StaticMethod(methods::static_computation(key, f)?))
    }

    pub fn static_field(&self, key: &str, value: impl Into<Value>) -> Result<&Self, RegistrationError> {
        self.add(TypeMember::StaticField(FieldBinding::constant(key, value.into())))
    }

    pub fn static_field_with<R, F>(&self, key: &str, f: F) -> Result<&Self, RegistrationError>
    where
        R: Into<Value>,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add(TypeMember::StaticField(methods::computed_field(key, f)))
    }

    pub fn static_mutable_field<V, G, S>(
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
        self.add(TypeMember::StaticField(methods::mutable_static_field(
            key, kind, get, set,
        )))
    }
}

impl<T: Any + Send + Sync> fmt::Debug for TypeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", Class::of::<T>())
    }
}
