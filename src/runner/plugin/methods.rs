//! Bulk binding of host methods.
//!
//! A host groups script-callable functions behind one of two marker
//! traits. [`StaticMethods`] lists free functions; [`InstanceMethods`]
//! wraps a host object in a [`Delegate`] and lists methods that read it.
//! Each `bind` call fills a method set with binding targets and bodies,
//! which registration then validates one by one.

use std::any::Any;
use std::marker::PhantomData;
use std::ops::Deref;

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::class::{Class, Projection};
use crate::runner::ds::conversion::{FromValue, Kind};
use crate::runner::ds::value::{HostObject, Value};

use super::args::Args;
use super::binding::{
    getter, method_body, receiver_as, setter, BindingTarget, FieldBinding, Method,
};

/// Marker for a group of static functions registered in one call.
pub trait StaticMethods: 'static {
    fn bind(methods: &mut StaticMethodSet);
}

/// Marker for a group of instance methods over `Target`.
///
/// A fresh value is built around the receiver for every call.
pub trait InstanceMethods: Sized + 'static {
    type Target: Any + Send + Sync;

    fn new(delegate: Delegate<Self::Target>) -> Self;

    fn bind(methods: &mut InstanceMethodSet<Self>);
}

/// The host instance an [`InstanceMethods`] value operates on.
pub struct Delegate<T> {
    object: HostObject,
    projection: Projection,
    _target: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Delegate<T> {
    /// Only succeeds when the projection really yields a `T`.
    fn new(object: &HostObject, projection: &Projection) -> Option<Self> {
        projection
            .apply(object.as_any())
            .and_then(|v| v.downcast_ref::<T>())?;
        Some(Delegate {
            object: object.clone(),
            projection: projection.clone(),
            _target: PhantomData,
        })
    }

    pub fn object(&self) -> &HostObject {
        &self.object
    }
}

impl<T: Any + Send + Sync> Deref for Delegate<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.projection
            .apply(self.object.as_any())
            .and_then(|v| v.downcast_ref::<T>())
            .expect("delegate projection is checked on construction")
    }
}

/// Static methods collected by [`StaticMethods::bind`].
pub struct StaticMethodSet {
    owner: &'static str,
    methods: Vec<Result<Method, RegistrationError>>,
}

impl StaticMethodSet {
    fn new(owner: &'static str) -> Self {
        StaticMethodSet {
            owner,
            methods: vec![],
        }
    }

    pub fn method<R, F>(&mut self, target: BindingTarget, f: F) -> &mut Self
    where
        R: Into<Value>,
        F: Fn(&Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
    {
        self.methods.push(static_method(target, f));
        self
    }

    pub fn action<F>(&mut self, key: &str, f: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.methods.push(static_action(key, f));
        self
    }

    pub fn computation<R, F>(&mut self, key: &str, f: F) -> &mut Self
    where
        R: Into<Value>,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.methods.push(static_computation(key, f));
        self
    }

    pub(crate) fn collect<S: StaticMethods>() -> Result<Vec<Method>, RegistrationError> {
        let mut set = StaticMethodSet::new(Class::of::<S>().simple_name());
        S::bind(&mut set);
        finish(set.owner, set.methods)
    }
}

/// Instance methods collected by [`InstanceMethods::bind`].
pub struct InstanceMethodSet<M> {
    owner: &'static str,
    methods: Vec<Result<Method, RegistrationError>>,
    _group: PhantomData<fn() -> M>,
}

impl<M: InstanceMethods> InstanceMethodSet<M> {
    pub fn method<R, F>(&mut self, target: BindingTarget, f: F) -> &mut Self
    where
        R: Into<Value>,
        F: Fn(&M, &Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
    {
        let owner = self.owner;
        let method = target.validate().map(|signature| {
            Method::new(
                signature,
                method_body(move |receiver, args| {
                    let receiver = receiver.ok_or_else(|| {
                        ScriptError::new(format!("{} methods need a receiver", owner))
                    })?;
                    let delegate = Delegate::<M::Target>::new(receiver.object(), receiver.projection())
                        .ok_or_else(|| {
                            ScriptError::new(format!(
                                "expected a {} receiver",
                                Class::of::<M::Target>().simple_name()
                            ))
                        })?;
                    f(&M::new(delegate), args).map(Into::into)
                }),
            )
        });
        self.methods.push(method);
        self
    }

    pub(crate) fn collect() -> Result<Vec<Method>, RegistrationError> {
        let mut set = InstanceMethodSet::<M> {
            owner: Class::of::<M>().simple_name(),
            methods: vec![],
            _group: PhantomData,
        };
        M::bind(&mut set);
        finish(set.owner, set.methods)
    }
}

fn finish(
    owner: &str,
    methods: Vec<Result<Method, RegistrationError>>,
) -> Result<Vec<Method>, RegistrationError> {
    if methods.is_empty() {
        return Err(RegistrationError::InvalidBindingShape {
            target: owner.to_string(),
            reason: "binds no methods".to_string(),
        });
    }
    methods.into_iter().collect()
}

// ── single member builders shared by namespaces and types ────────────

pub(crate) fn static_method<R, F>(target: BindingTarget, f: F) -> Result<Method, RegistrationError>
where
    R: Into<Value>,
    F: Fn(&Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
{
    let signature = target.validate()?;
    Ok(Method::new(
        signature,
        method_body(move |_, args| f(args).map(Into::into)),
    ))
}

pub(crate) fn static_action<F>(key: &str, f: F) -> Result<Method, RegistrationError>
where
    F: Fn() + Send + Sync + 'static,
{
    static_method(BindingTarget::new(key).returns(Kind::Void), move |_| {
        f();
        Ok(())
    })
}

pub(crate) fn static_computation<R, F>(key: &str, f: F) -> Result<Method, RegistrationError>
where
    R: Into<Value>,
    F: Fn() -> R + Send + Sync + 'static,
{
    static_method(BindingTarget::new(key), move |_| Ok(f()))
}

pub(crate) fn instance_method<T, R, F>(
    target: BindingTarget,
    f: F,
) -> Result<Method, RegistrationError>
where
    T: Any + Send + Sync,
    R: Into<Value>,
    F: Fn(&T, &Args<'_>) -> Result<R, ScriptError> + Send + Sync + 'static,
{
    let signature = target.validate()?;
    Ok(Method::new(
        signature,
        method_body(move |receiver, args| {
            let this = receiver_as::<T>(receiver)?;
            f(this, args).map(Into::into)
        }),
    ))
}

pub(crate) fn computed_field<R, F>(key: &str, f: F) -> FieldBinding
where
    R: Into<Value>,
    F: Fn() -> R + Send + Sync + 'static,
{
    FieldBinding::new(key, Kind::Any, getter(move |_| Ok(f().into())), None)
}

pub(crate) fn mutable_static_field<V, G, S>(key: &str, kind: Kind, get: G, set: S) -> FieldBinding
where
    V: FromValue + Into<Value>,
    G: Fn() -> V + Send + Sync + 'static,
    S: Fn(V) -> Result<(), ScriptError> + Send + Sync + 'static,
{
    let label = key.to_string();
    FieldBinding::new(
        key,
        kind,
        getter(move |_| Ok(get().into())),
        Some(setter(move |_, value| {
            let value = V::from_value(&value)
                .map_err(|e| ScriptError::new(format!("field '{}': {}", label, e)))?;
            set(value)
        })),
    )
}

pub(crate) fn instance_field<T, R, F>(key: &str, f: F) -> FieldBinding
where
    T: Any + Send + Sync,
    R: Into<Value>,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    FieldBinding::new(
        key,
        Kind::Any,
        getter(move |receiver| Ok(f(receiver_as::<T>(receiver)?).into())),
        None,
    )
}

pub(crate) fn mutable_instance_field<T, V, G, S>(
    key: &str,
    kind: Kind,
    get: G,
    set: S,
) -> FieldBinding
where
    T: Any + Send + Sync,
    V: FromValue + Into<Value>,
    G: Fn(&T) -> V + Send + Sync + 'static,
    S: Fn(&T, V) -> Result<(), ScriptError> + Send + Sync + 'static,
{
    let label = key.to_string();
    FieldBinding::new(
        key,
        kind,
        getter(move |receiver| Ok(get(receiver_as::<T>(receiver)?).into())),
        Some(setter(move |receiver, value| {
            let this = receiver_as::<T>(receiver)?;
            let value = V::from_value(&value)
                .map_err(|e| ScriptError::new(format!("field '{}': {}", label, e)))?;
            set(this, value)
        })),
    )
}
