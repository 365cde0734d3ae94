//! Binding targets: the descriptor of a host callable as scripts see it.
//!
//! A [`BindingTarget`] is written at the registration site and lists the
//! parameters with their policies. Registration validates it into a
//! [`Signature`]: labels are checked, patterns compiled, and fallbacks
//! coerced to the declared kind up front so a mistyped default fails the
//! module load instead of a later call.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{RegistrationError, ScriptError};
use crate::identifier;
use crate::runner::ds::class::{AnyRef, Class, Projection};
use crate::runner::ds::conversion::{coerce, Kind};
use crate::runner::ds::duration::parse_duration;
use crate::runner::ds::value::{HostObject, PatternMatch, Value};
use crate::runner::threading;

use super::args::Args;
use super::registry::Registry;

/// Value substituted when an optional argument is omitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    /// Empty list or map, depending on the declared kind.
    Empty,
    /// Enum constant by name.
    Enum(String),
    /// Duration in textual form, e.g. `"10s"`.
    Duration(String),
}

#[derive(Debug, Clone)]
struct PatternSpec {
    regex: String,
    find: bool,
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    label: Option<String>,
    kind: Kind,
    not_null: bool,
    fallback: Option<Fallback>,
    pattern: Option<PatternSpec>,
}

impl Param {
    pub fn new(label: &str, kind: Kind) -> Self {
        Param {
            label: Some(label.to_string()),
            ..Self::of(kind)
        }
    }

    /// Unlabelled parameter, addressed as `arg<index>`.
    pub fn of(kind: Kind) -> Self {
        Param {
            label: None,
            kind,
            not_null: false,
            fallback: None,
            pattern: None,
        }
    }

    pub fn named(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn optional(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The argument must be a string matching `regex`, either entirely or,
    /// with `find`, anywhere. The parameter kind must be [`Kind::Match`].
    pub fn pattern(mut self, regex: &str, find: bool) -> Self {
        self.pattern = Some(PatternSpec {
            regex: regex.to_string(),
            find,
        });
        self
    }
}

/// Unvalidated descriptor of a callable surface.
#[derive(Debug, Clone)]
pub struct BindingTarget {
    name: String,
    params: Vec<Param>,
    returns: Kind,
    not_async: bool,
}

impl BindingTarget {
    pub fn new(name: &str) -> Self {
        BindingTarget {
            name: name.to_string(),
            params: vec![],
            returns: Kind::Any,
            not_async: false,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, kind: Kind) -> Self {
        self.returns = kind;
        self
    }

    /// Calls from asynchronous listener threads fail before any effect.
    pub fn not_async(mut self) -> Self {
        self.not_async = true;
        self
    }

    /// Register under `alias` instead of the declared name.
    pub fn renamed(mut self, alias: &str) -> Self {
        self.name = alias.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn validate(self) -> Result<Signature, RegistrationError> {
        identifier::validate(&self.name)?;
        let target = self.name;
        let mut params: Vec<ParamSpec> = Vec::with_capacity(self.params.len());
        for (index, param) in self.params.into_iter().enumerate() {
            let label = param.label.unwrap_or_else(|| format!("arg{}", index));
            identifier::validate(&label)?;
            if params.iter().any(|p| p.label == label) {
                return Err(shape(&target, format!("duplicate parameter '{}'", label)));
            }
            let pattern = match param.pattern {
                Some(spec) => {
                    if param.kind != Kind::Match {
                        return Err(shape(
                            &target,
                            format!("pattern parameter '{}' must be declared as a match", label),
                        ));
                    }
                    Some(CompiledPattern::new(&label, spec)?)
                }
                None => None,
            };
            let fallback = match param.fallback {
                Some(fallback) => {
                    if param.not_null && fallback == Fallback::Null {
                        return Err(shape(
                            &target,
                            format!("parameter '{}' cannot be both not-null and null by default", label),
                        ));
                    }
                    if pattern.is_some() && fallback != Fallback::Null {
                        return Err(shape(
                            &target,
                            format!("pattern parameter '{}' only accepts a null fallback", label),
                        ));
                    }
                    Some(resolve_fallback(&target, &label, &param.kind, fallback)?)
                }
                None => None,
            };
            params.push(ParamSpec {
                label,
                kind: param.kind,
                not_null: param.not_null,
                fallback,
                pattern,
            });
        }
        Ok(Signature {
            name: target,
            params,
            returns: self.returns,
            not_async: self.not_async,
        })
    }
}

fn shape(target: &str, reason: String) -> RegistrationError {
    RegistrationError::InvalidBindingShape {
        target: target.to_string(),
        reason,
    }
}

fn resolve_fallback(
    target: &str,
    label: &str,
    kind: &Kind,
    fallback: Fallback,
) -> Result<Value, RegistrationError> {
    let invalid = |reason: String| RegistrationError::InvalidFallback {
        target: target.to_string(),
        param: label.to_string(),
        reason,
    };
    let raw = match fallback {
        Fallback::Null => Value::Null,
        Fallback::Bool(b) => Value::Bool(b),
        Fallback::Int(i) => Value::Int(i),
        Fallback::Float(f) => Value::Float(f),
        Fallback::Char(c) => Value::Char(c),
        Fallback::Str(s) => Value::from(s),
        Fallback::Enum(name) => Value::from(name),
        Fallback::Duration(text) => {
            Value::Duration(parse_duration(&text).map_err(|e| invalid(e.to_string()))?)
        }
        Fallback::Empty => match kind {
            Kind::List(_) => Value::empty_list(),
            Kind::Map(_) => Value::empty_map(),
            other => {
                return Err(invalid(format!(
                    "an empty fallback needs a list or map, not {}",
                    other.name()
                )))
            }
        },
    };
    coerce(raw, kind, &|a: Class, b: Class| a == b).map_err(|e| invalid(e.to_string()))
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    fn new(label: &str, spec: PatternSpec) -> Result<Self, RegistrationError> {
        let anchored = if spec.find {
            spec.regex.clone()
        } else {
            format!("^(?:{})$", spec.regex)
        };
        let regex = Regex::new(&anchored).map_err(|e| RegistrationError::InvalidPattern {
            param: label.to_string(),
            reason: e.to_string(),
        })?;
        Ok(CompiledPattern {
            source: spec.regex,
            regex,
        })
    }

    fn apply(&self, text: &str) -> Result<Value, ScriptError> {
        match self.regex.captures(text) {
            Some(caps) => Ok(Value::from(PatternMatch::from_captures(&self.regex, &caps))),
            None => Err(ScriptError::new(format!(
                "value does not match {}",
                self.source
            ))),
        }
    }
}

/// A validated parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    label: String,
    kind: Kind,
    not_null: bool,
    fallback: Option<Value>,
    pattern: Option<CompiledPattern>,
}

impl ParamSpec {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.fallback.is_none()
    }

    pub fn fallback(&self) -> Option<&Value> {
        self.fallback.as_ref()
    }
}

/// A validated binding target.
#[derive(Debug, Clone)]
pub struct Signature {
    name: String,
    params: Vec<ParamSpec>,
    returns: Kind,
    not_async: bool,
}

impl Signature {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn returns(&self) -> &Kind {
        &self.returns
    }

    pub fn is_not_async(&self) -> bool {
        self.not_async
    }

    /// Slot each named argument, then fill the remaining slots positionally.
    fn assign_slots(&self, positional: usize, named: &[&str]) -> Result<Vec<Option<Slot>>, String> {
        let mut slots: Vec<Option<Slot>> = vec![None; self.params.len()];
        for (i, name) in named.iter().enumerate() {
            let index = self
                .params
                .iter()
                .position(|p| p.label == *name)
                .ok_or_else(|| format!("'{}' has no parameter named '{}'", self.name, name))?;
            if slots[index].is_some() {
                return Err(format!("argument '{}' of '{}' is given twice", name, self.name));
            }
            slots[index] = Some(Slot::Named(i));
        }
        let mut next = 0;
        for i in 0..positional {
            while next < slots.len() && slots[next].is_some() {
                next += 1;
            }
            if next == slots.len() {
                return Err(format!(
                    "too many arguments for '{}': expected at most {}, got {}",
                    self.name,
                    self.params.len(),
                    positional + named.len()
                ));
            }
            slots[next] = Some(Slot::Positional(i));
        }
        for (param, slot) in self.params.iter().zip(&slots) {
            if slot.is_none() && param.fallback.is_none() {
                return Err(format!(
                    "missing argument '{}' for '{}'",
                    param.label, self.name
                ));
            }
        }
        Ok(slots)
    }

    /// Parse time arity check.
    pub(crate) fn check_arity(&self, positional: usize, named: &[&str]) -> Result<(), String> {
        self.assign_slots(positional, named).map(|_| ())
    }

    /// Match arguments to parameters and apply every parameter policy.
    pub(crate) fn bind(
        &self,
        positional: Vec<Value>,
        named: Vec<(String, Value)>,
        assignable: &dyn Fn(Class, Class) -> bool,
    ) -> Result<Vec<Value>, ScriptError> {
        let names: Vec<&str> = named.iter().map(|(n, _)| n.as_str()).collect();
        let slots = self
            .assign_slots(positional.len(), &names)
            .map_err(ScriptError::new)?;
        let mut positional: Vec<Option<Value>> = positional.into_iter().map(Some).collect();
        let mut named: Vec<Option<Value>> = named.into_iter().map(|(_, v)| Some(v)).collect();
        let mut bound = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let supplied = match slot {
                Some(Slot::Positional(i)) => positional[i].take(),
                Some(Slot::Named(i)) => named[i].take(),
                None => None,
            };
            let value = match supplied {
                Some(v) => v,
                None => {
                    bound.push(param.fallback.clone().unwrap_or(Value::Null));
                    continue;
                }
            };
            if value.is_null() {
                if param.not_null {
                    return Err(ScriptError::new(format!(
                        "argument '{}' must not be null",
                        param.label
                    )));
                }
                bound.push(Value::Null);
                continue;
            }
            let value = match &param.pattern {
                Some(pattern) => match &value {
                    Value::Str(s) => pattern.apply(s)?,
                    other => {
                        return Err(ScriptError::new(format!(
                            "argument '{}' must be a string, found {}",
                            param.label,
                            other.describe()
                        )))
                    }
                },
                None => value,
            };
            let value = coerce(value, &param.kind, assignable).map_err(|e| {
                ScriptError::new(format!("argument '{}': {}", param.label, e))
            })?;
            bound.push(value);
        }
        Ok(bound)
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Positional(usize),
    Named(usize),
}

/// The host object a member is invoked on, viewed as the class that
/// declared the member.
pub struct Receiver<'a> {
    object: &'a HostObject,
    projection: Projection,
}

impl<'a> Receiver<'a> {
    pub(crate) fn new(object: &'a HostObject, projection: Projection) -> Self {
        Receiver { object, projection }
    }

    pub fn object(&self) -> &'a HostObject {
        self.object
    }

    pub(crate) fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn view(&self) -> Option<&'a AnyRef> {
        self.projection.apply(self.object.as_any())
    }

    pub fn get<T: std::any::Any>(&self) -> Option<&'a T> {
        self.view().and_then(|v| v.downcast_ref::<T>())
    }
}

pub(crate) fn receiver_as<'a, T: std::any::Any>(
    receiver: Option<&Receiver<'a>>,
) -> Result<&'a T, ScriptError> {
    receiver.and_then(|r| r.get::<T>()).ok_or_else(|| {
        ScriptError::new(format!(
            "expected a {} receiver",
            Class::of::<T>().simple_name()
        ))
    })
}

pub type MethodBody =
    dyn Fn(Option<&Receiver<'_>>, &Args<'_>) -> Result<Value, ScriptError> + Send + Sync;

pub(crate) fn method_body<F>(f: F) -> Arc<MethodBody>
where
    F: Fn(Option<&Receiver<'_>>, &Args<'_>) -> Result<Value, ScriptError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A registered script-callable unit.
pub struct Method {
    signature: Signature,
    body: Arc<MethodBody>,
}

impl Method {
    pub(crate) fn new(signature: Signature, body: Arc<MethodBody>) -> Self {
        Method { signature, body }
    }

    pub fn name(&self) -> &str {
        self.signature.name()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn invoke(
        &self,
        registry: &Registry,
        receiver: Option<&Receiver<'_>>,
        positional: Vec<Value>,
        named: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        if self.signature.not_async && threading::is_async() {
            return Err(ScriptError::new(format!(
                "'{}' cannot be called asynchronously",
                self.signature.name
            )));
        }
        let values = self
            .signature
            .bind(positional, named, &|a, b| registry.is_assignable(a, b))?;
        let args = Args::new(&self.signature, values, registry);
        (self.body)(receiver, &args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self.signature.name)
    }
}

pub type Getter = dyn Fn(Option<&Receiver<'_>>) -> Result<Value, ScriptError> + Send + Sync;
pub type Setter =
    dyn Fn(Option<&Receiver<'_>>, Value) -> Result<(), ScriptError> + Send + Sync;

pub(crate) fn getter<F>(f: F) -> Arc<Getter>
where
    F: Fn(Option<&Receiver<'_>>) -> Result<Value, ScriptError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn setter<F>(f: F) -> Arc<Setter>
where
    F: Fn(Option<&Receiver<'_>>, Value) -> Result<(), ScriptError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A registered field; read-only unless it carries a setter.
pub struct FieldBinding {
    name: String,
    kind: Kind,
    getter: Arc<Getter>,
    setter: Option<Arc<Setter>>,
}

impl FieldBinding {
    pub(crate) fn new(
        name: &str,
        kind: Kind,
        getter: Arc<Getter>,
        setter: Option<Arc<Setter>>,
    ) -> Self {
        FieldBinding {
            name: name.to_string(),
            kind,
            getter,
            setter,
        }
    }

    pub(crate) fn constant(name: &str, value: Value) -> Self {
        Self::new(name, Kind::Any, getter(move |_| Ok(value.clone())), None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_mutable(&self) -> bool {
        self.setter.is_some()
    }

    pub(crate) fn get(&self, receiver: Option<&Receiver<'_>>) -> Result<Value, ScriptError> {
        (self.getter)(receiver)
    }

    pub(crate) fn set(
        &self,
        registry: &Registry,
        receiver: Option<&Receiver<'_>>,
        value: Value,
    ) -> Result<(), ScriptError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| ScriptError::new(format!("field '{}' is read-only", self.name)))?;
        let value = coerce(value, &self.kind, &|a, b| registry.is_assignable(a, b))
            .map_err(|e| ScriptError::new(format!("field '{}': {}", self.name, e)))?;
        setter(receiver, value)
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldBinding({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exact(a: Class, b: Class) -> bool {
        a == b
    }

    #[test]
    fn unlabelled_params_are_numbered() {
        let sig = BindingTarget::new("print")
            .param(Param::of(Kind::Str).not_null())
            .validate()
            .unwrap();
        assert_eq!(sig.params()[0].label(), "arg0");
        let err = sig.bind(vec![Value::Null], vec![], &exact).unwrap_err();
        assert_eq!(err.message(), "argument 'arg0' must not be null");
    }

    #[test]
    fn every_fallback_kind_is_precoerced() {
        let sig = BindingTarget::new("f")
            .param(Param::new("a", Kind::Bool).optional(Fallback::Bool(true)))
            .param(Param::new("b", Kind::Float).optional(Fallback::Int(2)))
            .param(Param::new("c", Kind::Char).optional(Fallback::Char('z')))
            .param(Param::new("d", Kind::Str).optional(Fallback::Str("world".into())))
            .param(Param::new("e", Kind::list(Kind::Int)).optional(Fallback::Empty))
            .param(Param::new("g", Kind::Duration).optional(Fallback::Duration("10s".into())))
            .param(Param::new("h", Kind::Any).optional(Fallback::Null))
            .validate()
            .unwrap();
        let bound = sig.bind(vec![], vec![], &exact).unwrap();
        assert_eq!(
            bound,
            vec![
                Value::Bool(true),
                Value::Float(2.0),
                Value::Char('z'),
                Value::str("world"),
                Value::empty_list(),
                Value::Duration(Duration::from_secs(10)),
                Value::Null,
            ]
        );
    }

    #[test]
    fn mistyped_fallback_fails_at_registration() {
        let err = BindingTarget::new("f")
            .param(Param::new("n", Kind::Int).optional(Fallback::Str("ten".into())))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidFallback { .. }));
        let err = BindingTarget::new("f")
            .param(Param::new("n", Kind::Int).optional(Fallback::Empty))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidFallback { .. }));
        let err = BindingTarget::new("f")
            .param(Param::new("d", Kind::Duration).optional(Fallback::Duration("soon".into())))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidFallback { .. }));
    }

    #[test]
    fn pattern_requires_match_kind_and_valid_regex() {
        let err = BindingTarget::new("f")
            .param(Param::new("s", Kind::Str).pattern("a+", false))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidBindingShape { .. }));
        let err = BindingTarget::new("f")
            .param(Param::new("s", Kind::Match).pattern("(", false))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_matches_whole_string_unless_find() {
        let full = BindingTarget::new("f")
            .param(Param::new("s", Kind::Match).pattern(r"(\d+)s", false))
            .validate()
            .unwrap();
        let err = full.bind(vec![Value::str("in 10s")], vec![], &exact).unwrap_err();
        assert_eq!(err.message(), r"value does not match (\d+)s");
        let bound = full.bind(vec![Value::str("10s")], vec![], &exact).unwrap();
        match &bound[0] {
            Value::Match(m) => assert_eq!(m.group(1), Some("10")),
            other => panic!("expected a match, got {:?}", other),
        }

        let find = BindingTarget::new("f")
            .param(Param::new("s", Kind::Match).pattern(r"(\d+)s", true))
            .validate()
            .unwrap();
        assert!(find.bind(vec![Value::str("in 10s")], vec![], &exact).is_ok());
    }

    #[test]
    fn named_then_positional() {
        let sig = BindingTarget::new("spawn")
            .param(Param::new("kind", Kind::Str))
            .param(Param::new("count", Kind::Int).optional(Fallback::Int(1)))
            .param(Param::new("silent", Kind::Bool).optional(Fallback::Bool(false)))
            .validate()
            .unwrap();
        let bound = sig
            .bind(
                vec![Value::str("zombie"), Value::Bool(true)],
                vec![("count".into(), Value::Int(5))],
                &exact,
            )
            .unwrap();
        assert_eq!(bound, vec![Value::str("zombie"), Value::Int(5), Value::Bool(true)]);
    }

    #[test]
    fn arity_errors() {
        let sig = BindingTarget::new("greet")
            .param(Param::new("who", Kind::Str))
            .validate()
            .unwrap();
        assert_eq!(
            sig.check_arity(0, &[]).unwrap_err(),
            "missing argument 'who' for 'greet'"
        );
        assert!(sig.check_arity(2, &[]).unwrap_err().starts_with("too many arguments"));
        assert_eq!(
            sig.check_arity(0, &["whom"]).unwrap_err(),
            "'greet' has no parameter named 'whom'"
        );
        assert!(sig.check_arity(0, &["who"]).is_ok());
    }

    #[test]
    fn duplicate_labels_and_bad_aliases_are_rejected() {
        let err = BindingTarget::new("f")
            .param(Param::new("a", Kind::Int))
            .param(Param::new("b", Kind::Int).named("a"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidBindingShape { .. }));
        let err = BindingTarget::new("f").renamed("not valid").validate().unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidIdentifier(_)));
    }
}
