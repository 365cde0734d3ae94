//! Declared parameter kinds and the conversions between script values and
//! host types.
//!
//! Integers travel as `i64` and floats as `f64`; narrower host types are
//! produced on demand and fail when the value does not fit.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;

use super::class::Class;
use super::duration::parse_duration;
use super::value::{EnumConstant, HostObject, PatternMatch, ScriptEnum, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },
    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("no constant '{name}' in {class}")]
    UnknownConstant { name: String, class: String },
    #[error("{0}")]
    Invalid(String),
}

impl ConversionError {
    pub fn mismatch(expected: impl Into<String>, found: &Value) -> Self {
        ConversionError::Mismatch {
            expected: expected.into(),
            found: found.describe(),
        }
    }
}

/// Enumeration class plus its constant table.
#[derive(Clone, Copy)]
pub struct EnumKind {
    class: Class,
    lookup: fn(&str) -> Option<EnumConstant>,
}

impl EnumKind {
    pub fn of<E: ScriptEnum>() -> Self {
        EnumKind {
            class: Class::of::<E>(),
            lookup: EnumConstant::lookup::<E>,
        }
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn lookup(&self, name: &str) -> Option<EnumConstant> {
        (self.lookup)(name)
    }
}

impl PartialEq for EnumKind {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
    }
}

impl fmt::Debug for EnumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumKind({})", self.class)
    }
}

/// Declared host type of a parameter, field, or return.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Any,
    Void,
    Bool,
    Int,
    Float,
    Char,
    Str,
    Duration,
    List(Box<Kind>),
    Map(Box<Kind>),
    Match,
    Enum(EnumKind),
    Object(Class),
}

impl Kind {
    pub fn list(element: Kind) -> Self {
        Kind::List(Box::new(element))
    }

    pub fn map(value: Kind) -> Self {
        Kind::Map(Box::new(value))
    }

    pub fn enumeration<E: ScriptEnum>() -> Self {
        Kind::Enum(EnumKind::of::<E>())
    }

    pub fn object<T: Any + Send + Sync>() -> Self {
        Kind::Object(Class::of::<T>())
    }

    pub fn name(&self) -> String {
        match self {
            Kind::Any => "any".to_string(),
            Kind::Void => "void".to_string(),
            Kind::Bool => "bool".to_string(),
            Kind::Int => "int".to_string(),
            Kind::Float => "float".to_string(),
            Kind::Char => "char".to_string(),
            Kind::Str => "string".to_string(),
            Kind::Duration => "duration".to_string(),
            Kind::List(e) => format!("list<{}>", e.name()),
            Kind::Map(v) => format!("map<{}>", v.name()),
            Kind::Match => "match".to_string(),
            Kind::Enum(e) => e.class().simple_name().to_string(),
            Kind::Object(c) => c.simple_name().to_string(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Kind::List(_) | Kind::Map(_))
    }
}

/// Convert `value` to the representation `kind` declares. Null passes
/// through untouched; nullability is a parameter policy, not a kind.
///
/// `assignable` decides whether an object of the first class may be used
/// where the second is declared.
pub fn coerce(
    value: Value,
    kind: &Kind,
    assignable: &dyn Fn(Class, Class) -> bool,
) -> Result<Value, ConversionError> {
    if value.is_null() {
        return Ok(value);
    }
    match (kind, value) {
        (Kind::Any, v) | (Kind::Void, v) => Ok(v),
        (Kind::Bool, v @ Value::Bool(_)) => Ok(v),
        (Kind::Int, v @ Value::Int(_)) => Ok(v),
        (Kind::Float, v @ Value::Float(_)) => Ok(v),
        (Kind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (Kind::Char, v @ Value::Char(_)) => Ok(v),
        (Kind::Char, Value::Str(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(ConversionError::Mismatch {
                    expected: "char".to_string(),
                    found: format!("string of length {}", s.chars().count()),
                }),
            }
        }
        (Kind::Str, v @ Value::Str(_)) => Ok(v),
        (Kind::Str, Value::Char(c)) => Ok(Value::str(c.to_string())),
        (Kind::Duration, v @ Value::Duration(_)) => Ok(v),
        (Kind::Duration, Value::Str(s)) => parse_duration(&s)
            .map(Value::Duration)
            .map_err(|e| ConversionError::Invalid(e.to_string())),
        (Kind::List(element), Value::List(items)) => {
            if **element == Kind::Any {
                return Ok(Value::List(items));
            }
            let converted = items
                .iter()
                .cloned()
                .map(|item| coerce(item, element, assignable))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(Arc::new(converted)))
        }
        (Kind::Map(element), Value::Map(entries)) => {
            if **element == Kind::Any {
                return Ok(Value::Map(entries));
            }
            let converted = entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), coerce(v.clone(), element, assignable)?)))
                .collect::<Result<IndexMap<_, _>, ConversionError>>()?;
            Ok(Value::Map(Arc::new(converted)))
        }
        (Kind::Match, v @ Value::Match(_)) => Ok(v),
        (Kind::Enum(e), Value::Enum(c)) if c.class() == e.class() => Ok(Value::Enum(c)),
        (Kind::Enum(e), Value::Str(name)) => {
            e.lookup(&name)
                .map(Value::Enum)
                .ok_or_else(|| ConversionError::UnknownConstant {
                    name: name.to_string(),
                    class: e.class().simple_name().to_string(),
                })
        }
        (Kind::Object(class), Value::Object(o)) if assignable(o.class(), *class) => {
            Ok(Value::Object(o))
        }
        (kind, v) => Err(ConversionError::mismatch(kind.name(), &v)),
    }
}

/// Host types that can be produced from a script value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_bool()
            .ok_or_else(|| ConversionError::mismatch("bool", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_int()
            .ok_or_else(|| ConversionError::mismatch("int", value))
    }
}

macro_rules! narrow_int {
    ($($t:ty),*) => {
        $(impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self, ConversionError> {
                let wide = i64::from_value(value)?;
                <$t>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                    value: wide.to_string(),
                    target: stringify!($t),
                })
            }
        })*
    };
}

narrow_int!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(ConversionError::mismatch("float", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let wide = f64::from_value(value)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(ConversionError::OutOfRange {
                value: wide.to_string(),
                target: "f32",
            });
        }
        Ok(wide as f32)
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Char(c) => Ok(*c),
            other => Err(ConversionError::mismatch("char", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            Value::Char(c) => Ok(c.to_string()),
            other => Err(ConversionError::mismatch("string", other)),
        }
    }
}

impl FromValue for Arc<str> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(ConversionError::mismatch("string", other)),
        }
    }
}

impl FromValue for Duration {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Duration(d) => Ok(*d),
            other => Err(ConversionError::mismatch("duration", other)),
        }
    }
}

impl FromValue for EnumConstant {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Enum(e) => Ok(*e),
            other => Err(ConversionError::mismatch("enum", other)),
        }
    }
}

impl FromValue for HostObject {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Object(o) => Ok(o.clone()),
            other => Err(ConversionError::mismatch("object", other)),
        }
    }
}

impl FromValue for Arc<PatternMatch> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Match(m) => Ok(m.clone()),
            other => Err(ConversionError::mismatch("match", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => Err(ConversionError::mismatch("list", other)),
        }
    }
}

impl<T: FromValue> FromValue for IndexMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_value(v)?)))
                .collect(),
            other => Err(ConversionError::mismatch("map", other)),
        }
    }
}

/// Convert to a host enum.
pub fn enum_from_value<E: ScriptEnum>(value: &Value) -> Result<E, ConversionError> {
    let kind = EnumKind::of::<E>();
    let constant = match value {
        Value::Enum(c) => *c,
        Value::Str(name) => kind.lookup(name).ok_or_else(|| ConversionError::UnknownConstant {
            name: name.to_string(),
            class: kind.class().simple_name().to_string(),
        })?,
        other => return Err(ConversionError::mismatch(kind.class().simple_name(), other)),
    };
    constant
        .to::<E>()
        .ok_or_else(|| ConversionError::mismatch(kind.class().simple_name(), value))
}
