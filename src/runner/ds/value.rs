use std::any::Any;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use super::class::{AnyRef, Class};
use super::duration::format_duration;

/// Script value domain: null, the recognised primitive kinds, collections,
/// and opaque host objects.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(Arc<str>),
    Enum(EnumConstant),
    Duration(Duration),
    List(Arc<Vec<Value>>),
    Map(Arc<IndexMap<String, Value>>),
    Match(Arc<PatternMatch>),
    Object(HostObject),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(HostObject::new(value))
    }

    pub fn from_enum<E: ScriptEnum>(value: E) -> Self {
        Value::Enum(EnumConstant::of(value))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn empty_list() -> Self {
        Value::List(Arc::new(vec![]))
    }

    pub fn empty_map() -> Self {
        Value::Map(Arc::new(IndexMap::new()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Match(_) => "match",
            Value::Object(_) => "object",
        }
    }

    /// Kind name including the class for enums and objects.
    pub fn describe(&self) -> String {
        match self {
            Value::Enum(e) => e.class().simple_name().to_string(),
            Value::Object(o) => o.class().simple_name().to_string(),
            other => other.kind_name().to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Quoted form used when the value is nested inside a collection.
    fn fmt_nested(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", &**s),
            Value::Char(c) => write!(f, "{:?}", c),
            other => Display::fmt(other, f),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Char(c) => write!(f, "{}", c),
            Value::Str(s) => f.write_str(s),
            Value::Enum(e) => f.write_str(e.name()),
            Value::Duration(d) => f.write_str(&format_duration(*d)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: ", k)?;
                    v.fmt_nested(f)?;
                }
                f.write_str("}")
            }
            Value::Match(m) => write!(f, "match({:?})", m.text()),
            Value::Object(o) => write!(f, "<{}>", o.class().simple_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Value::Null"),
            Value::Bool(b) => write!(f, "Value::Bool({})", b),
            Value::Int(i) => write!(f, "Value::Int({})", i),
            Value::Float(x) => write!(f, "Value::Float({:?})", x),
            Value::Char(c) => write!(f, "Value::Char({:?})", c),
            Value::Str(s) => write!(f, "Value::Str({:?})", &**s),
            Value::Enum(e) => write!(f, "Value::Enum({}.{})", e.class(), e.name()),
            Value::Duration(d) => write!(f, "Value::Duration({})", format_duration(*d)),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Match(m) => write!(f, "Value::Match({:?})", m.text()),
            Value::Object(o) => write!(f, "Value::Object({})", o.class()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Match(a), Value::Match(b)) => a.groups == b.groups,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Value::Str(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<EnumConstant> for Value {
    fn from(v: EnumConstant) -> Self {
        Value::Enum(v)
    }
}

impl From<HostObject> for Value {
    fn from(v: HostObject) -> Self {
        Value::Object(v)
    }
}

impl From<PatternMatch> for Value {
    fn from(v: PatternMatch) -> Self {
        Value::Match(Arc::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(Arc::new(v.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>> From<IndexMap<String, T>> for Value {
    fn from(v: IndexMap<String, T>) -> Self {
        Value::Map(Arc::new(v.into_iter().map(|(k, v)| (k, v.into())).collect()))
    }
}

/// Host enumeration exposed to scripts as named constants.
pub trait ScriptEnum: Any + Send + Sync + Copy {
    fn constants() -> &'static [Self];
    fn constant_name(&self) -> &'static str;
}

#[derive(Clone, Copy)]
pub struct EnumConstant {
    class: Class,
    name: &'static str,
    ordinal: usize,
}

impl EnumConstant {
    pub fn of<E: ScriptEnum>(value: E) -> Self {
        let name = value.constant_name();
        let ordinal = E::constants()
            .iter()
            .position(|c| c.constant_name() == name)
            .unwrap_or(0);
        EnumConstant {
            class: Class::of::<E>(),
            name,
            ordinal,
        }
    }

    pub fn lookup<E: ScriptEnum>(name: &str) -> Option<Self> {
        E::constants()
            .iter()
            .find(|c| c.constant_name() == name)
            .map(|c| Self::of(*c))
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Back to the host enum, if this constant belongs to `E`.
    pub fn to<E: ScriptEnum>(&self) -> Option<E> {
        if self.class != Class::of::<E>() {
            return None;
        }
        E::constants().get(self.ordinal).copied()
    }
}

impl PartialEq for EnumConstant {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.ordinal == other.ordinal
    }
}

impl Eq for EnumConstant {}

/// Result of a successful `Pattern` parameter match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    groups: Vec<Option<String>>,
    names: Vec<Option<String>>,
}

impl PatternMatch {
    pub fn new(groups: Vec<Option<String>>, names: Vec<Option<String>>) -> Self {
        PatternMatch { groups, names }
    }

    pub(crate) fn from_captures(re: &regex::Regex, caps: &regex::Captures<'_>) -> Self {
        PatternMatch {
            groups: caps
                .iter()
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
            names: re.capture_names().map(|n| n.map(str::to_string)).collect(),
        }
    }

    /// Matched text of the whole pattern.
    pub fn text(&self) -> &str {
        self.group(0).unwrap_or("")
    }

    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    pub fn named(&self, name: &str) -> Option<&str> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.group(index)
    }

    /// Number of groups, including group 0.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Shared handle to a host value.
#[derive(Clone)]
pub struct HostObject {
    class: Class,
    inner: Arc<AnyRef>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        HostObject {
            class: Class::of::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        HostObject {
            class: Class::of::<T>(),
            inner: value,
        }
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn as_any(&self) -> &AnyRef {
        &*self.inner
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({})", self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Weather {
        Clear,
        Rain,
    }

    impl ScriptEnum for Weather {
        fn constants() -> &'static [Self] {
            &[Weather::Clear, Weather::Rain]
        }

        fn constant_name(&self) -> &'static str {
            match self {
                Weather::Clear => "CLEAR",
                Weather::Rain => "RAIN",
            }
        }
    }

    #[test]
    fn int_and_float_compare_numerically() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::Float(2.5));
        assert_ne!(Value::Int(1), Value::str("1"));
    }

    #[test]
    fn display_quotes_only_nested_strings() {
        assert_eq!(Value::str("hi").to_string(), "hi");
        let list: Value = vec![Value::str("a"), Value::Int(1), Value::Float(1.0)].into();
        assert_eq!(list.to_string(), "[\"a\", 1, 1.0]");
        assert_eq!(Value::Duration(Duration::from_secs(90)).to_string(), "1m30s");
    }

    #[test]
    fn enum_constants_round_trip() {
        let rain = EnumConstant::of(Weather::Rain);
        assert_eq!(rain.name(), "RAIN");
        assert_eq!(rain.ordinal(), 1);
        assert_eq!(rain.to::<Weather>(), Some(Weather::Rain));
        assert_eq!(EnumConstant::lookup::<Weather>("CLEAR").unwrap().ordinal(), 0);
        assert!(EnumConstant::lookup::<Weather>("SNOW").is_none());
    }

    #[test]
    fn host_objects_compare_by_identity() {
        let a = HostObject::new(String::from("x"));
        let b = HostObject::new(String::from("x"));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(a.downcast_ref::<String>().map(|s| s.as_str()), Some("x"));
        assert!(a.downcast::<u32>().is_none());
    }

    #[test]
    fn pattern_match_groups() {
        let re = regex::Regex::new(r"(?P<key>\w+)=(\d+)").unwrap();
        let caps = re.captures("speed=10").unwrap();
        let m = PatternMatch::from_captures(&re, &caps);
        assert_eq!(m.text(), "speed=10");
        assert_eq!(m.named("key"), Some("speed"));
        assert_eq!(m.group(2), Some("10"));
        assert_eq!(m.group(3), None);
        assert_eq!(m.group_count(), 3);
    }
}
