//! `helix:text`

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::conversion::Kind;
use crate::runner::ds::value::{PatternMatch, Value};
use crate::runner::plugin::binding::{BindingTarget, Fallback, Param};
use crate::runner::plugin::namespace::Namespace;

/// `key = value` entry accepted by `text.group`.
pub const ENTRY_PATTERN: &str = r"^\s*(?P<key>[^=\s]+)\s*=\s*(?P<value>.*?)\s*$";

fn text(name: &str) -> BindingTarget {
    BindingTarget::new(name).param(Param::new("text", Kind::Str).not_null())
}

fn text_and(name: &str, label: &str) -> BindingTarget {
    text(name).param(Param::new(label, Kind::Str).not_null())
}

fn group(entry: &PatternMatch, name: &str) -> Result<Value, ScriptError> {
    match name {
        "key" | "value" => Ok(entry.named(name).map(Value::str).unwrap_or(Value::Null)),
        other => Err(ScriptError::new(format!(
            "entries have groups 'key' and 'value', not '{}'",
            other
        ))),
    }
}

pub fn register(ns: &Namespace) -> Result<(), RegistrationError> {
    ns.method(text("upper"), |args| Ok(args.get::<String>(0)?.to_uppercase()))?
        .method(text("lower"), |args| Ok(args.get::<String>(0)?.to_lowercase()))?
        .method(text("trim"), |args| Ok(args.get::<String>(0)?.trim().to_string()))?
        .method(text_and("contains", "part"), |args| {
            Ok(args.get::<String>(0)?.contains(args.get::<String>(1)?.as_str()))
        })?
        .method(text_and("starts_with", "prefix"), |args| {
            Ok(args.get::<String>(0)?.starts_with(args.get::<String>(1)?.as_str()))
        })?
        .method(text_and("ends_with", "suffix"), |args| {
            Ok(args.get::<String>(0)?.ends_with(args.get::<String>(1)?.as_str()))
        })?
        .method(text_and("split", "separator"), |args| {
            let s: String = args.get(0)?;
            let sep: String = args.get(1)?;
            if sep.is_empty() {
                return Err(ScriptError::new("separator must not be empty"));
            }
            Ok(s.split(sep.as_str()).map(Value::str).collect::<Vec<_>>())
        })?
        .method(
            BindingTarget::new("join")
                .param(Param::new("items", Kind::list(Kind::Any)).not_null())
                .param(Param::new("separator", Kind::Str).optional(Fallback::Str(String::new()))),
            |args| {
                let items: Vec<Value> = args.get(0)?;
                let sep: String = args.get(1)?;
                let parts: Vec<String> = items.iter().map(Value::to_string).collect();
                Ok(parts.join(&sep))
            },
        )?
        .method(
            text_and("replace", "from").param(Param::new("to", Kind::Str).not_null()),
            |args| {
                let s: String = args.get(0)?;
                Ok(s.replace(args.get::<String>(1)?.as_str(), &args.get::<String>(2)?))
            },
        )?
        .method(
            BindingTarget::new("group")
                .param(
                    Param::new("entry", Kind::Match)
                        .not_null()
                        .pattern(ENTRY_PATTERN, false),
                )
                .param(Param::new("name", Kind::Str).optional(Fallback::Str("value".into()))),
            |args| {
                let entry: std::sync::Arc<PatternMatch> = args.get(0)?;
                group(&entry, &args.get::<String>(1)?)
            },
        )?;
    Ok(())
}
