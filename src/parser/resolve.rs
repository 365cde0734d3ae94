//! Parse time name resolution against the registry.
//!
//! A path resolves through the first root that knows its first segment:
//! the home module, then every exported module in load order, then the
//! built-in library. Later segments walk child namespaces and type
//! statics until a field is reached; what follows a field is an instance
//! member chain evaluated at run time.

use std::sync::Arc;

use tracing::trace;

use crate::error::RegistrationError;
use crate::runner::plugin::binding::{FieldBinding, Method};
use crate::runner::plugin::registry::{Entry, NamespaceId, Registry, TriggerId};

/// A dotted name as written, e.g. `game:world.time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathText {
    pub module: Option<String>,
    pub segments: Vec<String>,
}

impl PathText {
    pub fn parse(text: &str) -> Self {
        let (module, rest) = match text.split_once(':') {
            Some((m, rest)) => (Some(m.to_string()), rest),
            None => (None, text),
        };
        PathText {
            module,
            segments: rest.split('.').map(str::to_string).collect(),
        }
    }

    /// Text of the first `count` segments, with the module prefix.
    pub fn prefix(&self, count: usize) -> String {
        let joined = self.segments[..count].join(".");
        match &self.module {
            Some(m) => format!("{}:{}", m, joined),
            None => joined,
        }
    }

    pub fn text(&self) -> String {
        self.prefix(self.segments.len())
    }

    pub fn is_simple(&self) -> bool {
        self.module.is_none() && self.segments.len() == 1
    }
}

pub(crate) enum Resolved {
    /// Static field, possibly followed by instance members.
    Field {
        path: String,
        field: Arc<FieldBinding>,
        members: Vec<String>,
    },
    Method {
        path: String,
        method: Arc<Method>,
    },
    Trigger {
        path: String,
        id: TriggerId,
    },
    /// Namespace or type; neither is a value.
    Container {
        path: String,
        what: &'static str,
    },
    /// First segment is a variable of the frame; the rest are members.
    Variable {
        name: String,
        members: Vec<String>,
    },
}

pub(crate) struct Resolver<'r> {
    registry: &'r Registry,
    roots: Vec<NamespaceId>,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry, home: Option<&str>) -> Result<Self, RegistrationError> {
        Ok(Resolver {
            registry,
            roots: registry.resolution_roots(home)?,
        })
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Resolve `path`. Names for which `is_variable` holds shadow the
    /// registry; unknown first segments fall back to frame variables.
    pub fn resolve(
        &self,
        path: &PathText,
        is_variable: impl Fn(&str) -> bool,
    ) -> Result<Resolved, String> {
        let first = &path.segments[0];
        let variable = || Resolved::Variable {
            name: first.clone(),
            members: path.segments[1..].to_vec(),
        };
        let found = match &path.module {
            Some(module) => {
                let root = self
                    .registry
                    .root_id(module)
                    .ok_or_else(|| format!("unknown module '{}'", module))?;
                Some(self.registry.lookup(root, first).ok_or_else(|| {
                    format!("unknown name '{}' in module '{}'", first, module)
                })?)
            }
            None if is_variable(first) => None,
            None => self
                .roots
                .iter()
                .find_map(|root| self.registry.lookup(*root, first)),
        };
        let mut entry = match found {
            Some(entry) => entry,
            None => {
                if path.segments.len() > 1 && !is_variable(first) {
                    trace!(
                        target: "helix::parser",
                        "'{}' names nothing registered, reading '{}' as a variable",
                        path.text(),
                        first
                    );
                }
                return Ok(variable());
            }
        };
        for (i, segment) in path.segments.iter().enumerate().skip(1) {
            let unknown = || format!("unknown name '{}' in '{}'", segment, path.prefix(i));
            entry = match entry {
                Entry::Namespace(id) => self.registry.lookup(id, segment).ok_or_else(unknown)?,
                Entry::Type(class) => self
                    .registry
                    .static_member(class, segment)
                    .ok_or_else(unknown)?,
                Entry::Field(field) => {
                    return Ok(Resolved::Field {
                        path: path.prefix(i),
                        field,
                        members: path.segments[i..].to_vec(),
                    })
                }
                Entry::Method(_) => {
                    return Err(format!(
                        "'{}' is a method and has no member '{}'",
                        path.prefix(i),
                        segment
                    ))
                }
                Entry::Trigger(_) => {
                    return Err(format!(
                        "'{}' is a trigger and has no member '{}'",
                        path.prefix(i),
                        segment
                    ))
                }
            };
        }
        let text = path.text();
        Ok(match entry {
            Entry::Field(field) => Resolved::Field {
                path: text,
                field,
                members: vec![],
            },
            Entry::Method(method) => Resolved::Method { path: text, method },
            Entry::Trigger(id) => Resolved::Trigger { path: text, id },
            Entry::Namespace(_) => Resolved::Container {
                path: text,
                what: "namespace",
            },
            Entry::Type(_) => Resolved::Container {
                path: text,
                what: "type",
            },
        })
    }
}
