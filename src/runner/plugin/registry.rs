//! Registry arena holding every module's namespace tree.
//!
//! Namespaces, types, and triggers live in flat vectors and refer to each
//! other by index, so the parent links and the type/extension relation
//! need no reference counting between nodes. All mutation goes through
//! a single write lock; each lookup takes the read lock for just that
//! lookup.
//!
//! Instance and static members of a class are served from a merged
//! [`ClassView`] built from the canonical types and every extension of that
//! class, later registrations overriding earlier ones. Views are cached
//! until the next mutation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{MemberKind, RegistrationError};
use crate::identifier;
use crate::runner::ds::class::{Class, ClassTable, Projection};
use crate::runner::trigger::{TriggerHandler, TriggerRef};

use super::binding::{FieldBinding, Method, Signature};
use super::namespace::Namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeNodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(usize);

/// Descriptive metadata of a loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
}

impl ModuleInfo {
    /// Metadata with only an id; the display name defaults to the id.
    pub fn new(id: &str) -> Self {
        ModuleInfo {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            version: String::new(),
            author: String::new(),
        }
    }
}

struct ModuleEntry {
    info: ModuleInfo,
    root: NamespaceId,
    exported: bool,
    std: bool,
    live: bool,
}

struct NamespaceNode {
    name: String,
    parent: Option<NamespaceId>,
    module: usize,
    children: IndexMap<String, NamespaceId>,
    types: IndexMap<String, TypeNodeId>,
    fields: IndexMap<String, Arc<FieldBinding>>,
    methods: IndexMap<String, Arc<Method>>,
    triggers: IndexMap<String, TriggerId>,
}

struct Member<T> {
    seq: u64,
    value: Arc<T>,
}

struct TypeNode {
    class: Class,
    name: String,
    namespace: NamespaceId,
    module: usize,
    extension: bool,
    instance_methods: IndexMap<String, Member<Method>>,
    instance_fields: IndexMap<String, Member<FieldBinding>>,
    static_methods: IndexMap<String, Member<Method>>,
    static_fields: IndexMap<String, Member<FieldBinding>>,
}

struct TriggerNode {
    key: String,
    path: String,
    module: usize,
    class: Option<Class>,
    handler: TriggerHandler,
    signature: Option<Arc<Signature>>,
    allow_async: bool,
}

/// What a name denotes inside a namespace or type.
#[derive(Clone)]
pub(crate) enum Entry {
    Namespace(NamespaceId),
    Type(Class),
    Field(Arc<FieldBinding>),
    Method(Arc<Method>),
    Trigger(TriggerId),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Namespace(id) => write!(f, "Namespace({:?})", id),
            Entry::Type(c) => write!(f, "Type({})", c),
            Entry::Field(b) => write!(f, "Field({})", b.name()),
            Entry::Method(m) => write!(f, "Method({})", m.name()),
            Entry::Trigger(id) => write!(f, "Trigger({:?})", id),
        }
    }
}

/// Copy of a trigger's dispatch data, detached from the lock.
#[derive(Clone)]
pub(crate) struct TriggerSnapshot {
    pub path: String,
    pub class: Option<Class>,
    pub handler: TriggerHandler,
    pub signature: Option<Arc<Signature>>,
    pub allow_async: bool,
}

/// Merged members of one class across its canonical types and extensions.
#[derive(Default)]
pub(crate) struct ClassView {
    pub instance_methods: IndexMap<String, Arc<Method>>,
    pub instance_fields: IndexMap<String, Arc<FieldBinding>>,
    pub static_methods: IndexMap<String, Arc<Method>>,
    pub static_fields: IndexMap<String, Arc<FieldBinding>>,
}

/// Member being added to a type node.
pub(crate) enum TypeMember {
    InstanceMethod(Method),
    InstanceField(FieldBinding),
    StaticMethod(Method),
    StaticField(FieldBinding),
}

impl TypeMember {
    fn name(&self) -> &str {
        match self {
            TypeMember::InstanceMethod(m) | TypeMember::StaticMethod(m) => m.name(),
            TypeMember::InstanceField(f) | TypeMember::StaticField(f) => f.name(),
        }
    }

    fn kind(&self) -> MemberKind {
        match self {
            TypeMember::InstanceMethod(_) => MemberKind::InstanceMethod,
            TypeMember::InstanceField(_) => MemberKind::InstanceField,
            TypeMember::StaticMethod(_) => MemberKind::Method,
            TypeMember::StaticField(_) => MemberKind::Field,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    modules: Vec<ModuleEntry>,
    module_ids: HashMap<String, usize>,
    namespaces: Vec<NamespaceNode>,
    types: Vec<TypeNode>,
    triggers: Vec<TriggerNode>,
    classes: ClassTable,
    seq: u64,
}

impl RegistryState {
    fn is_live(&self, module: usize) -> bool {
        self.modules.get(module).map_or(false, |m| m.live)
    }

    fn path_of(&self, id: NamespaceId) -> String {
        let mut segments = vec![];
        let mut cursor = Some(id);
        let mut module = 0;
        while let Some(current) = cursor {
            let node = &self.namespaces[current.0];
            module = node.module;
            if node.parent.is_some() {
                segments.push(node.name.clone());
            }
            cursor = node.parent;
        }
        segments.reverse();
        let module_id = &self.modules[module].info.id;
        if segments.is_empty() {
            module_id.clone()
        } else {
            format!("{}:{}", module_id, segments.join("."))
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn lookup(&self, ns: NamespaceId, key: &str) -> Option<Entry> {
        let node = self.namespaces.get(ns.0)?;
        if let Some(id) = node.children.get(key) {
            return Some(Entry::Namespace(*id));
        }
        if let Some(id) = node.types.get(key) {
            return Some(Entry::Type(self.types[id.0].class));
        }
        if let Some(f) = node.fields.get(key) {
            return Some(Entry::Field(f.clone()));
        }
        if let Some(m) = node.methods.get(key) {
            return Some(Entry::Method(m.clone()));
        }
        node.triggers.get(key).map(|id| Entry::Trigger(*id))
    }

    fn build_view(&self, class: Class) -> ClassView {
        let nodes: Vec<&TypeNode> = self
            .types
            .iter()
            .filter(|t| t.class == class && self.is_live(t.module))
            .collect();
        fn merge<T>(nodes: &[&TypeNode], pick: fn(&TypeNode) -> &IndexMap<String, Member<T>>) -> IndexMap<String, Arc<T>> {
            let mut members: Vec<(u64, &String, &Arc<T>)> = nodes
                .iter()
                .flat_map(|n| pick(n).iter().map(|(k, m)| (m.seq, k, &m.value)))
                .collect();
            members.sort_by_key(|(seq, _, _)| *seq);
            let mut merged = IndexMap::new();
            for (_, key, value) in members {
                merged.insert(key.clone(), value.clone());
            }
            merged
        }
        ClassView {
            instance_methods: merge(&nodes, |n| &n.instance_methods),
            instance_fields: merge(&nodes, |n| &n.instance_fields),
            static_methods: merge(&nodes, |n| &n.static_methods),
            static_fields: merge(&nodes, |n| &n.static_fields),
        }
    }
}

struct ViewCache {
    generation: u64,
    views: HashMap<Class, Arc<ClassView>>,
}

struct RegistryInner {
    state: RwLock<RegistryState>,
    generation: AtomicU64,
    views: Mutex<ViewCache>,
}

/// Shared handle to the registration tree of every loaded module.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                state: RwLock::new(RegistryState::default()),
                generation: AtomicU64::new(0),
                views: Mutex::new(ViewCache {
                    generation: 0,
                    views: HashMap::new(),
                }),
            }),
        }
    }

    /// Bumped on every mutation; caches keyed on it stay coherent.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn same(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── modules ──────────────────────────────────────────────────────

    /// Create the root namespace of a module. Exported modules are visible
    /// to unqualified names in scripts of other modules.
    pub fn register_module(
        &self,
        info: ModuleInfo,
        exported: bool,
    ) -> Result<Namespace, RegistrationError> {
        self.add_module(info, exported, false)
    }

    pub(crate) fn add_module(
        &self,
        info: ModuleInfo,
        exported: bool,
        std: bool,
    ) -> Result<Namespace, RegistrationError> {
        identifier::validate(&info.id)?;
        let mut state = self.inner.state.write();
        if state.module_ids.contains_key(&info.id) {
            return Err(RegistrationError::DuplicateModule(info.id));
        }
        let module = state.modules.len();
        let root = NamespaceId(state.namespaces.len());
        state.namespaces.push(NamespaceNode {
            name: info.id.clone(),
            parent: None,
            module,
            children: IndexMap::new(),
            types: IndexMap::new(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            triggers: IndexMap::new(),
        });
        state.module_ids.insert(info.id.clone(), module);
        debug!(target: "helix::registry", "module '{}' {} registered", info.id, info.version);
        state.modules.push(ModuleEntry {
            info,
            root,
            exported,
            std,
            live: true,
        });
        drop(state);
        self.touch();
        Ok(Namespace::new(self.clone(), root))
    }

    /// Drop a module from resolution and dispatch, e.g. after its load
    /// failed. Its nodes stay in the arena but are never reached again.
    pub(crate) fn remove_module(&self, id: &str) -> bool {
        let mut state = self.inner.state.write();
        let index = match state.module_ids.remove(id) {
            Some(i) => i,
            None => return false,
        };
        state.modules[index].live = false;
        drop(state);
        self.touch();
        debug!(target: "helix::registry", "module '{}' removed", id);
        true
    }

    pub fn root(&self, module_id: &str) -> Option<Namespace> {
        self.root_id(module_id)
            .map(|id| Namespace::new(self.clone(), id))
    }

    pub(crate) fn root_id(&self, module_id: &str) -> Option<NamespaceId> {
        let state = self.inner.state.read();
        state
            .module_ids
            .get(module_id)
            .map(|i| state.modules[*i].root)
    }

    pub fn modules(&self) -> Vec<ModuleInfo> {
        let state = self.inner.state.read();
        state
            .modules
            .iter()
            .filter(|m| m.live)
            .map(|m| m.info.clone())
            .collect()
    }

    /// Roots consulted for an unqualified name: the home module first, then
    /// every other exported module in load order, the built-in library last.
    pub(crate) fn resolution_roots(
        &self,
        home: Option<&str>,
    ) -> Result<Vec<NamespaceId>, RegistrationError> {
        let state = self.inner.state.read();
        let home_index = match home {
            Some(id) => Some(
                *state
                    .module_ids
                    .get(id)
                    .ok_or_else(|| RegistrationError::UnknownModule(id.to_string()))?,
            ),
            None => None,
        };
        let mut roots = vec![];
        if let Some(i) = home_index {
            roots.push(state.modules[i].root);
        }
        for std_pass in [false, true] {
            for (i, m) in state.modules.iter().enumerate() {
                if m.live && m.exported && m.std == std_pass && Some(i) != home_index {
                    roots.push(m.root);
                }
            }
        }
        Ok(roots)
    }

    // ── classes ──────────────────────────────────────────────────────

    /// Declare `Sub` assignable to `Super`. Objects of `Sub` then match
    /// triggers, parameters, and members declared for `Super`.
    pub fn declare_supertype<Sub, Super>(&self, project: fn(&Sub) -> &Super)
    where
        Sub: std::any::Any + Send + Sync,
        Super: std::any::Any + Send + Sync,
    {
        let added = self.inner.state.write().classes.declare(project);
        if added {
            debug!(
                target: "helix::registry",
                "{} declared assignable to {}",
                Class::of::<Sub>(),
                Class::of::<Super>()
            );
            self.touch();
        }
    }

    pub fn is_assignable(&self, from: Class, to: Class) -> bool {
        from == to || self.inner.state.read().classes.is_assignable(from, to)
    }

    pub fn projection(&self, from: Class, to: Class) -> Option<Projection> {
        if from == to {
            return Some(Projection::identity());
        }
        self.inner.state.read().classes.projection(from, to)
    }

    fn ancestors(&self, class: Class) -> Vec<Class> {
        self.inner.state.read().classes.ancestors(class)
    }

    // ── namespaces ───────────────────────────────────────────────────

    pub(crate) fn namespace_name(&self, id: NamespaceId) -> String {
        self.inner.state.read().namespaces[id.0].name.clone()
    }

    pub(crate) fn namespace_path(&self, id: NamespaceId) -> String {
        self.inner.state.read().path_of(id)
    }

    pub(crate) fn namespace_parent(&self, id: NamespaceId) -> Option<NamespaceId> {
        self.inner.state.read().namespaces[id.0].parent
    }

    pub(crate) fn namespace_module(&self, id: NamespaceId) -> String {
        let state = self.inner.state.read();
        let module = state.namespaces[id.0].module;
        state.modules[module].info.id.clone()
    }

    pub(crate) fn member_names(&self, id: NamespaceId, kind: MemberKind) -> Vec<String> {
        let state = self.inner.state.read();
        let node = &state.namespaces[id.0];
        match kind {
            MemberKind::Namespace => node.children.keys().cloned().collect(),
            MemberKind::Type => node.types.keys().cloned().collect(),
            MemberKind::Method => node.methods.keys().cloned().collect(),
            MemberKind::Field => node.fields.keys().cloned().collect(),
            MemberKind::Trigger => node.triggers.keys().cloned().collect(),
            MemberKind::InstanceMethod | MemberKind::InstanceField => vec![],
        }
    }

    pub(crate) fn child_namespace(
        &self,
        parent: NamespaceId,
        key: &str,
    ) -> Result<NamespaceId, RegistrationError> {
        identifier::validate(key)?;
        let mut state = self.inner.state.write();
        if let Some(existing) = state.namespaces[parent.0].children.get(key) {
            return Ok(*existing);
        }
        let id = NamespaceId(state.namespaces.len());
        let module = state.namespaces[parent.0].module;
        state.namespaces.push(NamespaceNode {
            name: key.to_string(),
            parent: Some(parent),
            module,
            children: IndexMap::new(),
            types: IndexMap::new(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            triggers: IndexMap::new(),
        });
        state.namespaces[parent.0].children.insert(key.to_string(), id);
        debug!(target: "helix::registry", "namespace {} created", state.path_of(id));
        drop(state);
        self.touch();
        Ok(id)
    }

    pub(crate) fn add_static_method(
        &self,
        ns: NamespaceId,
        method: Method,
    ) -> Result<(), RegistrationError> {
        let mut state = self.inner.state.write();
        let key = method.name().to_string();
        if state.namespaces[ns.0].methods.contains_key(&key) {
            return Err(RegistrationError::AlreadyRegistered {
                kind: MemberKind::Method,
                key,
                namespace: state.path_of(ns),
            });
        }
        debug!(target: "helix::registry", "method {}.{} registered", state.path_of(ns), key);
        state.namespaces[ns.0].methods.insert(key, Arc::new(method));
        drop(state);
        self.touch();
        Ok(())
    }

    pub(crate) fn add_static_field(
        &self,
        ns: NamespaceId,
        field: FieldBinding,
    ) -> Result<(), RegistrationError> {
        identifier::validate(field.name())?;
        let mut state = self.inner.state.write();
        let key = field.name().to_string();
        if state.namespaces[ns.0].fields.contains_key(&key) {
            return Err(RegistrationError::AlreadyRegistered {
                kind: MemberKind::Field,
                key,
                namespace: state.path_of(ns),
            });
        }
        debug!(target: "helix::registry", "field {}.{} registered", state.path_of(ns), key);
        state.namespaces[ns.0].fields.insert(key, Arc::new(field));
        drop(state);
        self.touch();
        Ok(())
    }

    // ── types ────────────────────────────────────────────────────────

    pub(crate) fn add_type(
        &self,
        ns: NamespaceId,
        class: Class,
        name: &str,
        extension: bool,
    ) -> Result<TypeNodeId, RegistrationError> {
        let mut state = self.inner.state.write();
        if !extension {
            identifier::validate(name)?;
            let node = &state.namespaces[ns.0];
            let taken = node.types.contains_key(name)
                || node.types.values().any(|t| state.types[t.0].class == class);
            if taken {
                return Err(RegistrationError::AlreadyRegistered {
                    kind: MemberKind::Type,
                    key: name.to_string(),
                    namespace: state.path_of(ns),
                });
            }
        }
        let id = TypeNodeId(state.types.len());
        let module = state.namespaces[ns.0].module;
        state.types.push(TypeNode {
            class,
            name: name.to_string(),
            namespace: ns,
            module,
            extension,
            instance_methods: IndexMap::new(),
            instance_fields: IndexMap::new(),
            static_methods: IndexMap::new(),
            static_fields: IndexMap::new(),
        });
        if !extension {
            state.namespaces[ns.0].types.insert(name.to_string(), id);
        }
        debug!(
            target: "helix::registry",
            "{} {} for {} in {}",
            if extension { "extension" } else { "type" },
            name,
            class.type_name(),
            state.path_of(ns)
        );
        drop(state);
        self.touch();
        Ok(id)
    }

    pub(crate) fn type_info(&self, id: TypeNodeId) -> (Class, String, bool) {
        let state = self.inner.state.read();
        let node = &state.types[id.0];
        (node.class, node.name.clone(), node.extension)
    }

    pub(crate) fn add_type_member(
        &self,
        id: TypeNodeId,
        member: TypeMember,
    ) -> Result<(), RegistrationError> {
        let key = member.name().to_string();
        identifier::validate(&key)?;
        let kind = member.kind();
        let mut state = self.inner.state.write();
        let (class, namespace) = {
            let node = &state.types[id.0];
            (node.class, node.namespace)
        };
        let taken = {
            let node = &state.types[id.0];
            match &member {
                TypeMember::InstanceMethod(_) => node.instance_methods.contains_key(&key),
                TypeMember::InstanceField(_) => node.instance_fields.contains_key(&key),
                TypeMember::StaticMethod(_) => node.static_methods.contains_key(&key),
                TypeMember::StaticField(_) => node.static_fields.contains_key(&key),
            }
        };
        if taken {
            return Err(RegistrationError::AlreadyRegistered {
                kind,
                key,
                namespace: format!("{}.{}", state.path_of(namespace), class.simple_name()),
            });
        }
        let shadowed = state.types.iter().enumerate().any(|(i, t)| {
            i != id.0
                && t.class == class
                && state.is_live(t.module)
                && match &member {
                    TypeMember::InstanceMethod(_) => t.instance_methods.contains_key(&key),
                    TypeMember::InstanceField(_) => t.instance_fields.contains_key(&key),
                    TypeMember::StaticMethod(_) => t.static_methods.contains_key(&key),
                    TypeMember::StaticField(_) => t.static_fields.contains_key(&key),
                }
        });
        if shadowed {
            warn!(
                target: "helix::registry",
                "{} '{}' of {} is redefined by {}; the latest registration wins",
                kind,
                key,
                class.simple_name(),
                state.path_of(namespace)
            );
        }
        let seq = state.next_seq();
        let node = &mut state.types[id.0];
        match member {
            TypeMember::InstanceMethod(m) => {
                node.instance_methods.insert(key, Member { seq, value: Arc::new(m) });
            }
            TypeMember::InstanceField(f) => {
                node.instance_fields.insert(key, Member { seq, value: Arc::new(f) });
            }
            TypeMember::StaticMethod(m) => {
                node.static_methods.insert(key, Member { seq, value: Arc::new(m) });
            }
            TypeMember::StaticField(f) => {
                node.static_fields.insert(key, Member { seq, value: Arc::new(f) });
            }
        }
        drop(state);
        self.touch();
        Ok(())
    }

    pub(crate) fn class_view(&self, class: Class) -> Arc<ClassView> {
        let generation = self.generation();
        {
            let mut cache = self.inner.views.lock();
            if cache.generation != generation {
                cache.views.clear();
                cache.generation = generation;
            }
            if let Some(view) = cache.views.get(&class) {
                return view.clone();
            }
        }
        let view = Arc::new(self.inner.state.read().build_view(class));
        let mut cache = self.inner.views.lock();
        if cache.generation == generation {
            cache.views.insert(class, view.clone());
        }
        view
    }

    /// Static member of a type, across every extension of its class.
    pub(crate) fn static_member(&self, class: Class, key: &str) -> Option<Entry> {
        let view = self.class_view(class);
        if let Some(f) = view.static_fields.get(key) {
            return Some(Entry::Field(f.clone()));
        }
        view.static_methods.get(key).map(|m| Entry::Method(m.clone()))
    }

    fn find_instance<T>(
        &self,
        class: Class,
        pick: fn(&ClassView) -> &IndexMap<String, Arc<T>>,
        key: &str,
    ) -> Option<(Arc<T>, Projection)> {
        if let Some(found) = pick(&self.class_view(class)).get(key) {
            return Some((found.clone(), Projection::identity()));
        }
        for ancestor in self.ancestors(class) {
            if let Some(found) = pick(&self.class_view(ancestor)).get(key) {
                let projection = self.projection(class, ancestor)?;
                return Some((found.clone(), projection));
            }
        }
        None
    }

    pub(crate) fn instance_method(&self, class: Class, key: &str) -> Option<(Arc<Method>, Projection)> {
        self.find_instance(class, |v| &v.instance_methods, key)
    }

    pub(crate) fn instance_field(
        &self,
        class: Class,
        key: &str,
    ) -> Option<(Arc<FieldBinding>, Projection)> {
        self.find_instance(class, |v| &v.instance_fields, key)
    }

    // ── triggers ─────────────────────────────────────────────────────

    pub(crate) fn add_trigger(
        &self,
        ns: NamespaceId,
        key: &str,
        class: Option<Class>,
        handler: TriggerHandler,
        signature: Option<Signature>,
        allow_async: bool,
    ) -> Result<TriggerRef, RegistrationError> {
        identifier::validate(key)?;
        let mut state = self.inner.state.write();
        let ns_path = state.path_of(ns);
        if state.namespaces[ns.0].triggers.contains_key(key) {
            return Err(RegistrationError::AlreadyRegistered {
                kind: MemberKind::Trigger,
                key: key.to_string(),
                namespace: ns_path,
            });
        }
        let path = if ns_path.contains(':') {
            format!("{}.{}", ns_path, key)
        } else {
            format!("{}:{}", ns_path, key)
        };
        let id = TriggerId(state.triggers.len());
        let module = state.namespaces[ns.0].module;
        state.triggers.push(TriggerNode {
            key: key.to_string(),
            path: path.clone(),
            module,
            class,
            handler,
            signature: signature.map(Arc::new),
            allow_async,
        });
        state.namespaces[ns.0].triggers.insert(key.to_string(), id);
        debug!(
            target: "helix::registry",
            "trigger {} registered for {}",
            path,
            class.map_or("nothing", |c| c.type_name())
        );
        drop(state);
        self.touch();
        Ok(TriggerRef::new(self.clone(), id, path))
    }

    pub(crate) fn set_trigger_async(&self, id: TriggerId, allow: bool) {
        if let Some(t) = self.inner.state.write().triggers.get_mut(id.0) {
            t.allow_async = allow;
        }
        self.touch();
    }

    pub(crate) fn trigger(&self, id: TriggerId) -> Option<TriggerSnapshot> {
        let state = self.inner.state.read();
        let t = state.triggers.get(id.0)?;
        if !state.is_live(t.module) {
            return None;
        }
        Some(TriggerSnapshot {
            path: t.path.clone(),
            class: t.class,
            handler: t.handler.clone(),
            signature: t.signature.clone(),
            allow_async: t.allow_async,
        })
    }

    pub(crate) fn trigger_key(&self, id: TriggerId) -> Option<String> {
        self.inner
            .state
            .read()
            .triggers
            .get(id.0)
            .map(|t| t.key.clone())
    }

    /// Live triggers whose declared class accepts `class`, in registration
    /// order.
    pub(crate) fn triggers_for(&self, class: Class) -> Vec<TriggerId> {
        let state = self.inner.state.read();
        state
            .triggers
            .iter()
            .enumerate()
            .filter(|(_, t)| state.is_live(t.module))
            .filter(|(_, t)| match t.class {
                Some(declared) => declared == class || state.classes.is_assignable(class, declared),
                None => false,
            })
            .map(|(i, _)| TriggerId(i))
            .collect()
    }

    pub(crate) fn lookup(&self, ns: NamespaceId, key: &str) -> Option<Entry> {
        self.inner.state.read().lookup(ns, key)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Registry")
            .field("modules", &state.module_ids.keys().collect::<Vec<_>>())
            .field("namespaces", &state.namespaces.len())
            .field("types", &state.types.len())
            .field("triggers", &state.triggers.len())
            .finish()
    }
}
