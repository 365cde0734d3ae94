//! Host classes and the ancestry table.
//!
//! A [`Class`] is the runtime identity of a host type. Rust has no subtype
//! relation between concrete types, so assignability is declared explicitly:
//! `declare::<Sub, Super>(projection)` records that every `Sub` can be viewed
//! as a `Super` through a borrowing projection. Lookups walk the table
//! breadth first.

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Borrowed, type-erased host value.
pub type AnyRef = dyn Any + Send + Sync;

type Step = Arc<dyn for<'a> Fn(&'a AnyRef) -> Option<&'a AnyRef> + Send + Sync>;

fn step<F>(f: F) -> Step
where
    F: for<'a> Fn(&'a AnyRef) -> Option<&'a AnyRef> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Copy)]
pub struct Class {
    id: TypeId,
    name: &'static str,
}

impl Class {
    pub fn of<T: Any + ?Sized>() -> Self {
        Class {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without generic arguments, e.g. `Player` for
    /// `game::model::Player`.
    pub fn simple_name(&self) -> &'static str {
        let base = match self.name.find('<') {
            Some(i) => &self.name[..i],
            None => self.name,
        };
        match base.rfind("::") {
            Some(i) => &base[i + 2..],
            None => base,
        }
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

/// Chain of upcasts from one class to an ancestor.
#[derive(Clone, Default)]
pub struct Projection {
    steps: Vec<Step>,
}

impl Projection {
    pub fn identity() -> Self {
        Projection { steps: vec![] }
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply<'a>(&self, value: &'a AnyRef) -> Option<&'a AnyRef> {
        let mut current = value;
        for s in &self.steps {
            current = s(current)?;
        }
        Some(current)
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Projection({} steps)", self.steps.len())
    }
}

#[derive(Clone, Default)]
pub struct ClassTable {
    supers: HashMap<TypeId, Vec<(Class, Step)>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `Sub` as assignable to `Super`. Returns false if the edge
    /// already existed.
    pub fn declare<Sub, Super>(&mut self, project: fn(&Sub) -> &Super) -> bool
    where
        Sub: Any + Send + Sync,
        Super: Any + Send + Sync,
    {
        let parent = Class::of::<Super>();
        let edges = self.supers.entry(TypeId::of::<Sub>()).or_insert_with(Vec::new);
        if edges.iter().any(|(c, _)| *c == parent) {
            return false;
        }
        edges.push((
            parent,
            step(move |value| {
                value
                    .downcast_ref::<Sub>()
                    .map(|sub| project(sub) as &AnyRef)
            }),
        ));
        true
    }

    /// All ancestors of `class` in breadth first order, nearest first.
    pub fn ancestors(&self, class: Class) -> Vec<Class> {
        let mut seen = HashSet::new();
        let mut order = vec![];
        let mut queue = VecDeque::new();
        seen.insert(class.id);
        queue.push_back(class);
        while let Some(current) = queue.pop_front() {
            if let Some(edges) = self.supers.get(&current.id) {
                for (parent, _) in edges {
                    if seen.insert(parent.id) {
                        order.push(*parent);
                        queue.push_back(*parent);
                    }
                }
            }
        }
        order
    }

    /// Shortest projection from `from` to `to`, if `to` is `from` or one of
    /// its ancestors.
    pub fn projection(&self, from: Class, to: Class) -> Option<Projection> {
        if from == to {
            return Some(Projection::identity());
        }
        let mut came_from: HashMap<TypeId, (TypeId, Step)> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(from.id);
        while let Some(current) = queue.pop_front() {
            let edges = match self.supers.get(&current) {
                Some(e) => e,
                None => continue,
            };
            for (parent, s) in edges {
                if parent.id == from.id || came_from.contains_key(&parent.id) {
                    continue;
                }
                came_from.insert(parent.id, (current, s.clone()));
                if parent.id == to.id {
                    let mut steps = vec![];
                    let mut cursor = to.id;
                    while cursor != from.id {
                        let (prev, s) = &came_from[&cursor];
                        steps.push(s.clone());
                        cursor = *prev;
                    }
                    steps.reverse();
                    return Some(Projection { steps });
                }
                queue.push_back(parent.id);
            }
        }
        None
    }

    pub fn is_assignable(&self, from: Class, to: Class) -> bool {
        from == to || self.ancestors(from).contains(&to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entity {
        id: u32,
    }

    struct Living {
        entity: Entity,
        health: u32,
    }

    struct Player {
        living: Living,
        name: &'static str,
    }

    fn table() -> ClassTable {
        let mut t = ClassTable::new();
        t.declare::<Player, Living>(|p| &p.living);
        t.declare::<Living, Entity>(|l| &l.entity);
        t
    }

    #[test]
    fn simple_name_strips_path_and_generics() {
        assert_eq!(Class::of::<Player>().simple_name(), "Player");
        assert_eq!(Class::of::<Vec<String>>().simple_name(), "Vec");
        assert_eq!(Class::of::<u8>().simple_name(), "u8");
    }

    #[test]
    fn ancestors_are_transitive_and_nearest_first() {
        let t = table();
        assert_eq!(
            t.ancestors(Class::of::<Player>()),
            vec![Class::of::<Living>(), Class::of::<Entity>()]
        );
        assert!(t.is_assignable(Class::of::<Player>(), Class::of::<Entity>()));
        assert!(!t.is_assignable(Class::of::<Entity>(), Class::of::<Player>()));
    }

    #[test]
    fn projection_walks_every_step() {
        let t = table();
        let player = Player {
            living: Living {
                entity: Entity { id: 7 },
                health: 20,
            },
            name: "steve",
        };
        let p = t
            .projection(Class::of::<Player>(), Class::of::<Entity>())
            .unwrap();
        let entity = p.apply(&player).unwrap().downcast_ref::<Entity>().unwrap();
        assert_eq!(entity.id, 7);

        let p = t
            .projection(Class::of::<Player>(), Class::of::<Living>())
            .unwrap();
        let living = p.apply(&player).unwrap().downcast_ref::<Living>().unwrap();
        assert_eq!(living.health, 20);
        assert_eq!(player.name, "steve");
    }

    #[test]
    fn duplicate_edges_are_ignored_and_cycles_terminate() {
        let mut t = table();
        assert!(!t.declare::<Player, Living>(|p| &p.living));
        assert!(t
            .projection(Class::of::<Entity>(), Class::of::<Player>())
            .is_none());
    }
}
