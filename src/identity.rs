//! Identity tracking and container classification shared by both traversals.
use std::collections::HashMap;

use crate::value::Value;

/// Node address. Only meaningful while the node is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(usize);

impl ObjId {
    pub(crate) fn of<T: ?Sized>(ptr: *const T) -> Self {
        ObjId(ptr as *const () as usize)
    }
}

/// Visited set keyed by node identity, never by value equality.
///
/// Holds a handle to every node it has seen, so no address can be freed and
/// reused by a different node while a walk is in progress.
#[derive(Default)]
pub struct IdentitySet {
    seen: HashMap<ObjId, Value>,
}

impl IdentitySet {
    pub fn new() -> Self { Self::default() }

    /// `true` the first time a node is inserted. Immediates have no identity
    /// and are always reported as new.
    pub fn insert(&mut self, value: &Value) -> bool {
        match value.identity() {
            None => true,
            Some(id) => {
                if self.seen.contains_key(&id) {
                    return false;
                }
                self.seen.insert(id, value.clone());
                true
            }
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        value.identity().is_some_and(|id| self.seen.contains_key(&id))
    }

    pub fn len(&self) -> usize { self.seen.len() }

    pub fn is_empty(&self) -> bool { self.seen.is_empty() }
}

/// Traversal-relevant kind of a live value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// nil, booleans, symbols, numbers: immutable, no identity.
    Immediate,
    /// Strings: freezable, but hold nothing further.
    Leaf,
    /// Enum members: process-wide singletons.
    Singleton,
    /// Class descriptors: shared machinery, never frozen.
    Descriptor,
    Sequence,
    Set,
    Record,
    Map,
    Range,
    Pattern,
    Opaque,
}

pub fn classify(value: &Value) -> Kind {
    match value {
        Value::Nil | Value::Bool(_) | Value::Sym(_) | Value::Int(_) | Value::Float(_) => Kind::Immediate,
        Value::Str(_) => Kind::Leaf,
        Value::Enum(_) => Kind::Singleton,
        Value::Class(_) => Kind::Descriptor,
        Value::Seq(_) => Kind::Sequence,
        Value::Set(_) => Kind::Set,
        Value::Record(_) => Kind::Record,
        Value::Map(_) => Kind::Map,
        Value::Range(_) => Kind::Range,
        Value::Regex(_) => Kind::Pattern,
        Value::Opaque(_) => Kind::Opaque,
    }
}

// ------------------------------- Tests ------------------------------------ //
