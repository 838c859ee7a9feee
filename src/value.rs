//! Live value graph.
//!
//! A [`Value`] is a cheap handle: cloning it never copies data, it just shares
//! the node. Heap nodes carry a one-way `frozen` bit; once set, every mutation
//! through [`Obj::borrow_mut`] fails with [`Error::Frozen`].
//!
//! Equality and hashing are structural for data (strings, sequences, maps,
//! records…) and by identity for machinery (classes, enum members, opaque host
//! objects). Neither is defined for cyclic graphs; compare those by identity.
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use ordered_float::OrderedFloat;
use regex::Regex;

use crate::error::{Error, Result};
use crate::identity::ObjId;

// -------------------------------- Nodes ---------------------------------- //

/// Payloads that can live behind an [`Obj`]; `KIND` names them in errors.
pub trait Payload {
    const KIND: &'static str;
}

impl Payload for String { const KIND: &'static str = "string"; }
impl Payload for Vec<Value> { const KIND: &'static str = "sequence"; }
impl Payload for IndexSet<Value> { const KIND: &'static str = "set"; }
impl Payload for IndexMap<Value, Value> { const KIND: &'static str = "map"; }
impl Payload for RangeVal { const KIND: &'static str = "range"; }
impl Payload for Regex { const KIND: &'static str = "regex"; }
impl Payload for Record { const KIND: &'static str = "record"; }

struct Node<T> {
    frozen: Cell<bool>,
    data: RefCell<T>,
}

/// Shared, freezable heap node.
pub struct Obj<T>(Rc<Node<T>>);

impl<T> Clone for Obj<T> {
    fn clone(&self) -> Self { Obj(Rc::clone(&self.0)) }
}

impl<T> Obj<T> {
    pub fn new(data: T) -> Self {
        Obj(Rc::new(Node { frozen: Cell::new(false), data: RefCell::new(data) }))
    }

    pub fn id(&self) -> ObjId { ObjId::of(Rc::as_ptr(&self.0)) }

    pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

    pub fn is_frozen(&self) -> bool { self.0.frozen.get() }

    pub fn freeze(&self) { self.0.frozen.set(true) }

    pub fn borrow(&self) -> Ref<'_, T> { self.0.data.borrow() }

    /// Copy one level; the copy starts out mutable.
    pub fn dup(&self) -> Self
    where
        T: Clone,
    {
        Obj::new(self.borrow().clone())
    }
}

impl<T: Payload> Obj<T> {
    pub fn borrow_mut(&self) -> Result<RefMut<'_, T>> {
        if self.is_frozen() {
            return Err(Error::Frozen(T::KIND));
        }
        Ok(self.0.data.borrow_mut())
    }
}

// ------------------------------ Leaf types ------------------------------- //

/// Symbol-like atom. Immutable, compared by content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self { Symbol(Rc::from(s)) }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, ":{}", self.0) }
}

/// Process-wide enum member. Members are singletons; they are never copied.
#[derive(Clone)]
pub struct EnumMember(Rc<EnumMemberData>);

struct EnumMemberData {
    owner: String,
    name: String,
    serialized: Value,
}

impl EnumMember {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, serialized: Value) -> Self {
        EnumMember(Rc::new(EnumMemberData {
            owner: owner.into(),
            name: name.into(),
            serialized,
        }))
    }
    pub fn owner(&self) -> &str { &self.0.owner }
    pub fn name(&self) -> &str { &self.0.name }
    pub fn serialized(&self) -> &Value { &self.0.serialized }
    pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

/// Type descriptor. Shared runtime machinery: its attribute table stays
/// writable forever, no matter what gets frozen around it.
#[derive(Clone)]
pub struct ClassRef(Rc<ClassDesc>);

struct ClassDesc {
    name: String,
    attrs: RefCell<IndexMap<String, Value>>,
}

impl ClassRef {
    pub fn new(name: impl Into<String>) -> Self {
        ClassRef(Rc::new(ClassDesc { name: name.into(), attrs: RefCell::default() }))
    }
    pub fn name(&self) -> &str { &self.0.name }
    pub fn set_attr(&self, key: impl Into<String>, value: Value) {
        self.0.attrs.borrow_mut().insert(key.into(), value);
    }
    pub fn attr(&self, key: &str) -> Option<Value> { self.0.attrs.borrow().get(key).cloned() }
    pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

    /// New descriptor with the same name and a copy of the attribute table.
    pub fn dup(&self) -> Self {
        ClassRef(Rc::new(ClassDesc {
            name: self.0.name.clone(),
            attrs: RefCell::new(self.0.attrs.borrow().clone()),
        }))
    }

    fn id(&self) -> ObjId { ObjId::of(Rc::as_ptr(&self.0)) }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangeVal {
    pub begin: Value,
    pub end: Value,
    pub exclusive: bool,
}

/// Fixed-field record: an instance of `class` with named fields.
#[derive(Clone)]
pub struct Record {
    pub class: ClassRef,
    pub fields: IndexMap<String, Value>,
}

/// Host object that takes part in traversal without exposing its layout.
///
/// Implementors hand out their data-carrying fields through `children` so
/// `deep_freeze` can still reach substructure it knows nothing about.
pub trait OpaqueObject {
    fn type_name(&self) -> &str;
    fn is_frozen(&self) -> bool;
    fn freeze(&self);
    fn children(&self) -> Vec<Value>;
    /// One-level copy; the copy starts out mutable.
    fn dup(&self) -> Rc<dyn OpaqueObject>;
}

// -------------------------------- Value ---------------------------------- //

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Sym(Symbol),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Obj<String>),
    Seq(Obj<Vec<Value>>),
    Set(Obj<IndexSet<Value>>),
    Map(Obj<IndexMap<Value, Value>>),
    Range(Obj<RangeVal>),
    Regex(Obj<Regex>),
    Enum(EnumMember),
    Record(Obj<Record>),
    Class(ClassRef),
    Opaque(Rc<dyn OpaqueObject>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value { Value::Str(Obj::new(s.into())) }
    pub fn sym(s: &str) -> Value { Value::Sym(Symbol::from(s)) }
    pub fn float(x: f64) -> Value { Value::Float(OrderedFloat(x)) }
    pub fn seq(items: Vec<Value>) -> Value { Value::Seq(Obj::new(items)) }

    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Set(Obj::new(items.into_iter().collect()))
    }

    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Value {
        Value::Map(Obj::new(entries.into_iter().collect()))
    }

    pub fn range(begin: Value, end: Value, exclusive: bool) -> Value {
        Value::Range(Obj::new(RangeVal { begin, end, exclusive }))
    }

    pub fn regex(pattern: &str) -> Result<Value> {
        Ok(Value::Regex(Obj::new(Regex::new(pattern)?)))
    }

    pub fn record<I, K>(class: &ClassRef, fields: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Record(Obj::new(Record { class: class.clone(), fields }))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Sym(_) => "symbol",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => String::KIND,
            Value::Seq(_) => <Vec<Value>>::KIND,
            Value::Set(_) => <IndexSet<Value>>::KIND,
            Value::Map(_) => <IndexMap<Value, Value>>::KIND,
            Value::Range(_) => RangeVal::KIND,
            Value::Regex(_) => Regex::KIND,
            Value::Enum(_) => "enum member",
            Value::Record(_) => Record::KIND,
            Value::Class(_) => "class",
            Value::Opaque(_) => "object",
        }
    }

    pub fn is_nil(&self) -> bool { matches!(self, Value::Nil) }

    /// Node identity for heap values; `None` for immediates.
    pub fn identity(&self) -> Option<ObjId> {
        match self {
            Value::Nil | Value::Bool(_) | Value::Sym(_) | Value::Int(_) | Value::Float(_) => None,
            Value::Str(o) => Some(o.id()),
            Value::Seq(o) => Some(o.id()),
            Value::Set(o) => Some(o.id()),
            Value::Map(o) => Some(o.id()),
            Value::Range(o) => Some(o.id()),
            Value::Regex(o) => Some(o.id()),
            Value::Record(o) => Some(o.id()),
            Value::Enum(e) => Some(ObjId::of(Rc::as_ptr(&e.0))),
            Value::Class(c) => Some(c.id()),
            Value::Opaque(o) => Some(ObjId::of(Rc::as_ptr(o))),
        }
    }

    /// Same node (or same immediate).
    pub fn same(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self == other,
            _ => false,
        }
    }

    /// Immediates and enum members are always frozen; class descriptors never are.
    pub fn is_frozen(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(_) | Value::Sym(_) | Value::Int(_) | Value::Float(_) => true,
            Value::Enum(_) => true,
            Value::Class(_) => false,
            Value::Str(o) => o.is_frozen(),
            Value::Seq(o) => o.is_frozen(),
            Value::Set(o) => o.is_frozen(),
            Value::Map(o) => o.is_frozen(),
            Value::Range(o) => o.is_frozen(),
            Value::Regex(o) => o.is_frozen(),
            Value::Record(o) => o.is_frozen(),
            Value::Opaque(o) => o.is_frozen(),
        }
    }

    /// Shallow freeze. A no-op on immediates, enum members and class descriptors.
    pub fn freeze(&self) {
        match self {
            Value::Nil | Value::Bool(_) | Value::Sym(_) | Value::Int(_) | Value::Float(_) => {}
            Value::Enum(_) | Value::Class(_) => {}
            Value::Str(o) => o.freeze(),
            Value::Seq(o) => o.freeze(),
            Value::Set(o) => o.freeze(),
            Value::Map(o) => o.freeze(),
            Value::Range(o) => o.freeze(),
            Value::Regex(o) => o.freeze(),
            Value::Record(o) => o.freeze(),
            Value::Opaque(o) => o.freeze(),
        }
    }

    /// One-level copy that starts out mutable. Immediates and enum members
    /// come back as the same handle.
    pub fn shallow_dup(&self) -> Value {
        match self {
            Value::Class(c) => Value::Class(c.dup()),
            Value::Str(o) => Value::Str(o.dup()),
            Value::Seq(o) => Value::Seq(o.dup()),
            Value::Set(o) => Value::Set(o.dup()),
            Value::Map(o) => Value::Map(o.dup()),
            Value::Range(o) => Value::Range(o.dup()),
            Value::Regex(o) => Value::Regex(o.dup()),
            Value::Record(o) => Value::Record(o.dup()),
            Value::Opaque(o) => Value::Opaque(o.dup()),
            _ => self.clone(),
        }
    }

    /// One-level copy that keeps the source's frozen bit.
    pub fn shallow_clone(&self) -> Value {
        let copy = self.shallow_dup();
        if self.is_frozen() {
            copy.freeze();
        }
        copy
    }

    pub fn as_str(&self) -> Option<Ref<'_, String>> {
        match self { Value::Str(o) => Some(o.borrow()), _ => None }
    }
    pub fn as_seq(&self) -> Option<&Obj<Vec<Value>>> {
        match self { Value::Seq(o) => Some(o), _ => None }
    }
    pub fn as_set(&self) -> Option<&Obj<IndexSet<Value>>> {
        match self { Value::Set(o) => Some(o), _ => None }
    }
    pub fn as_map(&self) -> Option<&Obj<IndexMap<Value, Value>>> {
        match self { Value::Map(o) => Some(o), _ => None }
    }
    pub fn as_record(&self) -> Option<&Obj<Record>> {
        match self { Value::Record(o) => Some(o), _ => None }
    }

    // ---- mutation (fails once frozen) ----

    pub fn push(&self, item: Value) -> Result<()> {
        match self {
            Value::Seq(o) => { o.borrow_mut()?.push(item); Ok(()) }
            other => Err(mismatch("sequence", other)),
        }
    }

    pub fn push_str(&self, tail: &str) -> Result<()> {
        match self {
            Value::Str(o) => { o.borrow_mut()?.push_str(tail); Ok(()) }
            other => Err(mismatch("string", other)),
        }
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<Option<Value>> {
        match self {
            Value::Map(o) => Ok(o.borrow_mut()?.insert(key, value)),
            other => Err(mismatch("map", other)),
        }
    }

    pub fn set_field(&self, name: &str, value: Value) -> Result<Option<Value>> {
        match self {
            Value::Record(o) => Ok(o.borrow_mut()?.fields.insert(name.to_string(), value)),
            other => Err(mismatch("record", other)),
        }
    }

    /// Plain data: nil, booleans, numbers, strings, symbols, and sequences,
    /// sets or maps built only from those.
    pub fn is_scalar(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(_) | Value::Sym(_) | Value::Int(_) | Value::Float(_) => true,
            Value::Str(_) => true,
            Value::Seq(xs) => xs.borrow().iter().all(Value::is_scalar),
            Value::Set(xs) => xs.borrow().iter().all(Value::is_scalar),
            Value::Map(m) => m.borrow().iter().all(|(k, v)| k.is_scalar() && v.is_scalar()),
            _ => false,
        }
    }

    // ---- plain-data bridge ----

    /// Integers outside the `i64` range (large unsigned values) narrow to
    /// `Float`, so they don't survive a round trip through `to_json` exactly.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Nil,
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => Value::str(s.as_str()),
            J::Array(xs) => Value::seq(xs.iter().map(Value::from_json).collect()),
            J::Object(m) => Value::map(m.iter().map(|(k, v)| (Value::str(k.as_str()), Value::from_json(v)))),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as J;
        Ok(match self {
            Value::Nil => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Sym(s) => J::String(s.as_str().to_string()),
            Value::Int(i) => J::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(x.0)
                .map(J::Number)
                .ok_or(Error::NotPlainData("non-finite float"))?,
            Value::Str(s) => J::String(s.borrow().clone()),
            Value::Seq(xs) => J::Array(xs.borrow().iter().map(Value::to_json).collect::<Result<_>>()?),
            Value::Set(xs) => J::Array(xs.borrow().iter().map(Value::to_json).collect::<Result<_>>()?),
            Value::Map(m) => {
                let mut out = serde_json::Map::new();
                for (k, v) in m.borrow().iter() {
                    let key = match k {
                        Value::Str(s) => s.borrow().clone(),
                        Value::Sym(s) => s.as_str().to_string(),
                        _ => return Err(Error::NotPlainData("non-string map key")),
                    };
                    out.insert(key, v.to_json()?);
                }
                J::Object(out)
            }
            other => return Err(Error::NotPlainData(other.kind_name())),
        })
    }
}

pub(crate) fn mismatch(expected: &'static str, found: &Value) -> Error {
    Error::Mismatch { expected, found: found.kind_name() }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self { Value::float(x) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::str(s) }
}

// ------------------------------ Equality --------------------------------- //

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Seq(a), Value::Seq(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Range(a), Value::Range(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Regex(a), Value::Regex(b)) => a.borrow().as_str() == b.borrow().as_str(),
            (Value::Record(a), Value::Record(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.class.ptr_eq(&b.class) && a.fields == b.fields
            }
            (Value::Enum(a), Value::Enum(b)) => a.ptr_eq(b),
            (Value::Class(a), Value::Class(b)) => a.ptr_eq(b),
            (Value::Opaque(_), Value::Opaque(_)) => self.identity() == other.identity(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Sym(s) => s.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => x.hash(state),
            Value::Str(s) => s.borrow().hash(state),
            Value::Seq(xs) => xs.borrow().hash(state),
            // equality ignores order, so entries are combined order-independently
            Value::Set(xs) => {
                let xs = xs.borrow();
                xs.len().hash(state);
                unordered_hash(xs.iter()).hash(state);
            }
            Value::Map(m) => {
                let m = m.borrow();
                m.len().hash(state);
                unordered_hash(m.iter()).hash(state);
            }
            Value::Range(r) => r.borrow().hash(state),
            Value::Regex(r) => r.borrow().as_str().hash(state),
            Value::Record(r) => {
                let r = r.borrow();
                r.class.id().hash(state);
                r.fields.len().hash(state);
                unordered_hash(r.fields.iter()).hash(state);
            }
            Value::Enum(_) | Value::Class(_) | Value::Opaque(_) => self.identity().hash(state),
        }
    }
}

fn unordered_hash<T: Hash>(items: impl Iterator<Item = T>) -> u64 {
    items.fold(0, |acc, item| {
        let mut h = DefaultHasher::new();
        item.hash(&mut h);
        acc ^ h.finish()
    })
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Sym(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{:?}", x.0),
            Value::Str(s) => write!(f, "{:?}", s.borrow().as_str()),
            Value::Seq(xs) => f.debug_list().entries(xs.borrow().iter()).finish(),
            Value::Set(xs) => f.debug_set().entries(xs.borrow().iter()).finish(),
            Value::Map(m) => f.debug_map().entries(m.borrow().iter()).finish(),
            Value::Range(r) => {
                let r = r.borrow();
                let dots = if r.exclusive { "..." } else { ".." };
                write!(f, "{:?}{dots}{:?}", r.begin, r.end)
            }
            Value::Regex(r) => write!(f, "/{}/", r.borrow().as_str()),
            Value::Enum(e) => write!(f, "{}::{}", e.owner(), e.name()),
            Value::Record(r) => {
                let r = r.borrow();
                let mut d = f.debug_struct(r.class.name());
                for (k, v) in &r.fields {
                    d.field(k, v);
                }
                d.finish()
            }
            Value::Class(c) => f.write_str(c.name()),
            Value::Opaque(o) => write!(f, "#<{}>", o.type_name()),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
