// Declarative description of what a value looks like. Mode-independent: the
// same tree is synthesized for serialize and both deserialize modes.

use std::rc::Rc;

use crate::contract::{CustomType, RecordType};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Nil,
    Bool,
    Symbol,
    Numeric,
    String,
    EnumMember,
}

#[derive(Clone, Debug)]
pub enum Shape {
    Leaf(LeafKind),
    Sequence(Box<Shape>),
    Set(Box<Shape>),
    Map { key: Box<Shape>, value: Box<Shape> },
    Optional(Box<Shape>),
    Union(Vec<Shape>),
    /// Enum of literal values; stands for the union of their leaf shapes.
    Enum(Vec<Value>),
    NestedRecord(Rc<RecordType>),
    CustomScalar(Rc<CustomType>),
    /// A simple type known only by its canonical name.
    Named(String),
    Unknown,
}

impl Shape {
    pub fn nil() -> Self { Shape::Leaf(LeafKind::Nil) }
    pub fn bool() -> Self { Shape::Leaf(LeafKind::Bool) }
    pub fn symbol() -> Self { Shape::Leaf(LeafKind::Symbol) }
    pub fn numeric() -> Self { Shape::Leaf(LeafKind::Numeric) }
    pub fn string() -> Self { Shape::Leaf(LeafKind::String) }

    pub fn seq(elem: Shape) -> Self { Shape::Sequence(Box::new(elem)) }
    pub fn set(elem: Shape) -> Self { Shape::Set(Box::new(elem)) }
    pub fn map(key: Shape, value: Shape) -> Self {
        Shape::Map { key: Box::new(key), value: Box::new(value) }
    }
    pub fn optional(inner: Shape) -> Self { Shape::Optional(Box::new(inner)) }
    pub fn record(ty: &Rc<RecordType>) -> Self { Shape::NestedRecord(Rc::clone(ty)) }
    pub fn custom(ty: &Rc<CustomType>) -> Self { Shape::CustomScalar(Rc::clone(ty)) }
    pub fn named(name: impl Into<String>) -> Self { Shape::Named(name.into()) }

    pub fn is_nil(&self) -> bool { matches!(self, Shape::Leaf(LeafKind::Nil)) }
}

/// `X | nil` → `X`. Only a union of exactly one non-nil variant plus nil
/// unwraps; anything wider stays a union.
pub fn unwrap_nilable(variants: &[Shape]) -> Option<&Shape> {
    if !variants.iter().any(Shape::is_nil) {
        return None;
    }
    let mut rest = variants.iter().filter(|v| !v.is_nil());
    match (rest.next(), rest.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Enum of values → the shape of the values themselves.
pub fn lift_enum(values: &[Value]) -> Shape {
    let mut kinds: Vec<Shape> = Vec::new();
    for v in values {
        let shape = match v {
            Value::Nil => Shape::nil(),
            Value::Bool(_) => Shape::bool(),
            Value::Sym(_) => Shape::symbol(),
            Value::Int(_) | Value::Float(_) => Shape::numeric(),
            Value::Str(_) => Shape::string(),
            Value::Enum(_) => Shape::Leaf(LeafKind::EnumMember),
            _ => Shape::Unknown,
        };
        let dup = kinds.iter().any(|k| match (k, &shape) {
            (Shape::Leaf(a), Shape::Leaf(b)) => a == b,
            (Shape::Unknown, Shape::Unknown) => true,
            _ => false,
        });
        if !dup {
            kinds.push(shape);
        }
    }
    match kinds.len() {
        1 => kinds.remove(0),
        _ => Shape::Union(kinds),
    }
}
