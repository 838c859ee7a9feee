//! Synthesized transform recipes.
//!
//! A [`Recipe`] is a small closed AST of transform steps, built once per
//! (shape, mode) and applied many times. Recipes are immutable; applying one
//! never touches the recipe itself.
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::contract::{CustomType, RecordType};
use crate::error::Result;
use crate::traverse::{deep_clone, deep_freeze};
use crate::value::{mismatch, Obj, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Serialize,
    DeserializeIntoMutable,
    DeserializeIntoFrozen,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Serialize, Mode::DeserializeIntoMutable, Mode::DeserializeIntoFrozen];

    pub fn freezes(self) -> bool { matches!(self, Mode::DeserializeIntoFrozen) }
}

/// Options bag threaded through application. `strict` goes to record
/// serializers; the whole bag goes to option-aware record constructors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    pub strict: bool,
    pub freeze: bool,
}

#[derive(Clone, Debug)]
pub enum Recipe {
    /// Pass the value through untouched.
    NoOp,
    /// One-level copy of a container whose contents need nothing.
    Dup,
    /// Freeze in place.
    Freeze,
    /// Apply `elem` to each element in place, then freeze the container.
    EachInPlace(Box<Recipe>),
    EachPairInPlace { key: Box<Recipe>, value: Box<Recipe> },
    MapSeq { elem: Box<Recipe>, freeze: bool },
    MapSet { elem: Box<Recipe>, freeze: bool },
    TransformKeys { key: Box<Recipe>, freeze: bool },
    TransformValues { value: Box<Recipe>, freeze: bool },
    RebuildMap { key: Box<Recipe>, value: Box<Recipe>, freeze: bool },
    /// nil stays nil; anything else goes through the inner recipe.
    Nilable(Box<Recipe>),
    RecordSerialize(Rc<RecordType>),
    /// `pass_options` mirrors the constructor's arity; `freeze` is set for
    /// frozen-mode deserialization.
    RecordFromRepr { ty: Rc<RecordType>, pass_options: bool, freeze: bool },
    CustomSerialize(Rc<CustomType>),
    CustomDeserialize { ty: Rc<CustomType>, freeze: bool },
    DeepClone,
    DeepFreeze,
}

impl Recipe {
    pub fn is_noop(&self) -> bool { matches!(self, Recipe::NoOp) }

    /// Whether applying this builds new structure. Allocation-free recipes
    /// only freeze or visit what is already there, which lets a frozen-mode
    /// container be frozen in place instead of rebuilt.
    pub fn allocates(&self) -> bool {
        match self {
            Recipe::NoOp | Recipe::Freeze | Recipe::DeepFreeze => false,
            Recipe::EachInPlace(elem) => elem.allocates(),
            Recipe::EachPairInPlace { key, value } => key.allocates() || value.allocates(),
            Recipe::Nilable(inner) => inner.allocates(),
            Recipe::Dup
            | Recipe::MapSeq { .. }
            | Recipe::MapSet { .. }
            | Recipe::TransformKeys { .. }
            | Recipe::TransformValues { .. }
            | Recipe::RebuildMap { .. }
            | Recipe::RecordSerialize(_)
            | Recipe::RecordFromRepr { .. }
            | Recipe::CustomSerialize(_)
            | Recipe::CustomDeserialize { .. }
            | Recipe::DeepClone => true,
        }
    }

    pub fn apply(&self, value: &Value, opts: &ApplyOptions) -> Result<Value> {
        match self {
            Recipe::NoOp => Ok(value.clone()),
            Recipe::Dup => Ok(value.shallow_dup()),
            Recipe::Freeze => {
                value.freeze();
                Ok(value.clone())
            }
            Recipe::EachInPlace(elem) => {
                for x in elements(value)? {
                    elem.apply(&x, opts)?;
                }
                value.freeze();
                Ok(value.clone())
            }
            Recipe::EachPairInPlace { key, value: val } => {
                for (k, v) in entries(value)? {
                    key.apply(&k, opts)?;
                    val.apply(&v, opts)?;
                }
                value.freeze();
                Ok(value.clone())
            }
            Recipe::MapSeq { elem, freeze } => {
                let out = elements(value)?
                    .iter()
                    .map(|x| elem.apply(x, opts))
                    .collect::<Result<Vec<_>>>()?;
                Ok(finish(Value::seq(out), *freeze))
            }
            Recipe::MapSet { elem, freeze } => {
                let out = elements(value)?
                    .iter()
                    .map(|x| elem.apply(x, opts))
                    .collect::<Result<IndexSet<_>>>()?;
                Ok(finish(Value::Set(Obj::new(out)), *freeze))
            }
            Recipe::TransformKeys { key, freeze } => {
                let mut out = IndexMap::new();
                for (k, v) in entries(value)? {
                    out.insert(key.apply(&k, opts)?, v);
                }
                Ok(finish(Value::Map(Obj::new(out)), *freeze))
            }
            Recipe::TransformValues { value: val, freeze } => {
                let mut out = IndexMap::new();
                for (k, v) in entries(value)? {
                    let v = val.apply(&v, opts)?;
                    out.insert(k, v);
                }
                Ok(finish(Value::Map(Obj::new(out)), *freeze))
            }
            Recipe::RebuildMap { key, value: val, freeze } => {
                let mut out = IndexMap::new();
                for (k, v) in entries(value)? {
                    out.insert(key.apply(&k, opts)?, val.apply(&v, opts)?);
                }
                Ok(finish(Value::Map(Obj::new(out)), *freeze))
            }
            Recipe::Nilable(inner) => {
                if value.is_nil() {
                    Ok(Value::Nil)
                } else {
                    inner.apply(value, opts)
                }
            }
            Recipe::RecordSerialize(ty) => ty.serialize(value, opts.strict),
            Recipe::RecordFromRepr { ty, pass_options, freeze } => {
                if *pass_options {
                    let opts = ApplyOptions { freeze: opts.freeze || *freeze, ..*opts };
                    return ty.from_repr(value, Some(&opts));
                }
                let out = ty.from_repr(value, None)?;
                Ok(if *freeze { deep_freeze(&out) } else { out })
            }
            Recipe::CustomSerialize(ty) => ty.checked_serialize(value),
            Recipe::CustomDeserialize { ty, freeze } => {
                let out = ty.deserialize(value)?;
                Ok(if *freeze { deep_freeze(&out) } else { out })
            }
            Recipe::DeepClone => Ok(deep_clone(value, false)),
            Recipe::DeepFreeze => Ok(deep_freeze(value)),
        }
    }

    fn write_expr(&self, f: &mut fmt::Formatter<'_>, var: &str) -> fmt::Result {
        match self {
            Recipe::NoOp => f.write_str(var),
            Recipe::Dup => write!(f, "dup({var})"),
            Recipe::Freeze => write!(f, "freeze({var})"),
            Recipe::EachInPlace(elem) => {
                write!(f, "freeze(each({var}, |v| ")?;
                elem.write_expr(f, "v")?;
                f.write_str("))")
            }
            Recipe::EachPairInPlace { key, value } => {
                write!(f, "freeze(each_pair({var}, |k, v| ")?;
                key.write_expr(f, "k")?;
                f.write_str("; ")?;
                value.write_expr(f, "v")?;
                f.write_str("))")
            }
            Recipe::MapSeq { elem, freeze } => frozen_if(f, *freeze, |f| {
                write!(f, "seq({var}, |v| ")?;
                elem.write_expr(f, "v")?;
                f.write_str(")")
            }),
            Recipe::MapSet { elem, freeze } => frozen_if(f, *freeze, |f| {
                write!(f, "set({var}, |v| ")?;
                elem.write_expr(f, "v")?;
                f.write_str(")")
            }),
            Recipe::TransformKeys { key, freeze } => frozen_if(f, *freeze, |f| {
                write!(f, "map_keys({var}, |k| ")?;
                key.write_expr(f, "k")?;
                f.write_str(")")
            }),
            Recipe::TransformValues { value, freeze } => frozen_if(f, *freeze, |f| {
                write!(f, "map_values({var}, |v| ")?;
                value.write_expr(f, "v")?;
                f.write_str(")")
            }),
            Recipe::RebuildMap { key, value, freeze } => frozen_if(f, *freeze, |f| {
                write!(f, "map({var}, |k, v| (")?;
                key.write_expr(f, "k")?;
                f.write_str(", ")?;
                value.write_expr(f, "v")?;
                f.write_str("))")
            }),
            Recipe::Nilable(inner) => {
                write!(f, "nilable({var}, |{var}| ")?;
                inner.write_expr(f, var)?;
                f.write_str(")")
            }
            Recipe::RecordSerialize(ty) => write!(f, "{}::serialize({var}, strict)", ty.name()),
            Recipe::RecordFromRepr { ty, pass_options: true, .. } => {
                write!(f, "{}::from_repr({var}, opts)", ty.name())
            }
            Recipe::RecordFromRepr { ty, freeze, .. } => {
                frozen_deep_if(f, *freeze, |f| write!(f, "{}::from_repr({var})", ty.name()))
            }
            Recipe::CustomSerialize(ty) => write!(f, "{}::checked_serialize({var})", ty.name()),
            Recipe::CustomDeserialize { ty, freeze } => {
                frozen_deep_if(f, *freeze, |f| write!(f, "{}::deserialize({var})", ty.name()))
            }
            Recipe::DeepClone => write!(f, "deep_clone({var})"),
            Recipe::DeepFreeze => write!(f, "deep_freeze({var})"),
        }
    }
}

/// Renders as a compact expression over `x`, e.g. `freeze(seq(x, |v| ...))`.
impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.write_expr(f, "x") }
}

// ------------------------------ Helpers ---------------------------------- //

fn finish(v: Value, freeze: bool) -> Value {
    if freeze {
        v.freeze();
    }
    v
}

fn frozen_if(
    f: &mut fmt::Formatter<'_>,
    freeze: bool,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    if !freeze {
        return body(f);
    }
    f.write_str("freeze(")?;
    body(f)?;
    f.write_str(")")
}

fn frozen_deep_if(
    f: &mut fmt::Formatter<'_>,
    freeze: bool,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    if !freeze {
        return body(f);
    }
    f.write_str("deep_freeze(")?;
    body(f)?;
    f.write_str(")")
}

/// Snapshot of a sequence's or set's elements. Handles only; no data copied.
fn elements(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Seq(xs) => Ok(xs.borrow().clone()),
        Value::Set(xs) => Ok(xs.borrow().iter().cloned().collect()),
        other => Err(mismatch("sequence or set", other)),
    }
}

fn entries(value: &Value) -> Result<Vec<(Value, Value)>> {
    match value {
        Value::Map(m) => Ok(m.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => Err(mismatch("map", other)),
    }
}

// ------------------------------- Tests ------------------------------------ //
