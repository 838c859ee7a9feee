//! Entry points of externally owned types: typed records and custom scalars.
//!
//! Each type's canonical name is captured once, when the type is declared.
//! Recipes dispatch on that snapshot and never ask a value for its name, so a
//! type can't redirect dispatch by renaming itself later.
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::recipe::ApplyOptions;
use crate::value::Value;

pub type SerializeFn = Rc<dyn Fn(&Value, bool) -> anyhow::Result<Value>>;
pub type ConvertFn = Rc<dyn Fn(&Value) -> anyhow::Result<Value>>;
pub type ConvertWithOptionsFn = Rc<dyn Fn(&Value, &ApplyOptions) -> anyhow::Result<Value>>;

/// A record's from-representation constructor. The variant is its arity:
/// only `WithOptions` gets the options bag.
#[derive(Clone)]
pub enum FromRepr {
    Plain(ConvertFn),
    WithOptions(ConvertWithOptionsFn),
}

// ------------------------------ Records ---------------------------------- //

/// A type governed by its own serialize / from-representation contract.
pub struct RecordType {
    name: Box<str>,
    serialize: Option<SerializeFn>,
    from_repr: Option<FromRepr>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into().into_boxed_str(), serialize: None, from_repr: None }
    }

    /// `f(value, strict)`
    pub fn with_serialize(mut self, f: impl Fn(&Value, bool) -> anyhow::Result<Value> + 'static) -> Self {
        self.serialize = Some(Rc::new(f));
        self
    }

    pub fn with_from_repr(mut self, f: impl Fn(&Value) -> anyhow::Result<Value> + 'static) -> Self {
        self.from_repr = Some(FromRepr::Plain(Rc::new(f)));
        self
    }

    pub fn with_from_repr_opts(
        mut self,
        f: impl Fn(&Value, &ApplyOptions) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        self.from_repr = Some(FromRepr::WithOptions(Rc::new(f)));
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn accepts_options(&self) -> bool {
        matches!(self.from_repr, Some(FromRepr::WithOptions(_)))
    }

    pub fn serialize(&self, value: &Value, strict: bool) -> Result<Value> {
        let f = self.serialize.as_ref().ok_or_else(|| self.missing("serialize"))?;
        f(value, strict).map_err(|source| self.failed("serialize", source))
    }

    /// `opts` reaches the constructor only if it accepts options.
    pub fn from_repr(&self, repr: &Value, opts: Option<&ApplyOptions>) -> Result<Value> {
        let out = match self.from_repr.as_ref().ok_or_else(|| self.missing("from_repr"))? {
            FromRepr::Plain(f) => f(repr),
            FromRepr::WithOptions(f) => f(repr, opts.unwrap_or(&ApplyOptions::default())),
        };
        out.map_err(|source| self.failed("from_repr", source))
    }

    fn missing(&self, hook: &'static str) -> Error {
        tracing::debug!(type_name = %self.name, hook, "missing record hook");
        Error::MissingHook { type_name: self.name.to_string(), hook }
    }

    fn failed(&self, hook: &'static str, source: anyhow::Error) -> Error {
        tracing::debug!(type_name = %self.name, hook, error = %source, "record hook failed");
        Error::Hook { type_name: self.name.to_string(), hook, source }
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("accepts_options", &self.accepts_options())
            .finish_non_exhaustive()
    }
}

// ---------------------------- Custom scalars ----------------------------- //

/// A scalar whose conversions are delegated to registered hooks.
pub struct CustomType {
    name: Box<str>,
    serialize: Option<ConvertFn>,
    deserialize: Option<ConvertFn>,
}

impl CustomType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into().into_boxed_str(), serialize: None, deserialize: None }
    }

    pub fn with_serialize(mut self, f: impl Fn(&Value) -> anyhow::Result<Value> + 'static) -> Self {
        self.serialize = Some(Rc::new(f));
        self
    }

    pub fn with_deserialize(mut self, f: impl Fn(&Value) -> anyhow::Result<Value> + 'static) -> Self {
        self.deserialize = Some(Rc::new(f));
        self
    }

    pub fn name(&self) -> &str { &self.name }

    /// Serialize, then insist the result is plain data.
    pub fn checked_serialize(&self, value: &Value) -> Result<Value> {
        let f = self.serialize.as_ref().ok_or_else(|| self.missing("serialize"))?;
        let out = f(value).map_err(|source| self.failed("serialize", source))?;
        if !out.is_scalar() {
            return Err(Error::NotScalar { type_name: self.name.to_string(), found: out.kind_name() });
        }
        Ok(out)
    }

    pub fn deserialize(&self, repr: &Value) -> Result<Value> {
        let f = self.deserialize.as_ref().ok_or_else(|| self.missing("deserialize"))?;
        f(repr).map_err(|source| self.failed("deserialize", source))
    }

    fn missing(&self, hook: &'static str) -> Error {
        tracing::debug!(type_name = %self.name, hook, "missing custom type hook");
        Error::MissingHook { type_name: self.name.to_string(), hook }
    }

    fn failed(&self, hook: &'static str, source: anyhow::Error) -> Error {
        tracing::debug!(type_name = %self.name, hook, error = %source, "custom type hook failed");
        Error::Hook { type_name: self.name.to_string(), hook, source }
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType").field("name", &self.name).finish_non_exhaustive()
    }
}

// ------------------------------- Tests ------------------------------------ //
