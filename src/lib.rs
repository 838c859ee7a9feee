//! Type-directed deep transforms.
//!
//! Two pieces:
//! - [`synth`]: turns a [`Shape`] and a [`Mode`] into a [`Recipe`] once, so
//!   applying it later never re-inspects the shape. Values that need nothing
//!   (numbers, symbols, already-immutable leaves) cost nothing.
//! - [`traverse`]: generic [`deep_clone`] / [`deep_freeze`] over arbitrary
//!   value graphs, cycle-safe and identity-aware. Recipes fall back to these
//!   for shapes they don't recognize.
pub mod config;
pub mod contract;
pub mod error;
pub mod identity;
pub mod recipe;
pub mod shape;
pub mod synth;
pub mod traverse;
pub mod value;

pub use config::SynthConfig;
pub use contract::{CustomType, FromRepr, RecordType};
pub use error::{Error, Result};
pub use recipe::{ApplyOptions, Mode, Recipe};
pub use shape::{LeafKind, Shape};
pub use synth::{synthesize, Synthesizer};
pub use traverse::{deep_clone, deep_freeze};
pub use value::{ClassRef, EnumMember, Obj, OpaqueObject, Record, Symbol, Value};
