//! Shape + mode → recipe.
//!
//! Pure and total: every shape synthesizes to some recipe (the unknown-type
//! fallback is a recipe too). Rules are matched most-specific first; leaves
//! decide per mode, containers compose what their children produced.
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::config::SynthConfig;
use crate::contract::{CustomType, RecordType};
use crate::recipe::{Mode, Recipe};
use crate::shape::{lift_enum, unwrap_nilable, LeafKind, Shape};

static DEFAULT_CONFIG: Lazy<SynthConfig> = Lazy::new(SynthConfig::default);

/// Synthesize with the default configuration (no extra scalar type names).
pub fn synthesize(shape: &Shape, mode: Mode) -> Recipe {
    Synthesizer::traced(&DEFAULT_CONFIG, shape, mode)
}

#[derive(Clone, Debug, Default)]
pub struct Synthesizer {
    config: SynthConfig,
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Self { Self { config } }

    pub fn config(&self) -> &SynthConfig { &self.config }

    pub fn synthesize(&self, shape: &Shape, mode: Mode) -> Recipe {
        Self::traced(&self.config, shape, mode)
    }

    fn traced(config: &SynthConfig, shape: &Shape, mode: Mode) -> Recipe {
        let recipe = generate(config, shape, mode);
        tracing::trace!(?mode, %recipe, "synthesized recipe");
        recipe
    }
}

fn generate(config: &SynthConfig, shape: &Shape, mode: Mode) -> Recipe {
    let freeze = mode.freezes();
    match shape {
        Shape::Sequence(elem) | Shape::Set(elem) => {
            let inner = generate(config, elem, mode);
            if inner.is_noop() {
                shallow(mode)
            } else if freeze && !inner.allocates() {
                Recipe::EachInPlace(Box::new(inner))
            } else if matches!(shape, Shape::Set(_)) {
                Recipe::MapSet { elem: Box::new(inner), freeze }
            } else {
                Recipe::MapSeq { elem: Box::new(inner), freeze }
            }
        }
        Shape::Map { key, value } => {
            let key = generate(config, key, mode);
            let value = generate(config, value, mode);
            match (key.is_noop(), value.is_noop()) {
                (true, true) => shallow(mode),
                _ if freeze && !key.allocates() && !value.allocates() => {
                    Recipe::EachPairInPlace { key: Box::new(key), value: Box::new(value) }
                }
                (false, false) => Recipe::RebuildMap { key: Box::new(key), value: Box::new(value), freeze },
                (false, true) => Recipe::TransformKeys { key: Box::new(key), freeze },
                (true, false) => Recipe::TransformValues { value: Box::new(value), freeze },
            }
        }
        Shape::Leaf(LeafKind::String) if freeze => Recipe::Freeze,
        Shape::Leaf(_) => Recipe::NoOp,
        Shape::NestedRecord(ty) => record(ty, mode),
        Shape::CustomScalar(ty) => custom(ty, mode),
        Shape::Named(name) if config.is_scalar_type(name) => Recipe::NoOp,
        Shape::Named(_) => unknown(mode),
        Shape::Optional(inner) => nilable(generate(config, inner, mode)),
        Shape::Union(variants) => match unwrap_nilable(variants) {
            Some(inner) => nilable(generate(config, inner, mode)),
            None => {
                // mixed unions aren't specialized any further
                if variants.iter().all(|v| generate(config, v, mode).is_noop()) {
                    Recipe::NoOp
                } else {
                    unknown(mode)
                }
            }
        },
        Shape::Enum(values) => generate(config, &lift_enum(values), mode),
        Shape::Unknown => unknown(mode),
    }
}

fn shallow(mode: Mode) -> Recipe {
    if mode.freezes() { Recipe::Freeze } else { Recipe::Dup }
}

fn nilable(inner: Recipe) -> Recipe {
    if inner.is_noop() { inner } else { Recipe::Nilable(Box::new(inner)) }
}

fn record(ty: &Rc<RecordType>, mode: Mode) -> Recipe {
    match mode {
        Mode::Serialize => Recipe::RecordSerialize(Rc::clone(ty)),
        Mode::DeserializeIntoMutable | Mode::DeserializeIntoFrozen => Recipe::RecordFromRepr {
            ty: Rc::clone(ty),
            pass_options: ty.accepts_options(),
            freeze: mode.freezes(),
        },
    }
}

fn custom(ty: &Rc<CustomType>, mode: Mode) -> Recipe {
    match mode {
        Mode::Serialize => Recipe::CustomSerialize(Rc::clone(ty)),
        Mode::DeserializeIntoMutable => Recipe::CustomDeserialize { ty: Rc::clone(ty), freeze: false },
        Mode::DeserializeIntoFrozen => Recipe::CustomDeserialize { ty: Rc::clone(ty), freeze: true },
    }
}

fn unknown(mode: Mode) -> Recipe {
    match mode {
        Mode::Serialize | Mode::DeserializeIntoMutable => Recipe::DeepClone,
        Mode::DeserializeIntoFrozen => Recipe::DeepFreeze,
    }
}

// ------------------------------- Tests ------------------------------------ //
