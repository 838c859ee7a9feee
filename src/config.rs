use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Synthesizer configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    /// Canonical names of simple types that are always plain scalars and never
    /// need a transform. Matched by exact name, not by capability.
    pub scalar_types: IndexSet<String>,
}

impl SynthConfig {
    pub fn with_scalar_types<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { scalar_types: names.into_iter().map(Into::into).collect() }
    }

    pub fn is_scalar_type(&self, name: &str) -> bool { self.scalar_types.contains(name) }

    pub fn from_json_str(src: &str) -> Result<Self> {
        from_str_with_path(src)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        from_slice_with_path(bytes)
    }
}

// Deserialize with JSON-path context in error messages.

fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(path_error)
}

fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(path_error)
}

fn path_error(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path().to_string();
    Error::Config(format!("at JSON path {path} → {}", err.into_inner()))
}
