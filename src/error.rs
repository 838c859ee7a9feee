use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Attempted to mutate a node after it was frozen.
    #[error("can't modify frozen {0}")]
    Frozen(&'static str),

    /// A record or custom type is missing the entrypoint a recipe wants to call.
    #[error("`{type_name}` has no `{hook}` hook")]
    MissingHook { type_name: String, hook: &'static str },

    #[error("`{type_name}` failed in `{hook}`: {source}")]
    Hook {
        type_name: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// `checked_serialize` produced something that isn't plain data.
    #[error("`{type_name}` serialized to a non-scalar {found}")]
    NotScalar { type_name: String, found: &'static str },

    /// A container recipe was applied to a value of a different kind.
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: &'static str, found: &'static str },

    #[error("{0} has no plain-data representation")]
    NotPlainData(&'static str),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
