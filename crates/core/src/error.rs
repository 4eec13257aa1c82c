//! The engine-wide error type.
//!
//! Fatal kinds abort the resolution run; `AmbiguousChoice` is the one kind
//! that is recovered from locally (the block is logged and discarded), so
//! it normally surfaces as a warning rather than an `Err`.

use thiserror::Error;

use crate::calendar::DateError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file found for '{0}' (tried .yml/.yaml/.YML/.YAML)")]
    NotFound(String),

    #[error("failed to read {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("failed to parse YAML in {0}: {1}")]
    Parse(String, #[source] serde_yaml::Error),

    #[error("undefined key: {0}")]
    UndefinedKey(String),

    #[error("cyclic dependency between choose blocks: {0}")]
    CyclicDependency(String),

    #[error("type mismatch at '{path}': {message}")]
    TypeMismatch { path: String, message: String },

    #[error("choice '{choice}' matches no branch of '{key}' and there is no '*'")]
    AmbiguousChoice { key: String, choice: String },

    #[error("malformed syntax in '{text}': expected '{expected}'")]
    MalformedSyntax { text: String, expected: String },

    #[error("chapter '{name}' must not be redefined inside chapter '{chapter}'")]
    ConflictingDefinition { chapter: String, name: String },

    #[error(transparent)]
    Date(#[from] DateError),
}

impl ConfigError {
    pub fn type_mismatch(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::TypeMismatch { path: path.into(), message: message.into() }
    }

    pub fn malformed(text: impl Into<String>, expected: impl Into<String>) -> Self {
        ConfigError::MalformedSyntax { text: text.into(), expected: expected.into() }
    }
}
