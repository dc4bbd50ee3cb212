//! Error types shared across the decoder, index builder and resolver

use std::path::PathBuf;

use thiserror::Error;

/// Why a single property-string element could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeReason {
    UnbalancedParens,
    UnterminatedQuote,
    MissingSeparator,
    EmptyKey,
    EmptyValue,
    MissingField(&'static str),
}

impl std::fmt::Display for DecodeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeReason::UnbalancedParens => write!(f, "unbalanced parentheses"),
            DecodeReason::UnterminatedQuote => write!(f, "unterminated quote"),
            DecodeReason::MissingSeparator => write!(f, "missing '=' between key and value"),
            DecodeReason::EmptyKey => write!(f, "empty key"),
            DecodeReason::EmptyValue => write!(f, "empty value"),
            DecodeReason::MissingField(name) => write!(f, "missing field {}", name),
        }
    }
}

/// A property-string element that failed to decode. Scoped to that element only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} in `{fragment}`")]
pub struct DecodeError {
    pub reason: DecodeReason,
    pub fragment: String,
}

impl DecodeError {
    pub fn new(reason: DecodeReason, fragment: impl Into<String>) -> Self {
        Self {
            reason,
            fragment: fragment.into(),
        }
    }
}

/// A recipe that violates its invariants and is excluded from the index
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeError {
    #[error("recipe entry has no ClassName")]
    MissingClassName,

    #[error("recipe entry is malformed: {0}")]
    Malformed(String),

    #[error("recipe {recipe}: duration {duration:?} is not a positive number of seconds")]
    InvalidDuration { recipe: String, duration: String },

    #[error("recipe {recipe}: no products")]
    NoProducts { recipe: String },

    #[error("recipe {recipe}: amount `{amount}` for {item} is not a positive integer")]
    InvalidAmount {
        recipe: String,
        item: String,
        amount: String,
    },
}

/// Errors raised while computing rates or resolving a chain
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("no recipe produces {item}")]
    RecipeNotFound { item: String },

    #[error("recipe {recipe} does not list {item} as a product")]
    ProductNotInRecipe { recipe: String, item: String },

    #[error("recipe {recipe} yields no positive output per minute for {item}")]
    DivideByZero { recipe: String, item: String },

    #[error("target rate must be a positive number, got {0}")]
    InvalidTargetRate(f64),
}

/// Fatal errors while reading the top-level dump
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not valid UTF-8 or UTF-16 text")]
    Encoding { path: PathBuf },

    #[error("no dump files found under {0}")]
    NoDumpFiles(PathBuf),

    #[error("failed to compile class-name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors loading the TOML configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid recipe pin `{0}`, expected ITEM=RECIPE")]
    InvalidPin(String),
}
