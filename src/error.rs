//! Error types for the query codecs
//!
//! Decoding is the only fallible direction for well-formed trees: every
//! in-memory variant has a wire mapping (enforced by exhaustive matching), so
//! encode errors only come from the cache payload encoder.

use thiserror::Error;

/// Failure to turn wire or cache bytes back into a query tree
///
/// No partial tree is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("query envelope has no payload set")]
    EmptyEnvelope,

    #[error("query envelope has {0} payloads set, expected exactly one")]
    MultiplePayloads(usize),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid regular expression {pattern:?}: {message}")]
    Regex { pattern: String, message: String },

    #[error("invalid repository id bitmap: {0}")]
    Bitmap(String),

    #[error("unknown result type {0}")]
    UnknownResultKind(u32),

    #[error("malformed wire message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not a query cache frame (bad magic)")]
    BadMagic,

    #[error("unsupported cache frame version {0}")]
    UnsupportedVersion(u32),

    #[error("cache frame was written by a different build (schema {found}, expected {expected})")]
    SchemaMismatch { expected: String, found: String },

    #[error("cache frame truncated: expected {expected} bytes, {available} available")]
    Truncated { expected: u64, available: u64 },

    #[error("cache frame payload of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: u64, limit: u64 },

    #[error("malformed cache payload: {0}")]
    Payload(String),

    #[error("query nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

impl DecodeError {
    pub(crate) fn regex(pattern: &str, err: impl std::fmt::Display) -> Self {
        DecodeError::Regex {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<bincode::Error> for DecodeError {
    fn from(err: bincode::Error) -> Self {
        DecodeError::Payload(err.to_string())
    }
}

/// Failure to produce wire or cache bytes for a query
///
/// Cloneable so a memoized failure can be handed to every caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("cache encoding failed: {0}")]
    Payload(String),

    #[error("wire encoding failed: {0}")]
    Wire(String),
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::Wire(err.to_string())
    }
}

impl From<bincode::Error> for EncodeError {
    fn from(err: bincode::Error) -> Self {
        EncodeError::Payload(err.to_string())
    }
}
