//! Error types for the annotation pipeline
//!
//! Three pipeline failures are kept apart because they propagate differently:
//! a [`SchemaError`] aborts HIT creation, a [`DecodeError`] only drops the
//! offending result, and a [`DegenerateInputError`] only drops one HIT from an
//! agreement report.

use thiserror::Error;

/// Result type for pipeline and service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed or structurally invalid HIT XML
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid XML: \"{message}\".")]
pub struct SchemaError {
    message: String,
}

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<roxmltree::Error> for SchemaError {
    fn from(err: roxmltree::Error) -> Self {
        SchemaError::new(err.to_string())
    }
}

/// A raw result string that does not follow its task type's grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not an integer: {0:?}")]
    InvalidInteger(String),

    #[error("expected {expected} ranks, found {found}")]
    RankCount { expected: usize, found: usize },

    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("translation index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("malformed error annotation: {0:?}")]
    MalformedAnnotation(String),

    #[error("unknown marker: {0:?}")]
    UnknownMarker(String),

    #[error("decoded value does not belong to task type {0}")]
    TaskTypeMismatch(&'static str),
}

/// Agreement coefficient undefined for the given annotations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Degenerate agreement input: {reason}")]
pub struct DegenerateInputError {
    reason: String,
}

impl DegenerateInputError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Service-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Degenerate(#[from] DegenerateInputError),

    #[error(transparent)]
    Common(#[from] appraise_common::Error),

    /// Another HIT already owns this identifier
    #[error("Duplicate HIT id: {0}")]
    DuplicateHitId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Common(appraise_common::Error::Database(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Common(appraise_common::Error::Io(err))
    }
}
