//! Error types shared by the Appraise crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or invalid `appraise.toml`
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not an ISO 639-3 code of a supported language
    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    /// Pair text that is not `<source>2<target>`
    #[error("Malformed language pair: {0}")]
    MalformedLanguagePair(String),

    /// Both languages are known but the pair is not evaluated
    #[error("Unsupported language pair: {from}->{to}")]
    UnsupportedLanguagePair { from: &'static str, to: &'static str },

    /// Stored data that no longer parses, or an exhausted retry loop
    #[error("Internal error: {0}")]
    Internal(String),
}
