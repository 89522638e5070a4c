//! # Appraise Common Library
//!
//! Shared code for the Appraise evaluation tools including:
//! - Error type used across crates
//! - Configuration loading and root folder resolution
//! - Language and language pair vocabulary
//! - HIT identifier generation
//! - Duration helpers
//! - Database pool initialisation and schema

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod language;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use language::{Language, LanguagePair};
