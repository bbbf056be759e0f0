//! File tokens and stored-filename syntax.
//!
//! Every upload that passes through the coordinator is stored under a freshly generated name of
//! the form:
//!
//! `<token>.<extension>`
//!
//! where `<token>` is **32 lowercase hexadecimal characters** (no hyphens) and `<extension>` is a
//! short lowercase alphanumeric suffix derived from the upload's extension hint.
//!
//! Example: `9f1c0d4be2a84c3f8a71b54e0c6d2a10.pdf`
//!
//! This crate provides:
//! - [`FileToken`], a wrapper that *guarantees* the canonical token format once constructed.
//! - [`StoredFileName`], a parsed view over a complete stored filename.
//! - [`normalise_extension`], the single place that decides which suffixes are acceptable.
//!
//! ## Token width
//!
//! Tokens are the simple form of a random (version 4) UUID: 122 random bits. The chance of two
//! tokens colliding stays below one in a billion until roughly 10^14 names have been generated, so
//! no global registry or lock is kept. Callers that assign several names in one batch can still
//! check the batch for duplicates and regenerate.

mod token;

pub use token::{normalise_extension, FileToken, StoredFileName, MAX_EXTENSION_LEN};

/// Error type for token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
