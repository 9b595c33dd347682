//! This module contains the error type that pertains to parsing the textual
//! form of the IR.

use thiserror::Error;

/// Errors that occur while parsing the textual form of the IR into the
/// in-memory module representation.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{line}:{column}: {message}")]
pub struct Error {
    /// The one-based line on which the error occurred.
    pub line: usize,

    /// The one-based column at which the error occurred.
    pub column: usize,

    /// A human-readable description of what went wrong.
    pub message: String,
}

/// The result type for functions that may return parse errors.
pub type Result<T> = std::result::Result<T, Error>;
