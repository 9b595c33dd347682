//! This module contains the primary error type for the executor's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.
//!
//! # Anyhow
//!
//! All of the errors implement [`std::error::Error`], and hence can be used
//! with [`anyhow::Error`] internally. It is _not_ recommended to use that
//! error type in the interface of the library, as this forces clients to also
//! use `anyhow`.

pub mod container;
pub mod execution;
pub mod parse;

use std::rc::Rc;

use thiserror::Error;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Note that _all_ of the library is public
/// in order to facilitate use-cases beyond the ones designed for.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by
/// the clients of the library) should be members of this enum.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Errors that come from parsing the textual IR.
    #[error(transparent)]
    Parse(#[from] parse::Error),

    /// A function was requested by name from a module that does not define
    /// it.
    #[error("No function named '@{name}' in the module")]
    UnknownFunction { name: String },

    /// Errors from the symbolic execution subsystem of the library, located
    /// at the instruction that raised them.
    #[error(transparent)]
    Execution(#[from] execution::LocatedError),

    /// Unknown errors, usually from the dependencies of the library.
    ///
    /// It is wrapped in an [`Rc`] to ensure that it can be cloned like the
    /// other error types in this interface error.
    #[error(transparent)]
    Other(Rc<anyhow::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(Rc::new(value))
    }
}
