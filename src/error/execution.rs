//! This module contains errors pertaining to the symbolic execution of the
//! program under test.

use thiserror::Error;

use crate::{
    error::container,
    ir::{Constant, Type, ValueId},
};

/// Errors that terminate the execution context in which they arise.
///
/// These errors indicate that the program under test uses an IR feature that
/// the executor does not support, not that the program itself is incorrect.
/// Assertion failures discovered in the program under test are never
/// represented as errors; they are delivered to the
/// [`crate::sink::FailureSink`] instead.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("The type {ty} has no corresponding solver sort")]
    UnsupportedType { ty: Type },

    #[error("The constant {constant} cannot be evaluated to a solver expression")]
    UnsupportedConstant { constant: Constant },

    #[error("The `{mnemonic}` instruction is not implemented")]
    Unimplemented { mnemonic: String },

    #[error("Call to unknown external function `{name}`")]
    UnknownExternal { name: String },

    #[error("A phi node has no incoming value for predecessor {predecessor:?}")]
    PhiPredecessorMissing { predecessor: Option<String> },

    #[error("Expected a boolean or 1-bit value but found {found}")]
    TypeMismatch { found: String },

    #[error("{value:?} is not bound in the current frame and is not a constant")]
    UnboundValue { value: ValueId },
}

/// An execution error with the instruction at which it arose attached.
pub type LocatedError = container::Located<Error>;

/// A container of execution errors used for aggregating the diagnostics of
/// terminated contexts over the course of a run.
pub type Errors = container::Errors<LocatedError>;

/// The result type for methods that may have execution errors.
pub type Result<T> = std::result::Result<T, Error>;

/// The result type for methods whose execution errors carry a location.
pub type LocatedResult<T> = std::result::Result<T, LocatedError>;

/// Make it possible to attach locations to these errors.
impl container::Locatable for Error {
    type Located = LocatedError;

    fn locate(self, instruction_pointer: container::InstructionPointer) -> Self::Located {
        container::Located {
            location: instruction_pointer,
            payload:  self,
        }
    }
}
