//! This library implements a symbolic executor for a small, typed, SSA-form
//! intermediate representation. Given a function and nothing else, it treats
//! every parameter as an unknown, explores every feasible path through the
//! function, and reports concrete inputs under which an assertion in the
//! function can fail.
//!
//! # How it Works
//!
//! From a very high level, the exploration proceeds as follows:
//!
//! 1. A function is obtained, either built in memory through the
//!    [`ir::builder::FunctionBuilder`] or parsed from the textual form by
//!    [`ir::parser::parse_module`].
//! 2. An initial [`vm::context::ExecutionContext`] is created in which every
//!    function parameter is bound to a fresh symbolic bitvector, and is
//!    placed on the [`vm::WorkList`].
//! 3. The [`vm::VM`] drains the worklist. Each context is stepped by the
//!    [`vm::interpreter::Interpreter`], which translates instructions into
//!    solver expressions as it goes.
//! 4. At every conditional branch the solver is asked which sides are
//!    feasible under the path condition accumulated so far. When both are,
//!    the context forks and the unexplored side waits its turn on the
//!    worklist.
//! 5. At every call to the `decaf_assert` intrinsic the solver is asked for
//!    inputs that reach this point and falsify the condition. Any such model
//!    is delivered to the configured [`sink::FailureSink`] together with the
//!    offending context.
//!
//! Exploration is exhaustive rather than heuristic: paths end only when they
//! return, when their path condition becomes infeasible, or when they use an
//! IR feature the executor does not support (which abandons that path alone
//! and is reported in the run's [`vm::ExecutionSummary`]).
//!
//! # Basic Usage
//!
//! For the most basic usage of the library, it is sufficient to parse a
//! function, run [`vm::execute_symbolic`], and look at what arrives in the
//! sink.
//!
//! ```
//! use decaf::{
//!     ir::parser::parse_module,
//!     sink::CollectingSink,
//!     vm::execute_symbolic,
//! };
//!
//! let module = parse_module(
//!     r"
//!     fn @f(i32 %x) {
//!     entry:
//!       %is_zero = icmp eq %x, i32 0
//!       call @decaf_assert(%is_zero)
//!       ret
//!     }
//!     ",
//! )
//! .unwrap();
//! let function = module.function("f").unwrap();
//!
//! let sink = CollectingSink::new();
//! let summary = execute_symbolic(function, &sink);
//!
//! // The assertion `x == 0` fails for any non-zero input, and the sink
//! // holds a concrete witness.
//! assert!(summary.errors.is_empty());
//! let failures = sink.failures();
//! assert_eq!(failures.len(), 1);
//! assert_ne!(failures[0].input("x"), Some(0));
//! ```
//!
//! # The Intrinsic Contract
//!
//! Two function names carry special meaning to the interpreter, and programs
//! under test must call them by exactly these names:
//!
//! - `decaf_assume(i1)` silently prunes every execution in which its
//!   argument could be false.
//! - `decaf_assert(i1)` produces a failure report with concrete reproducing
//!   inputs whenever its argument could be false, and then continues as if
//!   the assertion had held.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod constant;
pub mod error;
pub mod ir;
pub mod sink;
pub mod smt;
pub mod vm;
pub mod watchdog;

// Re-exports to provide the library interface.
pub use sink::{CollectingSink, FailureSink, PrintingSink};
pub use vm::{execute_symbolic, execute_symbolic_configured, ExecutionSummary};

/// Parses the textual IR in `source` and symbolically executes the function
/// named `function` to exhaustion, reporting assertion failures to `sink`.
///
/// This is the convenience entry for clients that start from the textual
/// form; front-ends that build IR in memory call [`vm::execute_symbolic`]
/// directly.
///
/// # Errors
///
/// Returns [`Err`] if `source` does not parse or defines no function called
/// `function`.
pub fn execute_source(
    source: &str,
    function: &str,
    sink: &dyn FailureSink,
) -> error::Result<ExecutionSummary> {
    let module = ir::parser::parse_module(source)?;
    let function = module
        .function(function)
        .ok_or_else(|| error::Error::UnknownFunction {
            name: function.to_owned(),
        })?;
    Ok(execute_symbolic(function, sink))
}
