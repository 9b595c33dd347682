//! This module contains constants that are needed throughout the codebase.

/// The name of the intrinsic that prunes execution paths on which its argument
/// can be false.
///
/// Programs under test must call it by exactly this name.
pub const ASSUME_INTRINSIC: &str = "decaf_assume";

/// The name of the intrinsic that reports a concrete counterexample whenever
/// its argument can be false.
///
/// Programs under test must call it by exactly this name.
pub const ASSERT_INTRINSIC: &str = "decaf_assert";

/// The separator between a parameter's name and its uniquifying index in the
/// names of the solver symbols created for function inputs.
pub const INPUT_SYMBOL_SEPARATOR: char = '!';

/// The default number of scheduling decisions the executor makes between
/// polls of the watchdog.
pub const DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS: usize = 100;
