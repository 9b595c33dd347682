//! This module contains common testing utilities for testing this library.
#![cfg(test)]

use decaf::{
    ir::Function,
    sink::{CollectingSink, Failure},
    vm::{execute_symbolic, ExecutionSummary},
};

/// Executes `function` symbolically, returning the run summary and the
/// failures that were reported along the way.
#[allow(unused)] // It is actually
pub fn run(function: &Function) -> (ExecutionSummary, Vec<Failure>) {
    let sink = CollectingSink::new();
    let summary = execute_symbolic(function, &sink);
    (summary, sink.failures())
}

/// Parses `source`, looks up the function called `name`, and executes it
/// symbolically.
#[allow(unused)] // It is actually
pub fn run_text(source: &str, name: &str) -> anyhow::Result<(ExecutionSummary, Vec<Failure>)> {
    let sink = CollectingSink::new();
    // The interface error is not `Send`, so it travels as a message here.
    let summary =
        decaf::execute_source(source, name, &sink).map_err(|error| anyhow::anyhow!("{error}"))?;
    Ok((summary, sink.failures()))
}

/// Asserts that a run completed with full coverage: no abandoned paths.
#[allow(unused)] // It is actually
pub fn assert_full_coverage(summary: &ExecutionSummary) {
    assert!(
        summary.errors.is_empty(),
        "Paths were abandoned: {}",
        summary.errors
    );
}
