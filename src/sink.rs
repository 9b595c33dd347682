//! This module contains the type definitions for the consumers of assertion
//! failures discovered during symbolic execution.
//!
//! A failure is not an error: it is the product the executor exists to
//! deliver. When the interpreter finds a model under which a
//! `decaf_assert` condition is false, it hands the model and a view of the
//! offending execution context to the configured [`FailureSink`] and then
//! carries on executing. What happens to the report is entirely the sink's
//! concern, allowing the client to print it, collect it, or feed it into
//! further tooling.

use std::cell::RefCell;

use z3::Model;

use crate::vm::context::ExecutionContext;

/// The interface to an object that consumes assertion-failure reports.
///
/// Implementations take `&self` so that a sink can be shared across the
/// whole run; sinks that accumulate state use interior mutability.
pub trait FailureSink {
    /// Consumes one failure, described by the `context` in which the failing
    /// assertion was reached and a `model` of concrete inputs that falsify
    /// it.
    ///
    /// The model satisfies the context's path condition conjoined with the
    /// negation of the asserted condition. The context's
    /// [`ExecutionContext::inputs`] are the symbols to evaluate against the
    /// model to obtain concrete parameter values.
    fn report<'ctx>(&self, context: &ExecutionContext<'_, 'ctx>, model: &Model<'ctx>);
}

/// A [`FailureSink`] that renders every failure to standard output in a
/// human-readable form.
///
/// This is the sink used when a client does not provide one.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PrintingSink;

impl FailureSink for PrintingSink {
    fn report<'ctx>(&self, context: &ExecutionContext<'_, 'ctx>, model: &Model<'ctx>) {
        let function = context.top().function().name();
        println!("Found assertion failure in @{function} with inputs:");
        for (name, symbol) in context.inputs() {
            match model.eval(symbol, true).and_then(|value| value.as_u64()) {
                Some(value) => println!("  {name} = {value}"),
                None => println!("  {name} = <unconstrained>"),
            }
        }
    }
}

/// One recorded assertion failure: the concrete input assignment extracted
/// from the reported model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
    /// The function parameters, in declaration order, with the concrete
    /// values the model assigns to them.
    pub inputs: Vec<(String, u64)>,
}

impl Failure {
    /// Gets the concrete value of the parameter called `name`, if the
    /// failure has one.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<u64> {
        self.inputs
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| *value)
    }
}

/// A [`FailureSink`] that collects the concrete inputs of every reported
/// failure, for programmatic inspection after the run.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    failures: RefCell<Vec<Failure>>,
}

impl CollectingSink {
    /// Creates a new sink with no recorded failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the failures recorded so far, in report order.
    #[must_use]
    pub fn failures(&self) -> Vec<Failure> {
        self.failures.borrow().clone()
    }

    /// Gets the number of failures recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.borrow().len()
    }

    /// Checks whether no failures have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureSink for CollectingSink {
    fn report<'ctx>(&self, context: &ExecutionContext<'_, 'ctx>, model: &Model<'ctx>) {
        let inputs = context
            .inputs()
            .iter()
            .map(|(name, symbol)| {
                // Completion fills in parameters the path never constrained,
                // so every input gets a concrete value.
                let value = model
                    .eval(symbol, true)
                    .and_then(|value| value.as_u64())
                    .unwrap_or_default();
                (name.clone(), value)
            })
            .collect();
        self.failures.borrow_mut().push(Failure { inputs });
    }
}
