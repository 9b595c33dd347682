//! This module contains the symbolic virtual machine: the worklist of
//! pending execution contexts and the drive-to-completion loop that feeds
//! them to the [`interpreter::Interpreter`].

pub mod context;
pub mod frame;
pub mod interpreter;

use crate::{
    error::{container::InstructionPointer, execution::Errors},
    ir::Function,
    sink::FailureSink,
    vm::{context::ExecutionContext, interpreter::Interpreter},
    watchdog::{DynWatchdog, LazyWatchdog},
};

/// The collection of execution contexts that are waiting to be explored.
///
/// The worklist does not inspect the contexts it holds. Contexts come back
/// out in last-in, first-out order, which makes exploration depth-first: a
/// fork is fully explored before the worklist returns to the paths queued
/// before it, and exploration order is deterministic from run to run.
#[derive(Debug, Default)]
pub struct WorkList<'ir, 'ctx> {
    contexts: Vec<ExecutionContext<'ir, 'ctx>>,
}

impl<'ir, 'ctx> WorkList<'ir, 'ctx> {
    /// Creates a new, empty worklist.
    #[must_use]
    pub fn new() -> Self {
        let contexts = Vec::new();
        Self { contexts }
    }

    /// Adds `context` to the worklist to await execution.
    pub fn push(&mut self, context: ExecutionContext<'ir, 'ctx>) {
        self.contexts.push(context);
    }

    /// Removes and returns the context to be executed next.
    pub fn pop(&mut self) -> Option<ExecutionContext<'ir, 'ctx>> {
        self.contexts.pop()
    }

    /// Checks whether any contexts are waiting.
    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.contexts.is_empty()
    }

    /// Gets the number of contexts that are waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Checks whether the worklist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// The configuration for the symbolic virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Whether a solver result of `unknown` is treated as satisfiable.
    ///
    /// Exploring unknowable paths keeps failure detection sound at the cost
    /// of potentially reporting failures on paths a stronger solver would
    /// rule out. Disabling this prunes such paths instead.
    ///
    /// Defaults to `true`.
    pub explore_unknown: bool,

    /// A per-query timeout for the solver, in milliseconds.
    ///
    /// With a timeout set, queries that exceed it come back as `unknown`
    /// and are subject to `explore_unknown`.
    ///
    /// Defaults to [`None`].
    pub solver_timeout_ms: Option<u32>,
}

impl Config {
    /// Sets the `explore_unknown` config parameter to `value`.
    #[must_use]
    pub fn with_explore_unknown(mut self, value: bool) -> Self {
        self.explore_unknown = value;
        self
    }

    /// Sets the `solver_timeout_ms` config parameter to `value`.
    #[must_use]
    pub fn with_solver_timeout_ms(mut self, value: u32) -> Self {
        self.solver_timeout_ms = Some(value);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let explore_unknown = true;
        let solver_timeout_ms = None;
        Self {
            explore_unknown,
            solver_timeout_ms,
        }
    }
}

/// The outcome of running a function to exhaustion.
///
/// Assertion failures are not part of the summary; they are delivered to the
/// failure sink as they are found.
#[derive(Clone, Debug)]
pub struct ExecutionSummary {
    /// The number of contexts the executor scheduled.
    pub contexts_explored: usize,

    /// The number of contexts that ran to completion.
    pub contexts_completed: usize,

    /// The diagnostics of contexts that were terminated because they used an
    /// IR feature the executor does not support.
    ///
    /// A non-empty container means coverage of the function was partial:
    /// each diagnostic stands for one abandoned path, while the remaining
    /// paths were still explored.
    pub errors: Errors,
}

/// The symbolic virtual machine.
///
/// The machine owns the worklist of pending contexts and drives each of them
/// to completion in turn, collecting the diagnostics of contexts that had to
/// be abandoned. One instruction of one context executes at a time; forking
/// hands the unexplored side back to the worklist.
pub struct VM<'ir, 'ctx> {
    /// The contexts awaiting exploration.
    worklist: WorkList<'ir, 'ctx>,

    /// The configuration of the virtual machine.
    config: Config,

    /// A watchdog polled between contexts to check whether execution should
    /// be abandoned.
    watchdog: DynWatchdog,

    /// The diagnostics of contexts terminated by executor-level errors.
    errors: Errors,

    /// The number of contexts scheduled so far.
    contexts_explored: usize,

    /// The number of contexts that ran to completion so far.
    contexts_completed: usize,
}

impl<'ir, 'ctx> VM<'ir, 'ctx> {
    /// Constructs a new virtual machine with the provided configuration.
    #[must_use]
    pub fn new(config: Config, watchdog: DynWatchdog) -> Self {
        let worklist = WorkList::new();
        let errors = Errors::default();
        let contexts_explored = 0;
        let contexts_completed = 0;
        Self {
            worklist,
            config,
            watchdog,
            errors,
            contexts_explored,
            contexts_completed,
        }
    }

    /// Adds `context` to the queue of contexts to be explored.
    pub fn enqueue(&mut self, context: ExecutionContext<'ir, 'ctx>) {
        self.worklist.push(context);
    }

    /// Drains the worklist, executing every pending context (and every
    /// context those executions fork off) to completion.
    ///
    /// Assertion failures discovered along the way are delivered to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] carrying the per-context diagnostics if any context
    /// had to be terminated because it used an unsupported IR feature. The
    /// remaining contexts are still executed; an error return therefore
    /// means partial coverage rather than total failure.
    pub fn execute(&mut self, sink: &dyn FailureSink) -> Result<(), Errors> {
        let poll_interval = self.watchdog.poll_every();
        let mut scheduled: usize = 0;

        while let Some(context) = self.worklist.pop() {
            if scheduled % poll_interval == 0 && self.watchdog.should_stop() {
                log::debug!(
                    "Execution stopped by the watchdog after {} contexts",
                    self.contexts_explored
                );
                break;
            }
            scheduled += 1;
            self.contexts_explored += 1;
            log::trace!("Exploring context {}", self.contexts_explored);

            let interpreter =
                Interpreter::new(context, &mut self.worklist, &self.config, sink);
            match interpreter.execute() {
                Ok(()) => self.contexts_completed += 1,
                Err(error) => {
                    log::debug!("Context terminated: {error}");
                    self.errors.add(error);
                }
            }
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.clone())
        }
    }

    /// Consumes the virtual machine, yielding the summary of the run.
    #[must_use]
    pub fn consume(self) -> ExecutionSummary {
        ExecutionSummary {
            contexts_explored:  self.contexts_explored,
            contexts_completed: self.contexts_completed,
            errors:             self.errors,
        }
    }
}

/// Symbolically executes `function` to exhaustion, reporting assertion
/// failures to `sink`.
///
/// Every parameter of the function is bound to a fresh symbolic input, and
/// every feasible path through the function is explored. For each
/// `decaf_assert` whose condition can be false on the path reaching it, the
/// sink receives a model of concrete inputs that falsify it.
///
/// Uses the default [`Config`] and never stops early; see
/// [`execute_symbolic_configured`] for control over both.
///
/// # Panics
///
/// Panics if `function` has no entry block.
pub fn execute_symbolic(function: &Function, sink: &dyn FailureSink) -> ExecutionSummary {
    execute_symbolic_configured(function, sink, Config::default(), LazyWatchdog.in_rc())
}

/// Symbolically executes `function` to exhaustion with the provided
/// configuration and watchdog, reporting assertion failures to `sink`.
///
/// # Panics
///
/// Panics if `function` has no entry block.
pub fn execute_symbolic_configured(
    function: &Function,
    sink: &dyn FailureSink,
    config: Config,
    watchdog: DynWatchdog,
) -> ExecutionSummary {
    let z3_config = z3::Config::new();
    let ctx = z3::Context::new(&z3_config);

    let solver_timeout_ms = config.solver_timeout_ms;
    let mut vm = VM::new(config, watchdog);
    match ExecutionContext::new(function, &ctx, solver_timeout_ms) {
        Ok(context) => vm.enqueue(context),
        Err(error) => {
            // Parameter binding happens before any instruction runs, so the
            // diagnostic is pinned to the start of the entry block.
            let location = InstructionPointer {
                block: function.entry(),
                index: 0,
            };
            vm.errors.add_located(location, error);
        }
    }

    let _ = vm.execute(sink);
    let summary = vm.consume();
    log::debug!(
        "Explored {} contexts, {} completed, {} abandoned",
        summary.contexts_explored,
        summary.contexts_completed,
        summary.errors.len()
    );
    summary
}
