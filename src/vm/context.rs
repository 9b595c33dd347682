//! This module contains the definition of the [`ExecutionContext`] type,
//! representing one feasible execution path through the function under test.

use z3::{
    ast::{Bool, Dynamic, BV},
    Context,
    Model,
    Params,
    SatResult,
    Solver,
};

use crate::{
    constant::INPUT_SYMBOL_SEPARATOR,
    error::execution::Result,
    ir::{Function, ValueData},
    smt,
    vm::frame::StackFrame,
};

/// The state of one execution path: a call stack together with the solver
/// state that holds the path condition accumulated along the way.
///
/// A context is owned by the executor's worklist or, transiently, by the
/// interpreter stepping it. Contexts can be forked at will to represent the
/// two sides of a feasible branch, but contain no logic for performing that
/// execution themselves.
///
/// # Solver Ownership
///
/// Every context owns its solver outright; nothing about the solver state is
/// shared between contexts. Forking builds a fresh solver and replays the
/// parent's assertion log into it, which is why the log is kept alongside
/// the solver. Expressions themselves are immutable and shared freely.
pub struct ExecutionContext<'ir, 'ctx> {
    /// The solver context in which all expressions and solvers live.
    ctx: &'ctx Context,

    /// The call stack. The last frame is the active one.
    stack: Vec<StackFrame<'ir, 'ctx>>,

    /// The solver holding the path condition of this context.
    solver: Solver<'ctx>,

    /// The assertions that make up the path condition, in the order they
    /// were added. Replayed into the fresh solver of each fork.
    assertions: Vec<Bool<'ctx>>,

    /// The symbolic inputs of the execution: one named bitvector per
    /// function parameter, in declaration order.
    inputs: Vec<(String, BV<'ctx>)>,

    /// The solver timeout applied to this context's solver and inherited by
    /// its forks, in milliseconds.
    timeout_ms: Option<u32>,
}

impl<'ir, 'ctx> ExecutionContext<'ir, 'ctx> {
    /// Creates the initial context for `function`, with every parameter
    /// bound to a fresh symbolic bitvector of the parameter's width.
    ///
    /// Input symbols are named after their parameter with a uniquifying
    /// index appended, so two parameters that share a name cannot be
    /// conflated by the solver.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any parameter has a type the solver cannot
    /// represent.
    pub fn new(
        function: &'ir Function,
        ctx: &'ctx Context,
        timeout_ms: Option<u32>,
    ) -> Result<Self> {
        let mut frame = StackFrame::new(function, ctx);
        let mut inputs = Vec::new();

        for (index, param) in function.params().iter().enumerate() {
            let ValueData::Param { name, ty } = function.value(*param) else {
                unreachable!("Function parameters always refer to Param entries");
            };

            // Mapping the type first means unsupported parameter types are
            // reported before any symbol is created.
            smt::sort_for_type(ctx, *ty)?;
            let width = ty
                .bits()
                .expect("Integer types always have a bit width");
            let symbol = format!("{name}{INPUT_SYMBOL_SEPARATOR}{index}");
            let bv = BV::new_const(ctx, symbol.as_str(), width);

            frame.insert(*param, Dynamic::from_ast(&bv));
            inputs.push((name.clone(), bv));
        }

        let stack = vec![frame];
        let solver = new_solver(ctx, timeout_ms);
        let assertions = Vec::new();
        Ok(Self {
            ctx,
            stack,
            solver,
            assertions,
            inputs,
            timeout_ms,
        })
    }

    /// Gets the active stack frame.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty. The executor never schedules a context
    /// with an empty stack, so this is a programmer bug in the interpreter.
    #[must_use]
    pub fn top(&self) -> &StackFrame<'ir, 'ctx> {
        self.stack.last().expect("The context has no active frame")
    }

    /// Gets the active stack frame for modification.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty, as for [`Self::top`].
    pub fn top_mut(&mut self) -> &mut StackFrame<'ir, 'ctx> {
        self.stack
            .last_mut()
            .expect("The context has no active frame")
    }

    /// Removes the active frame from the stack, returning it.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty, as for [`Self::top`].
    pub fn pop_frame(&mut self) -> StackFrame<'ir, 'ctx> {
        self.stack.pop().expect("The context has no active frame")
    }

    /// Checks whether the call stack has run out of frames, which makes the
    /// context terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.stack.is_empty()
    }

    /// Gets the symbolic inputs of the execution, one per function
    /// parameter in declaration order.
    ///
    /// Failure sinks use these to evaluate the reported model into concrete
    /// parameter values.
    #[must_use]
    pub fn inputs(&self) -> &[(String, BV<'ctx>)] {
        self.inputs.as_slice()
    }

    /// Adds the boolean normalization of `expr` to the path condition of
    /// this context permanently.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `expr` is neither a boolean nor a 1-bit
    /// bitvector.
    pub fn assert(&mut self, expr: &Dynamic<'ctx>) -> Result<()> {
        let condition = smt::require_bool(expr)?;
        self.assert_bool(&condition);
        Ok(())
    }

    /// Adds `condition` to the path condition of this context permanently.
    pub fn assert_bool(&mut self, condition: &Bool<'ctx>) {
        self.solver.assert(condition);
        self.assertions.push(condition.clone());
    }

    /// Checks the satisfiability of the accumulated path condition.
    ///
    /// The assertion set is not modified. If the result is
    /// [`SatResult::Sat`], a model is available from [`Self::model`].
    #[must_use]
    pub fn check(&self) -> SatResult {
        self.solver.check()
    }

    /// Checks the satisfiability of the accumulated path condition
    /// conjoined with the boolean normalization of `expr`.
    ///
    /// The assertion set is not modified; `expr` participates only as an
    /// assumption of this one query. If the result is [`SatResult::Sat`], a
    /// model is available from [`Self::model`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `expr` is neither a boolean nor a 1-bit
    /// bitvector.
    pub fn check_with(&self, expr: &Dynamic<'ctx>) -> Result<SatResult> {
        let condition = smt::require_bool(expr)?;
        Ok(self.check_with_bool(&condition))
    }

    /// Checks the satisfiability of the accumulated path condition
    /// conjoined with `condition`, without modifying the assertion set.
    #[must_use]
    pub fn check_with_bool(&self, condition: &Bool<'ctx>) -> SatResult {
        self.solver.check_assumptions(&[condition.clone()])
    }

    /// Gets the model produced by the most recent satisfiable check.
    #[must_use]
    pub fn model(&self) -> Option<Model<'ctx>> {
        self.solver.get_model()
    }

    /// Gets the path condition of this context as the conjunction of the
    /// assertions added so far, in the order they were added.
    #[must_use]
    pub fn assertions(&self) -> &[Bool<'ctx>] {
        self.assertions.as_slice()
    }

    /// Creates a new context that is independent from this one but has the
    /// same state.
    ///
    /// The new context's solver is a fresh one with the parent's assertion
    /// log replayed into it, so assertions added to either context after the
    /// fork are invisible to the other. The stack is cloned structurally;
    /// the expressions bound in its frames are shared by reference.
    #[must_use]
    pub fn fork(&self) -> Self {
        let solver = new_solver(self.ctx, self.timeout_ms);
        for assertion in &self.assertions {
            solver.assert(assertion);
        }

        Self {
            ctx: self.ctx,
            stack: self.stack.clone(),
            solver,
            assertions: self.assertions.clone(),
            inputs: self.inputs.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

impl std::fmt::Debug for ExecutionContext<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("stack", &self.stack)
            .field("assertions", &self.assertions.len())
            .finish_non_exhaustive()
    }
}

/// Creates a solver with the configured timeout applied.
fn new_solver<'ctx>(ctx: &'ctx Context, timeout_ms: Option<u32>) -> Solver<'ctx> {
    let solver = Solver::new(ctx);
    if let Some(timeout) = timeout_ms {
        let mut params = Params::new(ctx);
        params.set_u32("timeout", timeout);
        solver.set_params(&params);
    }
    solver
}

#[cfg(test)]
mod test {
    use z3::{
        ast::{Ast, Dynamic, BV},
        Config,
        Context,
        SatResult,
    };

    use crate::{
        ir::{builder::FunctionBuilder, Function, Type},
        vm::context::ExecutionContext,
    };

    fn identity_function() -> Function {
        let mut builder = FunctionBuilder::new("f");
        let _ = builder.param("x", Type::Int { bits: 32 });
        builder.block("entry");
        builder.ret(None);
        builder.build()
    }

    #[test]
    fn binds_parameters_to_fresh_symbols() -> anyhow::Result<()> {
        let function = identity_function();
        let ctx = Context::new(&Config::new());
        let context = ExecutionContext::new(&function, &ctx, None)?;

        let inputs = context.inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].0, "x");
        assert_eq!(inputs[0].1.get_size(), 32);

        let x = function.params()[0];
        let bound = context.top().lookup(x)?;
        assert_eq!(bound.as_bv().expect("parameters are bitvectors"), inputs[0].1);
        Ok(())
    }

    #[test]
    fn rejects_parameters_of_unsupported_type() {
        let mut builder = FunctionBuilder::new("g");
        let _ = builder.param("p", Type::Pointer);
        builder.block("entry");
        builder.ret(None);
        let function = builder.build();

        let ctx = Context::new(&Config::new());
        let result = ExecutionContext::new(&function, &ctx, None);
        assert!(result.is_err());
    }

    #[test]
    fn check_does_not_mutate_the_assertion_set() -> anyhow::Result<()> {
        let function = identity_function();
        let ctx = Context::new(&Config::new());
        let context = ExecutionContext::new(&function, &ctx, None)?;

        let x = &context.inputs()[0].1;
        let is_zero = Dynamic::from_ast(&x._eq(&BV::from_u64(&ctx, 0, 32)));
        let is_one = Dynamic::from_ast(&x._eq(&BV::from_u64(&ctx, 1, 32)));

        // Both are individually satisfiable against the empty path
        // condition; if either check leaked into the assertion set, the
        // other would come back unsat.
        assert_eq!(context.check_with(&is_zero)?, SatResult::Sat);
        assert_eq!(context.check_with(&is_one)?, SatResult::Sat);
        assert_eq!(context.check(), SatResult::Sat);
        Ok(())
    }

    #[test]
    fn forks_are_logically_independent() -> anyhow::Result<()> {
        let function = identity_function();
        let ctx = Context::new(&Config::new());
        let mut parent = ExecutionContext::new(&function, &ctx, None)?;

        let x = parent.inputs()[0].1.clone();
        let is_zero = x._eq(&BV::from_u64(&ctx, 0, 32));
        parent.assert_bool(&is_zero);

        let mut fork = parent.fork();

        // The fork inherits the parent's path condition.
        let is_one = x._eq(&BV::from_u64(&ctx, 1, 32));
        assert_eq!(fork.check_with_bool(&is_one), SatResult::Unsat);

        // New assertions do not leak between the two, in either direction.
        fork.assert_bool(&x._eq(&BV::from_u64(&ctx, 0, 32)).not());
        assert_eq!(fork.check(), SatResult::Unsat);
        assert_eq!(parent.check(), SatResult::Sat);
        Ok(())
    }
}
