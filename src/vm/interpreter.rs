//! This module contains the [`Interpreter`], which gives the instructions of
//! the IR their symbolic semantics.
//!
//! The interpreter owns one [`ExecutionContext`] and steps it to completion.
//! Most instructions compute a solver expression, bind it to the
//! instruction's result value, and advance the cursor. The interesting cases
//! are the ones that interact with the solver:
//!
//! - A conditional branch queries the feasibility of both sides under the
//!   current path condition. When both are feasible the context forks, with
//!   each side extended by the corresponding constraint; the false side is
//!   handed to the worklist and the true side continues in place.
//! - `decaf_assume` narrows the path condition.
//! - `decaf_assert` asks the solver for a model of the path condition
//!   conjoined with the negated condition, and reports any such model to the
//!   failure sink before continuing under the assumption that the assertion
//!   held.

use z3::{
    ast::{Ast, Bool, Dynamic},
    SatResult,
};

use crate::{
    constant::{ASSERT_INTRINSIC, ASSUME_INTRINSIC},
    error::{
        container::{InstructionPointer, Locatable},
        execution::{Error, LocatedResult},
    },
    ir::{BinaryOp, BlockId, Instruction, Predicate, ValueId},
    sink::FailureSink,
    smt,
    vm::{context::ExecutionContext, Config, WorkList},
};

/// The outcome of executing a single instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Execution of this context continues with the next instruction.
    Continue,

    /// This context is finished and must be discarded.
    Terminate,
}

/// The interpreter for a single execution context.
///
/// Contexts created by forks are placed into the worklist the interpreter
/// was constructed with; failures found along the way go to the failure
/// sink.
pub struct Interpreter<'a, 'ir, 'ctx> {
    /// The context being stepped.
    context: ExecutionContext<'ir, 'ctx>,

    /// The worklist that receives forked contexts.
    queue: &'a mut WorkList<'ir, 'ctx>,

    /// The configuration of the executor.
    config: &'a Config,

    /// The consumer of assertion-failure reports.
    sink: &'a dyn FailureSink,
}

impl<'a, 'ir, 'ctx> Interpreter<'a, 'ir, 'ctx> {
    /// Creates an interpreter that will execute `context` to completion.
    pub fn new(
        context: ExecutionContext<'ir, 'ctx>,
        queue: &'a mut WorkList<'ir, 'ctx>,
        config: &'a Config,
        sink: &'a dyn FailureSink,
    ) -> Self {
        Self {
            context,
            queue,
            config,
            sink,
        }
    }

    /// Executes this interpreter's context until it finishes.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the context encounters an IR feature the executor
    /// does not support. The error terminates this context only; contexts
    /// already in the worklist are unaffected.
    ///
    /// # Panics
    ///
    /// Panics if the instruction cursor runs off the end of a basic block,
    /// which means the function under execution has a block without a
    /// terminator. That is an invariant violation in the host IR and is
    /// fatal to the run.
    pub fn execute(mut self) -> LocatedResult<()> {
        loop {
            match self.step()? {
                Step::Continue => {}
                Step::Terminate => return Ok(()),
            }
        }
    }

    /// Executes the single instruction under the context's cursor.
    fn step(&mut self) -> LocatedResult<Step> {
        let frame = self.context.top();
        let location = InstructionPointer {
            block: frame.current_block(),
            index: frame.cursor(),
        };
        let instruction = frame
            .current_instruction()
            .expect("The instruction cursor ran off the end of a basic block")
            .clone();

        match instruction {
            Instruction::Binary {
                op,
                result,
                lhs,
                rhs,
            } => self.binary(op, result, lhs, rhs, location),
            Instruction::ICmp {
                pred,
                result,
                lhs,
                rhs,
            } => self.icmp(pred, result, lhs, rhs, location),
            Instruction::Phi { .. } => self.phi_group(),
            Instruction::Select {
                result,
                cond,
                if_true,
                if_false,
            } => self.select(result, cond, if_true, if_false, location),
            Instruction::Branch { target } => {
                self.context.top_mut().jump_to(target);
                Ok(Step::Continue)
            }
            Instruction::CondBranch {
                cond,
                if_true,
                if_false,
            } => self.cond_branch(cond, if_true, if_false, location),
            Instruction::Call { callee, args, .. } => self.call(&callee, &args, location),
            Instruction::Return { value } => self.ret(value, location),
        }
    }

    /// Executes a binary integer operation.
    ///
    /// Overflow follows two's-complement wrap-around, and division by zero
    /// is whatever the solver's bitvector division theory makes of it; no
    /// trap is modelled for either.
    fn binary(
        &mut self,
        op: BinaryOp,
        result: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        if matches!(op, BinaryOp::URem | BinaryOp::SRem) {
            return Err(Error::Unimplemented {
                mnemonic: op.mnemonic().to_owned(),
            }
            .locate(location));
        }

        let lhs = self.lookup_bv(lhs, location)?;
        let rhs = self.lookup_bv(rhs, location)?;
        let value = match op {
            BinaryOp::Add => lhs.bvadd(&rhs),
            BinaryOp::Sub => lhs.bvsub(&rhs),
            BinaryOp::Mul => lhs.bvmul(&rhs),
            BinaryOp::UDiv => lhs.bvudiv(&rhs),
            BinaryOp::SDiv => lhs.bvsdiv(&rhs),
            BinaryOp::URem | BinaryOp::SRem => unreachable!("Rejected above"),
        };

        self.bind_and_advance(result, Dynamic::from_ast(&value));
        Ok(Step::Continue)
    }

    /// Executes an integer comparison, binding its 1-bit result.
    fn icmp(
        &mut self,
        pred: Predicate,
        result: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        let lhs = self.lookup_bv(lhs, location)?;
        let rhs = self.lookup_bv(rhs, location)?;
        let condition = match pred {
            Predicate::Eq => lhs._eq(&rhs),
            Predicate::Ne => lhs._eq(&rhs).not(),
            Predicate::Ult => lhs.bvult(&rhs),
            Predicate::Ule => lhs.bvule(&rhs),
            Predicate::Ugt => lhs.bvugt(&rhs),
            Predicate::Uge => lhs.bvuge(&rhs),
            Predicate::Slt => lhs.bvslt(&rhs),
            Predicate::Sle => lhs.bvsle(&rhs),
            Predicate::Sgt => lhs.bvsgt(&rhs),
            Predicate::Sge => lhs.bvsge(&rhs),
        };

        // The IR's booleans are 1-bit integers, so the comparison result is
        // stored in its bitvector form.
        let bit = smt::to_bv1(&Dynamic::from_ast(&condition));
        self.bind_and_advance(result, bit);
        Ok(Step::Continue)
    }

    /// Executes the run of consecutive phi nodes starting at the cursor.
    ///
    /// Phi nodes at the head of a block act in parallel: every incoming
    /// value refers to the state at the predecessor, not to the results of
    /// phis textually above it. All lookups therefore happen against a
    /// snapshot taken before any result is bound.
    fn phi_group(&mut self) -> LocatedResult<Step> {
        let frame = self.context.top();
        let function = frame.function();
        let block = frame.current_block();
        let predecessor = frame.prev_block();

        let mut bindings: Vec<(ValueId, Dynamic<'ctx>)> = Vec::new();
        let mut index = frame.cursor();
        while let Some(Instruction::Phi { result, incoming }) = function.instruction(block, index)
        {
            let here = InstructionPointer { block, index };
            let predecessor = predecessor.ok_or_else(|| {
                Error::PhiPredecessorMissing { predecessor: None }.locate(here)
            })?;
            let chosen = incoming
                .iter()
                .find(|(from, _)| *from == predecessor)
                .map(|(_, value)| *value)
                .ok_or_else(|| {
                    Error::PhiPredecessorMissing {
                        predecessor: Some(function.block(predecessor).name().to_owned()),
                    }
                    .locate(here)
                })?;
            let expr = frame.lookup(chosen).locate(here)?;
            bindings.push((*result, expr));
            index += 1;
        }

        let count = bindings.len();
        let frame = self.context.top_mut();
        for (result, expr) in bindings {
            frame.insert(result, expr);
        }
        frame.advance_by(count);
        Ok(Step::Continue)
    }

    /// Executes a select, binding an if-then-else over its arms.
    fn select(
        &mut self,
        result: ValueId,
        cond: ValueId,
        if_true: ValueId,
        if_false: ValueId,
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        let cond = self.lookup(cond, location)?;
        let condition = smt::require_bool(&cond).locate(location)?;
        let if_true = self.lookup(if_true, location)?;
        let if_false = self.lookup(if_false, location)?;

        let value = condition.ite(&if_true, &if_false);
        self.bind_and_advance(result, value);
        Ok(Step::Continue)
    }

    /// Executes a conditional branch, forking the context when both sides
    /// are feasible.
    fn cond_branch(
        &mut self,
        cond: ValueId,
        if_true: BlockId,
        if_false: BlockId,
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        let cond = self.lookup(cond, location)?;
        let condition = smt::require_bool(&cond).locate(location)?;
        let negation = condition.not();

        let true_feasible = self.feasible(self.context.check_with_bool(&condition));
        let false_feasible = self.feasible(self.context.check_with_bool(&negation));

        match (true_feasible, false_feasible) {
            (true, true) => {
                // Both sides can happen. The false side becomes a fork that
                // waits its turn in the worklist; the true side continues in
                // this interpreter. The choice of which side continues only
                // affects exploration order.
                let mut fork = self.context.fork();
                fork.assert_bool(&negation);
                fork.top_mut().jump_to(if_false);
                self.queue.push(fork);

                self.context.assert_bool(&condition);
                self.context.top_mut().jump_to(if_true);
            }
            (true, false) => {
                self.context.assert_bool(&condition);
                self.context.top_mut().jump_to(if_true);
            }
            (false, true) => {
                self.context.assert_bool(&negation);
                self.context.top_mut().jump_to(if_false);
            }
            (false, false) => {
                // Neither side of the branch is satisfiable, which can only
                // happen when the path condition itself has become
                // inconsistent or the solver gave up on both queries. There
                // is nothing left to explore down here.
                return Ok(Step::Terminate);
            }
        }
        Ok(Step::Continue)
    }

    /// Executes a call.
    ///
    /// Only the assumption and assertion intrinsics are callable; the name
    /// of anything else is reported as an unknown external and terminates
    /// the context.
    fn call(
        &mut self,
        callee: &str,
        args: &[ValueId],
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        match callee {
            ASSUME_INTRINSIC => self.assume(args, location),
            ASSERT_INTRINSIC => self.check_assertion(args, location),
            other => Err(Error::UnknownExternal {
                name: other.to_owned(),
            }
            .locate(location)),
        }
    }

    /// Executes `decaf_assume`: narrows the path condition to executions on
    /// which the argument holds.
    fn assume(&mut self, args: &[ValueId], location: InstructionPointer) -> LocatedResult<Step> {
        let condition = self.intrinsic_condition(args, location)?;
        self.context.assert_bool(&condition);
        self.context.top_mut().advance();
        Ok(Step::Continue)
    }

    /// Executes `decaf_assert`: reports a model for any execution on which
    /// the argument fails, then continues under the assumption that it
    /// held.
    fn check_assertion(
        &mut self,
        args: &[ValueId],
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        let condition = self.intrinsic_condition(args, location)?;
        let negation = condition.not();

        if self.feasible(self.context.check_with_bool(&negation)) {
            // A feasible `unknown` may come back without a model; with no
            // concrete witness to hand over there is nothing to report.
            if let Some(model) = self.context.model() {
                self.sink.report(&self.context, &model);
            }
        }

        self.context.assert_bool(&condition);
        self.context.top_mut().advance();
        Ok(Step::Continue)
    }

    /// Looks up the single 1-bit argument of an intrinsic call and
    /// normalizes it to a boolean.
    fn intrinsic_condition(
        &self,
        args: &[ValueId],
        location: InstructionPointer,
    ) -> LocatedResult<Bool<'ctx>> {
        let [arg] = args else {
            return Err(Error::TypeMismatch {
                found: format!("a call with {} arguments", args.len()),
            }
            .locate(location));
        };
        let expr = self.lookup(*arg, location)?;
        smt::require_bool(&expr).locate(location)
    }

    /// Executes a return, popping the active frame.
    ///
    /// With the outermost frame gone the context is terminal. Otherwise the
    /// caller resumes: its cursor still rests on the call instruction, whose
    /// result receives the returned value.
    fn ret(
        &mut self,
        value: Option<ValueId>,
        location: InstructionPointer,
    ) -> LocatedResult<Step> {
        let returned = match value {
            Some(value) => Some(self.lookup(value, location)?),
            None => None,
        };

        let _finished = self.context.pop_frame();
        if self.context.is_terminal() {
            return Ok(Step::Terminate);
        }

        let caller = self.context.top_mut();
        if let Some(Instruction::Call {
            result: Some(result),
            ..
        }) = caller.current_instruction()
        {
            if let Some(returned) = returned {
                caller.insert(*result, returned);
            }
        }
        caller.advance();
        Ok(Step::Continue)
    }

    /// Decides whether a satisfiability result means the queried path is
    /// worth exploring.
    ///
    /// `unknown` is treated as feasible unless configured otherwise, which
    /// keeps failure detection sound at the cost of possibly exploring
    /// paths that a stronger solver would rule out.
    fn feasible(&self, result: SatResult) -> bool {
        match result {
            SatResult::Sat => true,
            SatResult::Unsat => false,
            SatResult::Unknown => self.config.explore_unknown,
        }
    }

    /// Looks up `value` in the active frame.
    fn lookup(
        &self,
        value: ValueId,
        location: InstructionPointer,
    ) -> LocatedResult<Dynamic<'ctx>> {
        self.context.top().lookup(value).locate(location)
    }

    /// Looks up `value` and views it as a bitvector.
    fn lookup_bv(
        &self,
        value: ValueId,
        location: InstructionPointer,
    ) -> LocatedResult<z3::ast::BV<'ctx>> {
        let expr = self.lookup(value, location)?;
        Ok(expr
            .as_bv()
            .expect("Integer operands are an invariant of the host IR"))
    }

    /// Binds `expr` as the result of the current instruction and moves the
    /// cursor past it.
    fn bind_and_advance(&mut self, result: ValueId, expr: Dynamic<'ctx>) {
        let frame = self.context.top_mut();
        frame.insert(result, expr);
        frame.advance();
    }
}
