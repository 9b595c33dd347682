//! This module contains the definition of the [`StackFrame`] type, the
//! per-activation state of a function being symbolically executed.

use std::collections::HashMap;

use z3::{ast::Dynamic, Context};

use crate::{
    error::execution::{Error, Result},
    ir::{BlockId, Function, Instruction, ValueId},
    smt,
};

/// A single activation of a function during symbolic execution.
///
/// The frame maps the SSA values of its function to the solver expressions
/// computed for them, and tracks an instruction cursor within the current
/// basic block. The previously executed block is retained because phi nodes
/// select their incoming value based on where control arrived from.
#[derive(Clone)]
pub struct StackFrame<'ir, 'ctx> {
    /// The function this frame is an activation of.
    function: &'ir Function,

    /// The solver context that the frame's expressions live in, needed to
    /// evaluate constant operands on the fly.
    ctx: &'ctx Context,

    /// The solver expressions bound to the SSA values of `function`.
    ///
    /// Expressions are immutable and cheaply shared, so cloning the frame
    /// shares them rather than copying.
    locals: HashMap<ValueId, Dynamic<'ctx>>,

    /// The block the cursor is currently in.
    current_block: BlockId,

    /// The block that was current immediately before the last inter-block
    /// transition. [`None`] until the first transition happens.
    prev_block: Option<BlockId>,

    /// The index of the next instruction to execute within `current_block`.
    cursor: usize,
}

impl<'ir, 'ctx> StackFrame<'ir, 'ctx> {
    /// Creates a frame positioned at the start of `function`'s entry block.
    ///
    /// # Panics
    ///
    /// Panics if `function` has no blocks, as described on
    /// [`Function::entry`].
    #[must_use]
    pub fn new(function: &'ir Function, ctx: &'ctx Context) -> Self {
        let current_block = function.entry();
        let locals = HashMap::new();
        let prev_block = None;
        let cursor = 0;
        Self {
            function,
            ctx,
            locals,
            current_block,
            prev_block,
            cursor,
        }
    }

    /// Gets the function this frame is an activation of.
    #[must_use]
    pub fn function(&self) -> &'ir Function {
        self.function
    }

    /// Gets the block the cursor is currently in.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Gets the block that was current before the last inter-block
    /// transition, if one has happened.
    #[must_use]
    pub fn prev_block(&self) -> Option<BlockId> {
        self.prev_block
    }

    /// Gets the index of the next instruction to execute within the current
    /// block.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Gets the instruction under the cursor, if the cursor has not run off
    /// the end of the block.
    #[must_use]
    pub fn current_instruction(&self) -> Option<&'ir Instruction> {
        self.function.instruction(self.current_block, self.cursor)
    }

    /// Binds `value` to `expr` in this frame.
    ///
    /// An existing binding is overwritten. The IR is in SSA form, so a
    /// repeated binding can only be the same handle being re-bound on a new
    /// pass through its defining instruction, where the previous expression
    /// is no longer reachable.
    pub fn insert(&mut self, value: ValueId, expr: Dynamic<'ctx>) {
        self.locals.insert(value, expr);
    }

    /// Looks up the expression for `value`.
    ///
    /// Values bound in this frame are returned directly. Values that are not
    /// bound must be IR constants, which are evaluated on the fly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundValue`] if `value` is neither bound nor a
    /// constant, and [`Error::UnsupportedConstant`] if it is a constant of a
    /// kind the solver cannot represent.
    pub fn lookup(&self, value: ValueId) -> Result<Dynamic<'ctx>> {
        if let Some(expr) = self.locals.get(&value) {
            return Ok(expr.clone());
        }
        match self.function.value(value).as_constant() {
            Some(constant) => smt::evaluate_constant(self.ctx, constant),
            None => Err(Error::UnboundValue { value }),
        }
    }

    /// Moves the cursor to the start of `block`, recording the block being
    /// left as the previous block.
    ///
    /// This must be used for every inter-block transition, before any
    /// instruction of `block` (including its leading phi nodes) executes.
    pub fn jump_to(&mut self, block: BlockId) {
        self.prev_block = Some(self.current_block);
        self.current_block = block;
        self.cursor = 0;
    }

    /// Advances the cursor over one executed instruction.
    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Advances the cursor over `count` executed instructions.
    pub fn advance_by(&mut self, count: usize) {
        self.cursor += count;
    }
}

impl std::fmt::Debug for StackFrame<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackFrame")
            .field("function", &self.function.name())
            .field("locals", &self.locals.len())
            .field("current_block", &self.current_block)
            .field("prev_block", &self.prev_block)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
