//! This module contains the [`FunctionBuilder`], the programmatic way of
//! constructing IR functions.
//!
//! The builder keeps a current-block cursor: emitter methods append to the
//! block most recently selected with [`FunctionBuilder::switch_to_block`]
//! (or the most recently created block if none was selected). Instruction
//! results are typed by the builder and given automatically generated names.

use crate::ir::{
    BinaryOp,
    Block,
    BlockId,
    Constant,
    Function,
    Instruction,
    Predicate,
    Type,
    ValueData,
    ValueId,
};

/// An incremental builder for [`Function`]s.
///
/// # Usage
///
/// ```
/// use decaf::ir::{builder::FunctionBuilder, BinaryOp, Predicate, Type};
///
/// let mut builder = FunctionBuilder::new("add_is_monotone");
/// let a = builder.param("a", Type::Int { bits: 32 });
/// let b = builder.param("b", Type::Int { bits: 32 });
/// builder.block("entry");
///
/// let sum = builder.binary(BinaryOp::Add, a, b);
/// let ge = builder.icmp(Predicate::Uge, sum, a);
/// builder.call("decaf_assert", &[ge], None);
/// builder.ret(None);
///
/// let function = builder.build();
/// assert_eq!(function.params().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct FunctionBuilder {
    name:    String,
    params:  Vec<ValueId>,
    values:  Vec<ValueData>,
    blocks:  Vec<Block>,
    current: Option<BlockId>,
}

impl FunctionBuilder {
    /// Creates a builder for a function called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let params = Vec::new();
        let values = Vec::new();
        let blocks = Vec::new();
        let current = None;
        Self {
            name,
            params,
            values,
            blocks,
            current,
        }
    }

    /// Declares a function parameter with the provided `name` and `ty`,
    /// returning its value handle.
    pub fn param(&mut self, name: impl Into<String>, ty: Type) -> ValueId {
        let name = name.into();
        let id = self.new_value(ValueData::Param { name, ty });
        self.params.push(id);
        id
    }

    /// Interns `constant` in the value table, returning its value handle.
    pub fn constant(&mut self, constant: Constant) -> ValueId {
        self.new_value(ValueData::Const(constant))
    }

    /// Interns an integer constant of the provided width and value.
    ///
    /// # Panics
    ///
    /// Panics for widths outside `1..=64`, as described on
    /// [`Constant::int`].
    pub fn iconst(&mut self, bits: u32, value: u64) -> ValueId {
        self.constant(Constant::int(bits, value))
    }

    /// Creates a new basic block named `name` and makes it the current
    /// block.
    ///
    /// The first block created is the function's entry block.
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = Function::new_block_id(self.blocks.len());
        self.blocks.push(Block::new(name));
        self.current = Some(id);
        id
    }

    /// Makes `block` the target of subsequent emitter calls.
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    /// Emits a binary integer operation, returning the handle of its result.
    ///
    /// The result has the type of `lhs`; operand widths are the front-end's
    /// responsibility.
    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.values[lhs.index()].ty();
        let result = self.new_result(ty);
        self.emit(Instruction::Binary {
            op,
            result,
            lhs,
            rhs,
        });
        result
    }

    /// Emits an integer comparison, returning the handle of its 1-bit
    /// result.
    pub fn icmp(&mut self, pred: Predicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        let result = self.new_result(Type::bool());
        self.emit(Instruction::ICmp {
            pred,
            result,
            lhs,
            rhs,
        });
        result
    }

    /// Emits a phi node over the provided `incoming` (predecessor, value)
    /// pairs, returning the handle of its result.
    ///
    /// # Panics
    ///
    /// Panics if `incoming` is empty, as a phi with no incoming values is
    /// malformed SSA.
    pub fn phi(&mut self, incoming: &[(BlockId, ValueId)]) -> ValueId {
        let (_, first) = incoming
            .first()
            .expect("A phi node must have at least one incoming value");
        let ty = self.values[first.index()].ty();
        let result = self.new_result(ty);
        self.emit(Instruction::Phi {
            result,
            incoming: incoming.to_vec(),
        });
        result
    }

    /// Adds an incoming `(from, value)` edge to the phi node that defines
    /// `phi`.
    ///
    /// Loop phis consume values defined later in the block graph than the
    /// phi itself; they are built with their forward edges first and the
    /// back edges added through this method once the values exist.
    ///
    /// # Panics
    ///
    /// Panics if `phi` is not the result of a phi instruction emitted by
    /// this builder.
    pub fn add_phi_incoming(&mut self, phi: ValueId, from: BlockId, value: ValueId) {
        let incoming = self
            .blocks
            .iter_mut()
            .flat_map(|block| block.instructions_mut())
            .find_map(|instruction| match instruction {
                Instruction::Phi {
                    result, incoming, ..
                } if *result == phi => Some(incoming),
                _ => None,
            })
            .expect("The provided value is not the result of a phi node");
        incoming.push((from, value));
    }

    /// Emits a select of `if_true` or `if_false` depending on the 1-bit
    /// `cond`, returning the handle of its result.
    pub fn select(&mut self, cond: ValueId, if_true: ValueId, if_false: ValueId) -> ValueId {
        let ty = self.values[if_true.index()].ty();
        let result = self.new_result(ty);
        self.emit(Instruction::Select {
            result,
            cond,
            if_true,
            if_false,
        });
        result
    }

    /// Emits an unconditional branch to `target`.
    pub fn branch(&mut self, target: BlockId) {
        self.emit(Instruction::Branch { target });
    }

    /// Emits a conditional branch on the 1-bit `cond`.
    pub fn cond_branch(&mut self, cond: ValueId, if_true: BlockId, if_false: BlockId) {
        self.emit(Instruction::CondBranch {
            cond,
            if_true,
            if_false,
        });
    }

    /// Emits a call to the function named `callee`.
    ///
    /// When `result_ty` is provided the call defines a value of that type
    /// and its handle is returned; `None` declares a call to a `void`
    /// function.
    pub fn call(
        &mut self,
        callee: impl Into<String>,
        args: &[ValueId],
        result_ty: Option<Type>,
    ) -> Option<ValueId> {
        let result = result_ty.map(|ty| self.new_result(ty));
        self.emit(Instruction::Call {
            result,
            callee: callee.into(),
            args:   args.to_vec(),
        });
        result
    }

    /// Emits a return, optionally carrying `value`.
    pub fn ret(&mut self, value: Option<ValueId>) {
        self.emit(Instruction::Return { value });
    }

    /// Finishes construction and yields the function.
    ///
    /// # Panics
    ///
    /// Panics if the function has no blocks, or if any block does not end in
    /// a terminator. Both make the function unexecutable, and catching them
    /// here localises the mistake to the construction site.
    #[must_use]
    pub fn build(self) -> Function {
        assert!(
            !self.blocks.is_empty(),
            "A function must have an entry block"
        );
        for block in &self.blocks {
            let terminated = block
                .instructions()
                .last()
                .is_some_and(Instruction::is_terminator);
            assert!(
                terminated,
                "Block {:?} does not end in a terminator",
                block.name()
            );
        }

        Function::from_parts(self.name, self.params, self.values, self.blocks)
    }

    /// Appends `instruction` to the current block.
    ///
    /// # Panics
    ///
    /// Panics if no block has been created yet.
    fn emit(&mut self, instruction: Instruction) {
        let current = self
            .current
            .expect("An instruction was emitted before any block was created");
        self.blocks[current.index()].push(instruction);
    }

    /// Creates a fresh value-table entry for an instruction result.
    fn new_result(&mut self, ty: Type) -> ValueId {
        let name = format!("v{}", self.values.len());
        self.new_value(ValueData::Inst { name, ty })
    }

    fn new_value(&mut self, data: ValueData) -> ValueId {
        let id = Function::new_value_id(self.values.len());
        self.values.push(data);
        id
    }
}

#[cfg(test)]
mod test {
    use crate::ir::{
        builder::FunctionBuilder,
        BinaryOp,
        Instruction,
        Predicate,
        Type,
    };

    #[test]
    fn builds_a_straight_line_function() {
        let mut builder = FunctionBuilder::new("f");
        let x = builder.param("x", Type::Int { bits: 32 });
        builder.block("entry");
        let one = builder.iconst(32, 1);
        let sum = builder.binary(BinaryOp::Add, x, one);
        let ne = builder.icmp(Predicate::Ne, sum, x);
        builder.call("decaf_assert", &[ne], None);
        builder.ret(None);

        let function = builder.build();
        assert_eq!(function.name(), "f");
        assert_eq!(function.params(), &[x]);
        assert_eq!(function.block(function.entry()).instructions().len(), 4);
        assert_eq!(function.value(sum).ty(), Type::Int { bits: 32 });
        assert_eq!(function.value(ne).ty(), Type::bool());
    }

    #[test]
    fn builds_a_diamond() {
        let mut builder = FunctionBuilder::new("g");
        let x = builder.param("x", Type::Int { bits: 8 });
        let entry = builder.block("entry");
        let then = builder.block("then");
        let done = builder.block("done");

        builder.switch_to_block(entry);
        let zero = builder.iconst(8, 0);
        let cond = builder.icmp(Predicate::Sgt, x, zero);
        builder.cond_branch(cond, then, done);

        builder.switch_to_block(then);
        builder.branch(done);

        builder.switch_to_block(done);
        builder.ret(None);

        let function = builder.build();
        assert_eq!(function.blocks().len(), 3);
        assert!(matches!(
            function.instruction(entry, 2),
            Some(Instruction::CondBranch { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "does not end in a terminator")]
    fn rejects_unterminated_blocks() {
        let mut builder = FunctionBuilder::new("h");
        builder.block("entry");
        builder.iconst(32, 0);
        let _ = builder.build();
    }
}
