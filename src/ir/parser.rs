//! This module contains the parser for the textual form of the IR.
//!
//! The textual form is line-oriented and deliberately small:
//!
//! ```text
//! fn @f(i32 %x) {
//! entry:
//!   %is_small = icmp slt %x, i32 10    ; literals are typed inline
//!   br %is_small, label %small, label %done
//! small:
//!   call @decaf_assert(%is_small)
//!   br label %done
//! done:
//!   ret
//! }
//! ```
//!
//! Block labels stand on their own line and the first label of a function
//! opens its entry block. Values are written `%name`, blocks are referenced
//! as `label %name`, and comments run from `;` to the end of the line.
//!
//! The parser is a front-end collaborator of the executor: nothing in the
//! execution core depends on it, and [`crate::vm::execute_symbolic`] accepts
//! functions from any source.

use std::collections::HashMap;

use crate::{
    error::parse::{Error, Result},
    ir::{
        BinaryOp,
        Block,
        BlockId,
        Constant,
        Function,
        Instruction,
        Module,
        Predicate,
        Type,
        ValueData,
        ValueId,
    },
};

/// Parses the textual IR in `input` into a [`Module`].
///
/// # Errors
///
/// Returns [`Err`] if `input` is not syntactically valid, references values
/// or blocks that are never defined, or leaves a block without a terminator.
pub fn parse_module(input: &str) -> Result<Module> {
    let mut parser = Parser::new(input);
    parser.parse_module()
}

/// A character-level recursive-descent parser over the textual IR.
struct Parser {
    chars:  Vec<char>,
    offset: usize,
}

/// The per-function state accumulated while parsing a single `fn` body.
struct FunctionState {
    name:      String,
    params:    Vec<ValueId>,
    values:    Vec<ValueData>,
    value_map: HashMap<String, ValueId>,
    pending:   HashMap<String, ValueId>,
    blocks:    Vec<Block>,
    block_map: HashMap<String, BlockId>,
}

impl FunctionState {
    fn new(name: String) -> Self {
        Self {
            name,
            params: Vec::new(),
            values: Vec::new(),
            value_map: HashMap::new(),
            pending: HashMap::new(),
            blocks: Vec::new(),
            block_map: HashMap::new(),
        }
    }

    /// Resolves `%name` as an operand, creating a placeholder entry for
    /// names that have not been defined yet. Placeholders that are never
    /// defined are reported when the function ends.
    fn operand(&mut self, name: &str) -> ValueId {
        if let Some(id) = self.value_map.get(name) {
            return *id;
        }
        let id = Function::new_value_id(self.values.len());
        self.values.push(ValueData::Inst {
            name: name.to_owned(),
            ty:   Type::Void,
        });
        self.value_map.insert(name.to_owned(), id);
        self.pending.insert(name.to_owned(), id);
        id
    }

    /// Interns a constant operand.
    fn constant(&mut self, constant: Constant) -> ValueId {
        let id = Function::new_value_id(self.values.len());
        self.values.push(ValueData::Const(constant));
        id
    }

    /// Defines `%name` as the result of an instruction, resolving any
    /// placeholder created by earlier forward references.
    fn define(&mut self, name: &str, ty: Type) -> Option<ValueId> {
        if let Some(id) = self.pending.remove(name) {
            self.values[id.index()] = ValueData::Inst {
                name: name.to_owned(),
                ty,
            };
            return Some(id);
        }
        if self.value_map.contains_key(name) {
            return None;
        }
        let id = Function::new_value_id(self.values.len());
        self.values.push(ValueData::Inst {
            name: name.to_owned(),
            ty,
        });
        self.value_map.insert(name.to_owned(), id);
        Some(id)
    }

    /// Gets the type of the value `id` as currently known.
    fn ty(&self, id: ValueId) -> Type {
        self.values[id.index()].ty()
    }
}

impl Parser {
    fn new(input: &str) -> Self {
        let chars = input.chars().collect();
        let offset = 0;
        Self { chars, offset }
    }

    fn parse_module(&mut self) -> Result<Module> {
        let mut module = Module::new();
        loop {
            self.skip_trivia();
            if self.at_eof() {
                return Ok(module);
            }
            let function = self.parse_function()?;
            if module.function(function.name()).is_some() {
                return Err(self.error(format!(
                    "duplicate definition of function '@{}'",
                    function.name()
                )));
            }
            module.push(function);
        }
    }

    fn parse_function(&mut self) -> Result<Function> {
        self.expect_word("fn")?;
        self.skip_trivia();
        self.expect_char('@')?;
        let name = self.parse_identifier()?;
        let mut state = FunctionState::new(name);

        self.skip_trivia();
        self.expect_char('(')?;
        self.parse_params(&mut state)?;
        self.skip_trivia();
        self.expect_char('{')?;

        self.register_labels(&mut state)?;
        self.parse_body(&mut state)?;
        self.finish_function(state)
    }

    fn parse_params(&mut self, state: &mut FunctionState) -> Result<()> {
        self.skip_trivia();
        if self.try_char(')') {
            return Ok(());
        }
        loop {
            let ty = self.parse_type()?;
            self.skip_trivia();
            self.expect_char('%')?;
            let name = self.parse_identifier()?;
            if state.value_map.contains_key(&name) {
                return Err(self.error(format!("duplicate parameter '%{name}'")));
            }
            let id = Function::new_value_id(state.values.len());
            state.values.push(ValueData::Param {
                name: name.clone(),
                ty,
            });
            state.value_map.insert(name, id);
            state.params.push(id);

            self.skip_trivia();
            if self.try_char(')') {
                return Ok(());
            }
            self.expect_char(',')?;
            self.skip_trivia();
        }
    }

    /// Scans ahead to the closing brace of the function body and registers a
    /// block for every label, in textual order.
    ///
    /// Labels stand on their own line, so this pass only needs to look at
    /// line shapes. Registering every block up front means branch targets
    /// and phi predecessors can be resolved in a single parsing pass even
    /// when they refer to blocks that are defined further down.
    fn register_labels(&mut self, state: &mut FunctionState) -> Result<()> {
        let mut lookahead = self.offset;
        let mut line_start = true;
        while lookahead < self.chars.len() && self.chars[lookahead] != '}' {
            if line_start {
                let mut i = lookahead;
                while i < self.chars.len() && (self.chars[i] == ' ' || self.chars[i] == '\t') {
                    i += 1;
                }
                let ident_start = i;
                while i < self.chars.len() && is_identifier_char(self.chars[i]) {
                    i += 1;
                }
                if i > ident_start && i < self.chars.len() && self.chars[i] == ':' {
                    let label: String = self.chars[ident_start..i].iter().collect();
                    if state.block_map.contains_key(&label) {
                        return Err(self.error(format!("duplicate block label '{label}'")));
                    }
                    let id = Function::new_block_id(state.blocks.len());
                    state.blocks.push(Block::new(label.clone()));
                    state.block_map.insert(label, id);
                }
            }
            line_start = self.chars[lookahead] == '\n';
            lookahead += 1;
        }
        Ok(())
    }

    fn parse_body(&mut self, state: &mut FunctionState) -> Result<()> {
        let mut current: Option<BlockId> = None;
        loop {
            self.skip_trivia();
            if self.try_char('}') {
                return Ok(());
            }
            if self.at_eof() {
                return Err(self.error("unterminated function body".to_owned()));
            }

            if let Some(label) = self.try_label() {
                // Labels were all registered up front, so this lookup cannot
                // fail.
                current = Some(state.block_map[&label]);
                continue;
            }

            let Some(block) = current else {
                return Err(self.error("expected a block label before the first instruction".to_owned()));
            };
            let instruction = self.parse_instruction(state)?;
            state.blocks[block.index()].push(instruction);
        }
    }

    /// Consumes `ident ":"` if the upcoming input is a label, returning the
    /// label's name.
    fn try_label(&mut self) -> Option<String> {
        let start = self.offset;
        let mut i = self.offset;
        while i < self.chars.len() && is_identifier_char(self.chars[i]) {
            i += 1;
        }
        if i > start && i < self.chars.len() && self.chars[i] == ':' {
            let label: String = self.chars[start..i].iter().collect();
            self.offset = i + 1;
            return Some(label);
        }
        None
    }

    fn parse_instruction(&mut self, state: &mut FunctionState) -> Result<Instruction> {
        if self.try_char('%') {
            let result = self.parse_identifier()?;
            self.skip_trivia();
            self.expect_char('=')?;
            self.skip_trivia();
            let opcode = self.parse_identifier()?;
            return self.parse_defining_instruction(state, &result, &opcode);
        }

        let opcode = self.parse_identifier()?;
        match opcode.as_str() {
            "br" => self.parse_branch(state),
            "ret" => self.parse_return(state),
            "call" => self.parse_call(state, None),
            other => Err(self.error(format!("unknown instruction '{other}'"))),
        }
    }

    fn parse_defining_instruction(
        &mut self,
        state: &mut FunctionState,
        result: &str,
        opcode: &str,
    ) -> Result<Instruction> {
        match opcode {
            "add" | "sub" | "mul" | "udiv" | "sdiv" | "urem" | "srem" => {
                let op = match opcode {
                    "add" => BinaryOp::Add,
                    "sub" => BinaryOp::Sub,
                    "mul" => BinaryOp::Mul,
                    "udiv" => BinaryOp::UDiv,
                    "sdiv" => BinaryOp::SDiv,
                    "urem" => BinaryOp::URem,
                    _ => BinaryOp::SRem,
                };
                let lhs = self.parse_operand(state)?;
                self.skip_trivia();
                self.expect_char(',')?;
                let rhs = self.parse_operand(state)?;
                let ty = state.ty(lhs);
                let result = self.define_result(state, result, ty)?;
                Ok(Instruction::Binary {
                    op,
                    result,
                    lhs,
                    rhs,
                })
            }
            "icmp" => {
                self.skip_trivia();
                let pred = self.parse_predicate()?;
                let lhs = self.parse_operand(state)?;
                self.skip_trivia();
                self.expect_char(',')?;
                let rhs = self.parse_operand(state)?;
                let result = self.define_result(state, result, Type::bool())?;
                Ok(Instruction::ICmp {
                    pred,
                    result,
                    lhs,
                    rhs,
                })
            }
            "phi" => {
                let mut incoming = Vec::new();
                loop {
                    self.skip_trivia();
                    self.expect_char('[')?;
                    let value = self.parse_operand(state)?;
                    self.skip_trivia();
                    self.expect_char(',')?;
                    self.skip_trivia();
                    let label = self.parse_identifier()?;
                    let block = self.lookup_block(state, &label)?;
                    self.skip_trivia();
                    self.expect_char(']')?;
                    incoming.push((block, value));

                    self.skip_trivia();
                    if !self.try_char(',') {
                        break;
                    }
                }
                let ty = incoming
                    .first()
                    .map_or(Type::Void, |(_, value)| state.ty(*value));
                let result = self.define_result(state, result, ty)?;
                Ok(Instruction::Phi { result, incoming })
            }
            "select" => {
                let cond = self.parse_operand(state)?;
                self.skip_trivia();
                self.expect_char(',')?;
                let if_true = self.parse_operand(state)?;
                self.skip_trivia();
                self.expect_char(',')?;
                let if_false = self.parse_operand(state)?;
                let ty = state.ty(if_true);
                let result = self.define_result(state, result, ty)?;
                Ok(Instruction::Select {
                    result,
                    cond,
                    if_true,
                    if_false,
                })
            }
            "call" => {
                self.skip_trivia();
                let ty = self.parse_type()?;
                self.parse_call(state, Some((result.to_owned(), ty)))
            }
            other => Err(self.error(format!("unknown instruction '{other}'"))),
        }
    }

    fn parse_branch(&mut self, state: &mut FunctionState) -> Result<Instruction> {
        self.skip_trivia();
        if self.try_word("label") {
            let target = self.parse_block_ref(state)?;
            return Ok(Instruction::Branch { target });
        }

        let cond = self.parse_operand(state)?;
        self.skip_trivia();
        self.expect_char(',')?;
        self.skip_trivia();
        self.expect_word("label")?;
        let if_true = self.parse_block_ref(state)?;
        self.skip_trivia();
        self.expect_char(',')?;
        self.skip_trivia();
        self.expect_word("label")?;
        let if_false = self.parse_block_ref(state)?;
        Ok(Instruction::CondBranch {
            cond,
            if_true,
            if_false,
        })
    }

    fn parse_return(&mut self, state: &mut FunctionState) -> Result<Instruction> {
        // The operand of `ret` must be on the same line, which keeps a bare
        // `ret` unambiguous when the next line opens with a value
        // definition.
        self.skip_spaces();
        if self.at_eof() || matches!(self.peek(), Some('\n' | ';' | '}')) {
            return Ok(Instruction::Return { value: None });
        }
        let value = self.parse_operand(state)?;
        Ok(Instruction::Return { value: Some(value) })
    }

    fn parse_call(
        &mut self,
        state: &mut FunctionState,
        result: Option<(String, Type)>,
    ) -> Result<Instruction> {
        self.skip_trivia();
        self.expect_char('@')?;
        let callee = self.parse_identifier()?;
        self.skip_trivia();
        self.expect_char('(')?;

        let mut args = Vec::new();
        self.skip_trivia();
        if !self.try_char(')') {
            loop {
                let arg = self.parse_operand(state)?;
                args.push(arg);
                self.skip_trivia();
                if self.try_char(')') {
                    break;
                }
                self.expect_char(',')?;
            }
        }

        let result = match result {
            Some((name, ty)) => Some(self.define_result(state, &name, ty)?),
            None => None,
        };
        Ok(Instruction::Call {
            result,
            callee,
            args,
        })
    }

    fn parse_operand(&mut self, state: &mut FunctionState) -> Result<ValueId> {
        self.skip_trivia();
        if self.try_char('%') {
            let name = self.parse_identifier()?;
            return Ok(state.operand(&name));
        }

        let ty = self.parse_type()?;
        let Type::Int { bits } = ty else {
            return Err(self.error(format!("literals of type {ty} are not supported")));
        };
        self.skip_trivia();
        let value = self.parse_integer()?;
        Ok(state.constant(Constant::int(bits, value)))
    }

    fn parse_block_ref(&mut self, state: &mut FunctionState) -> Result<BlockId> {
        self.skip_trivia();
        self.expect_char('%')?;
        let label = self.parse_identifier()?;
        self.lookup_block(state, &label)
    }

    fn lookup_block(&self, state: &FunctionState, label: &str) -> Result<BlockId> {
        state
            .block_map
            .get(label)
            .copied()
            .ok_or_else(|| self.error(format!("unknown block label '{label}'")))
    }

    fn define_result(
        &self,
        state: &mut FunctionState,
        name: &str,
        ty: Type,
    ) -> Result<ValueId> {
        state
            .define(name, ty)
            .ok_or_else(|| self.error(format!("redefinition of value '%{name}'")))
    }

    fn parse_predicate(&mut self) -> Result<Predicate> {
        let word = self.parse_identifier()?;
        let pred = match word.as_str() {
            "eq" => Predicate::Eq,
            "ne" => Predicate::Ne,
            "ult" => Predicate::Ult,
            "ule" => Predicate::Ule,
            "ugt" => Predicate::Ugt,
            "uge" => Predicate::Uge,
            "slt" => Predicate::Slt,
            "sle" => Predicate::Sle,
            "sgt" => Predicate::Sgt,
            "sge" => Predicate::Sge,
            other => return Err(self.error(format!("unknown comparison predicate '{other}'"))),
        };
        Ok(pred)
    }

    fn parse_type(&mut self) -> Result<Type> {
        self.skip_trivia();
        let word = self.parse_identifier()?;
        match word.as_str() {
            "void" => Ok(Type::Void),
            "ptr" => Ok(Type::Pointer),
            "float" => Ok(Type::Float),
            other => {
                let bits = other
                    .strip_prefix('i')
                    .and_then(|digits| digits.parse::<u32>().ok())
                    .filter(|bits| (1..=64).contains(bits));
                match bits {
                    Some(bits) => Ok(Type::Int { bits }),
                    None => Err(self.error(format!("unknown type '{other}'"))),
                }
            }
        }
    }

    /// Parses a decimal integer, returning its two's-complement bit pattern.
    fn parse_integer(&mut self) -> Result<u64> {
        let negative = self.try_char('-');
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.offset += 1;
        }
        if self.offset == start {
            return Err(self.error("expected an integer literal".to_owned()));
        }
        let digits: String = self.chars[start..self.offset].iter().collect();
        if negative {
            let value = digits
                .parse::<i64>()
                .map_err(|_| self.error(format!("integer literal -{digits} is out of range")))?;
            Ok((-value) as u64)
        } else {
            digits
                .parse::<u64>()
                .map_err(|_| self.error(format!("integer literal {digits} is out of range")))
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        let start = self.offset;
        while matches!(self.peek(), Some(c) if is_identifier_char(c)) {
            self.offset += 1;
        }
        if self.offset == start {
            return Err(self.error("expected an identifier".to_owned()));
        }
        Ok(self.chars[start..self.offset].iter().collect())
    }

    fn finish_function(&self, state: FunctionState) -> Result<Function> {
        if state.blocks.is_empty() {
            return Err(self.error(format!("function '@{}' has no blocks", state.name)));
        }
        if let Some(name) = state.pending.keys().next() {
            return Err(self.error(format!(
                "value '%{name}' is used in '@{}' but never defined",
                state.name
            )));
        }
        for block in &state.blocks {
            let terminated = block
                .instructions()
                .last()
                .is_some_and(Instruction::is_terminator);
            if !terminated {
                return Err(self.error(format!(
                    "block '{}' in '@{}' does not end in a terminator",
                    block.name(),
                    state.name
                )));
            }
        }

        Ok(Function::from_parts(
            state.name,
            state.params,
            state.values,
            state.blocks,
        ))
    }

    // Low-level cursor handling.

    fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn at_eof(&self) -> bool {
        self.offset >= self.chars.len()
    }

    fn try_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.offset += 1;
            return true;
        }
        false
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        self.skip_trivia();
        if self.try_char(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    /// Consumes `word` if it appears next and is not a prefix of a longer
    /// identifier.
    fn try_word(&mut self, word: &str) -> bool {
        let end = self.offset + word.len();
        if end > self.chars.len() {
            return false;
        }
        let upcoming: String = self.chars[self.offset..end].iter().collect();
        let followed_by_ident = self
            .chars
            .get(end)
            .copied()
            .is_some_and(is_identifier_char);
        if upcoming == word && !followed_by_ident {
            self.offset = end;
            return true;
        }
        false
    }

    fn expect_word(&mut self, word: &str) -> Result<()> {
        self.skip_trivia();
        if self.try_word(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{word}'")))
        }
    }

    /// Skips whitespace of all kinds and `;` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.offset += 1,
                Some(';') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.offset += 1;
                    }
                }
                _ => return,
            }
        }
    }

    /// Skips spaces and tabs, stopping at newlines.
    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.offset += 1;
        }
    }

    /// Builds a parse error at the current cursor position.
    fn error(&self, message: String) -> Error {
        let mut line = 1;
        let mut column = 1;
        for c in self.chars.iter().take(self.offset) {
            if *c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Error {
            line,
            column,
            message,
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}
