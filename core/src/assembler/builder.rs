//! Builder for emitting bytecode.
//!
//! `CodeBuilder` encodes instructions into raw bytes, adds `ExtendedArg`
//! prefixes for wide operands, patches forward jumps, tracks the operand
//! stack depth and records source lines for the debug line table.

use std::rc::Rc;

use ecow::EcoString;

use super::error::AssembleError;
use crate::values::Value;
use crate::vm::{CodeObject, ComparisonOp, Instruction, JumpKind, LineRun, LineTable, Opcode};

/// A forward jump waiting for its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct JumpLabel(usize);

/// Builder for one code object.
///
/// Errors are deferred: the first failure is remembered and returned by
/// [`build`](Self::build), so emission calls can be chained freely.
///
/// # Usage
///
/// ```ignore
/// let mut b = CodeBuilder::new("greet", "app.py", 1);
/// b.param("name");
/// b.set_line(2);
/// b.load_const("hello");
/// b.load_local("name");
/// b.print_item();
/// b.print_item();
/// b.print_newline();
/// b.load_const(Value::None);
/// b.return_value();
/// let code = b.build()?;
/// ```
#[derive(Debug)]
pub struct CodeBuilder {
    name: EcoString,
    filename: EcoString,
    first_line: u32,
    arg_count: u16,
    var_names: Vec<EcoString>,
    names: Vec<EcoString>,
    cell_vars: Vec<EcoString>,
    free_vars: Vec<EcoString>,
    constants: Vec<Value>,
    bytecode: Vec<u8>,

    /// `(offset, line)` at every line change.
    line_marks: Vec<(usize, u32)>,
    current_line: u32,

    current_stack_depth: i64,
    max_stack_depth: i64,

    error: Option<AssembleError>,
}

impl CodeBuilder {
    pub fn new(name: impl Into<EcoString>, filename: impl Into<EcoString>, first_line: u32) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            first_line,
            arg_count: 0,
            var_names: Vec::new(),
            names: Vec::new(),
            cell_vars: Vec::new(),
            free_vars: Vec::new(),
            constants: Vec::new(),
            bytecode: Vec::new(),
            line_marks: Vec::new(),
            current_line: first_line,
            current_stack_depth: 0,
            max_stack_depth: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: AssembleError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    // === Declarations ===

    /// Declare the next positional parameter. Parameters must be declared
    /// before any other local.
    pub fn param(&mut self, name: impl Into<EcoString>) -> &mut Self {
        let name = name.into();
        if self.var_names.len() != usize::from(self.arg_count) {
            self.fail(AssembleError::LateParameter { name });
            return self;
        }
        match self.arg_count.checked_add(1) {
            Some(count) => {
                self.arg_count = count;
                self.var_names.push(name);
            }
            None => self.fail(AssembleError::TooManyLocals),
        }
        self
    }

    /// Declare a variable captured by nested closures.
    pub fn cell_var(&mut self, name: impl Into<EcoString>) -> &mut Self {
        self.cell_vars.push(name.into());
        self
    }

    /// Declare a variable captured from the enclosing function.
    pub fn free_var(&mut self, name: impl Into<EcoString>) -> &mut Self {
        self.free_vars.push(name.into());
        self
    }

    /// Set the source line of subsequently emitted instructions.
    pub fn set_line(&mut self, line: u32) -> &mut Self {
        self.current_line = line;
        self
    }

    // === Stack Management ===

    fn adjust_stack(&mut self, effect: i64) {
        self.current_stack_depth += effect;
        if self.current_stack_depth < 0 {
            let offset = self.bytecode.len();
            self.fail(AssembleError::StackUnderflow { offset });
            self.current_stack_depth = 0;
        }
        self.max_stack_depth = self.max_stack_depth.max(self.current_stack_depth);
    }

    // === Instruction Emission ===

    fn start_instruction(&mut self) {
        let offset = self.bytecode.len();
        match self.line_marks.last() {
            Some(&(_, line)) if line == self.current_line => {}
            _ => self.line_marks.push((offset, self.current_line)),
        }
    }

    /// Emit an instruction without operand.
    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        self.emit_arg(op, 0)
    }

    /// Emit an instruction, preceded by `ExtendedArg` prefixes when the
    /// operand does not fit in 16 bits.
    pub fn emit_arg(&mut self, op: Opcode, arg: u32) -> &mut Self {
        self.start_instruction();
        if op.has_arg() {
            let mut shift = 16;
            while shift < 32 && arg >> shift != 0 {
                shift += 16;
            }
            while shift > 16 {
                shift -= 16;
                let high = (arg >> shift) as u16;
                Instruction::new(Opcode::ExtendedArg, high).encode(&mut self.bytecode);
            }
            Instruction::new(op, arg as u16).encode(&mut self.bytecode);
        } else {
            Instruction::simple(op).encode(&mut self.bytecode);
        }
        self.adjust_stack(op.stack_effect(arg));
        self
    }

    /// Returns the current bytecode offset, for use as a backward jump
    /// target.
    pub fn current_offset(&self) -> usize {
        self.bytecode.len()
    }

    /// Emit a forward jump whose target is fixed by [`patch_jump`](Self::patch_jump).
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        self.start_instruction();
        let label = JumpLabel(self.bytecode.len());
        Instruction::new(op, 0).encode(&mut self.bytecode);
        self.adjust_stack(op.stack_effect(0));
        label
    }

    /// Point a forward jump at the current offset.
    pub fn patch_jump(&mut self, label: JumpLabel) -> &mut Self {
        let target = self.bytecode.len();
        let Ok(op) = Opcode::try_from(self.bytecode[label.0]) else {
            return self;
        };
        let operand = match op.jump_kind() {
            Some(JumpKind::Relative) => target - (label.0 + op.size()),
            _ => target,
        };
        match u16::try_from(operand) {
            Ok(operand) => {
                self.bytecode[label.0 + 1..label.0 + 3].copy_from_slice(&operand.to_le_bytes());
            }
            Err(_) => self.fail(AssembleError::JumpTooFar {
                from: label.0,
                to: target,
            }),
        }
        self
    }

    /// Emit a jump to a known target. Relative jumps only go forward.
    pub fn emit_jump_to(&mut self, op: Opcode, target: usize) -> &mut Self {
        let from = self.bytecode.len();
        let operand = match op.jump_kind() {
            Some(JumpKind::Relative) => target.checked_sub(from + op.size()),
            _ => Some(target),
        };
        match operand.and_then(|operand| u32::try_from(operand).ok()) {
            Some(operand) => self.emit_arg(op, operand),
            None => {
                self.fail(AssembleError::JumpTooFar { from, to: target });
                self
            }
        }
    }

    // === Operand Pools ===

    fn pool_index(len: usize, error: AssembleError) -> Result<u32, AssembleError> {
        u32::try_from(len).map_err(|_| error)
    }

    /// Push a constant, reusing an identical pool entry.
    pub fn load_const(&mut self, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let index = match self.constants.iter().position(|c| c.same_constant(&value)) {
            Some(index) => index,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        };
        match Self::pool_index(index, AssembleError::TooManyConstants) {
            Ok(index) => self.emit_arg(Opcode::LoadConst, index),
            Err(e) => {
                self.fail(e);
                self
            }
        }
    }

    fn name_index(&mut self, name: &str) -> Result<u32, AssembleError> {
        let index = match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.into());
                self.names.len() - 1
            }
        };
        Self::pool_index(index, AssembleError::TooManyNames)
    }

    fn local_slot(&self, name: &str) -> Option<usize> {
        self.var_names.iter().position(|n| n == name)
    }

    fn emit_indexed(&mut self, op: Opcode, index: Result<u32, AssembleError>) -> &mut Self {
        match index {
            Ok(index) => self.emit_arg(op, index),
            Err(e) => {
                self.fail(e);
                self
            }
        }
    }

    pub fn load_global(&mut self, name: &str) -> &mut Self {
        let index = self.name_index(name);
        self.emit_indexed(Opcode::LoadGlobal, index)
    }

    pub fn store_global(&mut self, name: &str) -> &mut Self {
        let index = self.name_index(name);
        self.emit_indexed(Opcode::StoreGlobal, index)
    }

    /// Load a declared local or parameter.
    pub fn load_local(&mut self, name: &str) -> &mut Self {
        let index = self
            .local_slot(name)
            .ok_or_else(|| AssembleError::UnknownLocal { name: name.into() })
            .and_then(|slot| Self::pool_index(slot, AssembleError::TooManyLocals));
        self.emit_indexed(Opcode::LoadFast, index)
    }

    /// Store into a local, declaring it on first use.
    pub fn store_local(&mut self, name: &str) -> &mut Self {
        let slot = match self.local_slot(name) {
            Some(slot) => slot,
            None => {
                self.var_names.push(name.into());
                self.var_names.len() - 1
            }
        };
        let index = Self::pool_index(slot, AssembleError::TooManyLocals);
        self.emit_indexed(Opcode::StoreFast, index)
    }

    fn cell_index(&self, name: &str) -> Result<u32, AssembleError> {
        self.cell_vars
            .iter()
            .chain(self.free_vars.iter())
            .position(|n| n == name)
            .ok_or_else(|| AssembleError::UnknownLocal { name: name.into() })
            .and_then(|index| Self::pool_index(index, AssembleError::TooManyLocals))
    }

    pub fn load_deref(&mut self, name: &str) -> &mut Self {
        let index = self.cell_index(name);
        self.emit_indexed(Opcode::LoadDeref, index)
    }

    pub fn store_deref(&mut self, name: &str) -> &mut Self {
        let index = self.cell_index(name);
        self.emit_indexed(Opcode::StoreDeref, index)
    }

    pub fn load_closure(&mut self, name: &str) -> &mut Self {
        let index = self.cell_index(name);
        self.emit_indexed(Opcode::LoadClosure, index)
    }

    // === Shorthands ===

    pub fn pop_top(&mut self) -> &mut Self {
        self.emit(Opcode::PopTop)
    }

    pub fn print_item(&mut self) -> &mut Self {
        self.emit(Opcode::PrintItem)
    }

    pub fn print_newline(&mut self) -> &mut Self {
        self.emit(Opcode::PrintNewline)
    }

    pub fn compare(&mut self, cmp: ComparisonOp) -> &mut Self {
        self.emit_arg(Opcode::CompareOp, cmp as u32)
    }

    /// Call the callee below `argc` arguments.
    pub fn call(&mut self, argc: u32) -> &mut Self {
        self.emit_arg(Opcode::CallFunction, argc)
    }

    pub fn return_value(&mut self) -> &mut Self {
        self.emit(Opcode::ReturnValue)
    }

    /// Create a function from `code`; its `defaults` values must already be
    /// on the stack.
    pub fn make_function(&mut self, code: CodeObject, defaults: u32) -> &mut Self {
        self.load_const(Value::Code(Rc::new(code)));
        self.emit_arg(Opcode::MakeFunction, defaults)
    }

    /// Create a closure from `code`, capturing this function's cells named
    /// by the inner code's free variables.
    pub fn make_closure(&mut self, code: CodeObject, defaults: u32) -> &mut Self {
        let free_vars = code.free_vars.clone();
        for name in &free_vars {
            self.load_closure(name);
        }
        match u32::try_from(free_vars.len()) {
            Ok(count) => {
                self.emit_arg(Opcode::BuildTuple, count);
            }
            Err(_) => self.fail(AssembleError::TooManyLocals),
        }
        self.load_const(Value::Code(Rc::new(code)));
        self.emit_arg(Opcode::MakeClosure, defaults)
    }

    // === Finalization ===

    fn line_table(&self) -> LineTable {
        let mut runs = Vec::with_capacity(self.line_marks.len());
        let mut previous_line = i64::from(self.first_line);
        for (i, &(start, line)) in self.line_marks.iter().enumerate() {
            let end = self
                .line_marks
                .get(i + 1)
                .map_or(self.bytecode.len(), |&(next, _)| next);
            let delta = i64::from(line) - previous_line;
            previous_line = i64::from(line);
            runs.push(LineRun::new((end - start) as u32, delta as i32));
        }
        LineTable::new(runs)
    }

    /// Finish the code object, or report the first error encountered.
    pub fn build(self) -> Result<CodeObject, AssembleError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let line_table = self.line_table();
        tracing::debug!(
            name = %self.name,
            bytes = self.bytecode.len(),
            constants = self.constants.len(),
            max_stack = self.max_stack_depth,
            "assembled code object"
        );
        Ok(CodeObject {
            name: self.name,
            filename: self.filename,
            first_line: self.first_line,
            arg_count: self.arg_count,
            var_names: self.var_names,
            names: self.names,
            cell_vars: self.cell_vars,
            free_vars: self.free_vars,
            constants: self.constants,
            bytecode: self.bytecode,
            line_table,
            max_stack_size: self.max_stack_depth.max(0) as usize,
        })
    }
}
