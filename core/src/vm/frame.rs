//! Activation records of the interpreter and the view native functions get
//! of them.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::rc::Rc;

use ecow::EcoString;

use super::code::{CodeIdentity, CodeObject};
use super::error::{ExecutionError, InternalError, RuntimeError, TraceEntry};
use super::instruction_set::{DecodeError, Instruction, Opcode};
use super::stack::Stack;
use crate::resolver::{self, ActiveInvocation, ResolveError};
use crate::scope::{BindingContext, Scope};
use crate::values::{Cell, Function, Value, new_cell};

static NEXT_INVOCATION: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one function activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationId(u64);

impl InvocationId {
    pub fn next() -> Self {
        InvocationId(NEXT_INVOCATION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One active invocation of a bytecode function.
pub struct Frame {
    function: Rc<Function>,
    locals: Vec<Option<Value>>,
    /// Own cell variables followed by the function's closure cells.
    cells: Vec<Cell>,
    pub(super) stack: Stack<Value>,
    /// Offset of the next instruction.
    pub(super) ip: usize,
    /// Offset of the instruction being executed.
    last_offset: usize,
    id: InvocationId,
}

impl Frame {
    /// Bind `args` (plus defaults for missing trailing parameters) and set up
    /// the frame's cells.
    pub fn new(function: Rc<Function>, args: &[Value]) -> Result<Self, RuntimeError> {
        let code = &function.code;
        let arg_count = usize::from(code.arg_count);
        let required = arg_count.saturating_sub(function.defaults.len());
        if args.len() < required || args.len() > arg_count {
            let expected = if required == arg_count {
                arg_count.to_string()
            } else {
                format!("{} to {}", required, arg_count)
            };
            return Err(RuntimeError::Arity {
                function: function.name.clone(),
                expected,
                given: args.len(),
            });
        }

        let mut locals = vec![None; code.var_names.len().max(arg_count)];
        let missing = arg_count - args.len();
        let defaults = &function.defaults[function.defaults.len() - missing..];
        for (slot, value) in locals.iter_mut().zip(args.iter().chain(defaults)) {
            *slot = Some(value.clone());
        }

        // A parameter captured by an inner closure starts out in its cell.
        let mut cells: Vec<Cell> = code
            .cell_vars
            .iter()
            .map(|name| {
                let initial = code
                    .var_names
                    .iter()
                    .take(arg_count)
                    .position(|param| param == name)
                    .and_then(|slot| locals[slot].clone());
                new_cell(initial)
            })
            .collect();
        cells.extend(function.closure.iter().cloned());

        let stack = Stack::new(code.max_stack_size);
        Ok(Self {
            function,
            locals,
            cells,
            stack,
            ip: 0,
            last_offset: 0,
            id: InvocationId::next(),
        })
    }

    pub fn id(&self) -> InvocationId {
        self.id
    }

    pub fn function(&self) -> &Rc<Function> {
        &self.function
    }

    pub fn code(&self) -> &CodeObject {
        &self.function.code
    }

    pub fn identity(&self) -> CodeIdentity {
        self.function.code.identity()
    }

    /// Source line of the instruction being executed.
    pub fn current_line(&self) -> u32 {
        self.function.code.line_for_offset(self.last_offset)
    }

    pub fn last_offset(&self) -> usize {
        self.last_offset
    }

    /// Locals and globals of this invocation.
    pub fn binding_context(&self) -> BindingContext<'_> {
        BindingContext::new(self, &self.function.globals)
    }

    pub fn trace_entry(&self) -> TraceEntry {
        TraceEntry {
            function: self.function.name.clone(),
            filename: self.function.code.filename.clone(),
            line: self.current_line(),
        }
    }

    /// Fetch the next instruction, folding any `ExtendedArg` prefixes into
    /// its operand.
    pub(super) fn fetch(&mut self) -> Result<(Instruction, u32), DecodeError> {
        let bytecode = &self.function.code.bytecode;
        let mut extended_arg: u64 = 0;
        loop {
            let offset = self.ip;
            let instr = Instruction::decode(bytecode, offset)?;
            self.ip += instr.size();
            let arg = extended_arg | u64::from(instr.arg);
            if instr.op == Opcode::ExtendedArg {
                extended_arg = arg << 16;
                continue;
            }
            self.last_offset = offset;
            let arg = u32::try_from(arg).map_err(|_| DecodeError::OperandOverflow { offset })?;
            return Ok((instr, arg));
        }
    }

    pub(super) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(super) fn pop(&mut self) -> Result<Value, InternalError> {
        self.stack.pop().ok_or(InternalError::StackUnderflow {
            offset: self.last_offset,
        })
    }

    pub(super) fn pop_n<C: FromIterator<Value>>(&mut self, n: usize) -> Result<C, InternalError> {
        self.stack.pop_n(n).ok_or(InternalError::StackUnderflow {
            offset: self.last_offset,
        })
    }

    pub(super) fn peek(&self) -> Result<&Value, InternalError> {
        self.stack.peek().ok_or(InternalError::StackUnderflow {
            offset: self.last_offset,
        })
    }

    pub(super) fn bad_operand(&self, op: Opcode, operand: u32) -> InternalError {
        InternalError::BadOperand {
            op: opcode_name(op),
            operand,
            offset: self.last_offset,
        }
    }

    pub(super) fn load_fast(&self, slot: u32) -> Result<Value, ExecutionError> {
        let index = slot as usize;
        match self.locals.get(index) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(RuntimeError::UnboundLocal {
                name: self.local_name(index),
            }
            .into()),
            None => Err(self.bad_operand(Opcode::LoadFast, slot).into()),
        }
    }

    pub(super) fn store_fast(&mut self, slot: u32, value: Value) -> Result<(), InternalError> {
        match self.locals.get_mut(slot as usize) {
            Some(local) => {
                *local = Some(value);
                Ok(())
            }
            None => Err(self.bad_operand(Opcode::StoreFast, slot)),
        }
    }

    pub(super) fn cell(&self, op: Opcode, index: u32) -> Result<&Cell, InternalError> {
        self.cells
            .get(index as usize)
            .ok_or_else(|| self.bad_operand(op, index))
    }

    pub(super) fn cell_name(&self, index: u32) -> EcoString {
        self.function
            .code
            .cell_name(index as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn local_name(&self, index: usize) -> EcoString {
        self.function
            .code
            .var_names
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

impl Scope for Frame {
    fn lookup(&self, name: &str) -> Option<Value> {
        let code = &self.function.code;
        if let Some(slot) = code.var_names.iter().position(|n| n == name) {
            if let Some(value) = self.locals.get(slot).and_then(Option::as_ref) {
                return Some(value.clone());
            }
        }
        let index = code.cell_index(name)?;
        self.cells.get(index)?.borrow().clone()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("function", &self.function.name)
            .field("line", &self.current_line())
            .field("stack", &self.stack.len())
            .finish()
    }
}

fn opcode_name(op: Opcode) -> &'static str {
    match op {
        Opcode::LoadConst => "LoadConst",
        Opcode::LoadFast => "LoadFast",
        Opcode::StoreFast => "StoreFast",
        Opcode::LoadGlobal => "LoadGlobal",
        Opcode::StoreGlobal => "StoreGlobal",
        Opcode::CompareOp => "CompareOp",
        Opcode::LoadClosure => "LoadClosure",
        Opcode::LoadDeref => "LoadDeref",
        Opcode::StoreDeref => "StoreDeref",
        _ => "instruction",
    }
}

/// Read access to the interpreter's active frames, innermost last, handed
/// to native functions.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    frames: &'a [Frame],
}

impl<'a> CallContext<'a> {
    pub fn new(frames: &'a [Frame]) -> Self {
        Self { frames }
    }

    /// A context with no script frames, for calling natives from host code.
    pub fn detached() -> CallContext<'static> {
        CallContext { frames: &[] }
    }

    pub fn frames(&self) -> &'a [Frame] {
        self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the given invocation is still on the stack.
    pub fn is_active(&self, id: InvocationId) -> bool {
        self.frames.iter().any(|frame| frame.id == id)
    }

    /// Binding context of the script frame `skip` levels below the
    /// innermost one.
    pub fn caller_context(&self, skip: usize) -> Result<BindingContext<'a>, ResolveError> {
        resolver::resolve_caller_context(self, skip)
    }

    /// Innermost active invocation of the code identified by `identity`.
    pub fn originating_invocation(
        &self,
        identity: &CodeIdentity,
    ) -> Result<ActiveInvocation<'a>, ResolveError> {
        resolver::locate_originating_invocation(self, identity)
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.frames.iter()).finish()
    }
}
