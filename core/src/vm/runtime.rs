use core::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use smallvec::SmallVec;

use super::error::{ExecutionError, InternalError, ResourceExceededError, RuntimeError};
use super::frame::{CallContext, Frame};
use super::instruction_set::{ComparisonOp, Opcode};
use super::ops;
use crate::values::{Cell, Function, Value};

/// A writer shared between the interpreter and host code.
pub type SharedWriter = Rc<RefCell<dyn Write>>;

/// Shared handle to the process's standard output.
pub fn stdout_writer() -> SharedWriter {
    Rc::new(RefCell::new(std::io::stdout()))
}

/// Call arguments; most calls pass only a few.
type Args = SmallVec<[Value; 4]>;

/// Runtime options for the interpreter.
#[derive(Clone)]
pub struct ExecutionOptions {
    /// Maximum number of nested script frames.
    pub max_depth: usize,
    /// Destination of print statements.
    pub stdout: SharedWriter,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            stdout: stdout_writer(),
        }
    }
}

/// Result of executing one instruction.
enum Step {
    Continue,
    Return(Value),
}

/// Stack-based bytecode interpreter.
///
/// The interpreter keeps every active invocation in `frames` (innermost
/// last). Native functions called from bytecode see these frames through a
/// [`CallContext`].
pub struct VM {
    frames: Vec<Frame>,
    options: ExecutionOptions,
    /// Python 2 print soft-space: a separator is owed before the next item.
    softspace: bool,
}

impl VM {
    pub fn new(options: ExecutionOptions) -> Self {
        VM {
            frames: Vec::new(),
            options,
            softspace: false,
        }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Call `function` with positional `args` and run it to completion.
    pub fn call(&mut self, function: &Rc<Function>, args: &[Value]) -> Result<Value, ExecutionError> {
        let base = self.frames.len();
        self.push_frame(function.clone(), args)?;
        let result = self.run(base);
        self.frames.truncate(base);
        result
    }

    fn push_frame(&mut self, function: Rc<Function>, args: &[Value]) -> Result<(), ExecutionError> {
        if self.frames.len() >= self.options.max_depth {
            return Err(ResourceExceededError::StackOverflow {
                depth: self.frames.len() + 1,
                max_depth: self.options.max_depth,
            }
            .into());
        }
        let frame = Frame::new(function, args)?;
        tracing::trace!(function = %frame.function().name, id = %frame.id(), "enter");
        self.frames.push(frame);
        Ok(())
    }

    fn run(&mut self, base: usize) -> Result<Value, ExecutionError> {
        loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Return(value)) => {
                    self.frames.pop();
                    if self.frames.len() <= base {
                        return Ok(value);
                    }
                    self.frame_mut()?.push(value);
                }
                Err(mut error) => {
                    let unwound = self.frames.get(base..).unwrap_or_default();
                    error.traceback.extend(unwound.iter().rev().map(Frame::trace_entry));
                    return Err(error);
                }
            }
        }
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, InternalError> {
        self.frames.last_mut().ok_or(InternalError::NoActiveFrame)
    }

    fn step(&mut self) -> Result<Step, ExecutionError> {
        let frame = self.frame_mut()?;
        let (instr, arg) = frame.fetch()?;
        tracing::trace!(offset = frame.last_offset(), ?instr, arg, "dispatch");

        use Opcode::*;
        match instr.op {
            Nop | ExtendedArg => {}
            PopTop => {
                frame.pop()?;
            }
            RotTwo | RotThree => {
                let depth = if instr.op == RotTwo { 1 } else { 2 };
                if !frame.stack.rotate(depth) {
                    return Err(InternalError::StackUnderflow {
                        offset: frame.last_offset(),
                    }
                    .into());
                }
            }
            DupTop => {
                let top = frame.peek()?.clone();
                frame.push(top);
            }
            UnaryNegative => {
                let value = frame.pop()?;
                frame.push(ops::unary_negative(&value)?);
            }
            UnaryNot => {
                let value = frame.pop()?;
                frame.push(Value::Bool(!value.is_truthy()));
            }
            BinaryMultiply | BinaryDivide | BinaryModulo | BinaryAdd | BinarySubtract
            | BinarySubscr => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(ops::binary(instr.op, &a, &b)?);
            }
            CompareOp => {
                let cmp = ComparisonOp::try_from(arg).map_err(|_| frame.bad_operand(instr.op, arg))?;
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(ops::compare(cmp, &a, &b)?);
            }
            PrintItem => {
                let value = frame.pop()?;
                self.print_item(&value)?;
            }
            PrintNewline => {
                self.print_newline()?;
            }
            RaiseError => {
                let message = frame.pop()?;
                return Err(RuntimeError::Raised {
                    message: message.to_string(),
                }
                .into());
            }
            ReturnValue => {
                let value = frame.pop()?;
                return Ok(Step::Return(value));
            }
            LoadConst => {
                let value = frame
                    .code()
                    .constants
                    .get(arg as usize)
                    .cloned()
                    .ok_or_else(|| frame.bad_operand(instr.op, arg))?;
                frame.push(value);
            }
            LoadGlobal | StoreGlobal => {
                let name = frame
                    .code()
                    .names
                    .get(arg as usize)
                    .cloned()
                    .ok_or_else(|| frame.bad_operand(instr.op, arg))?;
                let globals = frame.function().globals.clone();
                if instr.op == StoreGlobal {
                    let value = frame.pop()?;
                    globals.set(name, value);
                } else {
                    let value = globals
                        .get(&name)
                        .ok_or(RuntimeError::NameNotDefined { name })?;
                    frame.push(value);
                }
            }
            LoadFast => {
                let value = frame.load_fast(arg)?;
                frame.push(value);
            }
            StoreFast => {
                let value = frame.pop()?;
                frame.store_fast(arg, value)?;
            }
            BuildTuple => {
                let items: Vec<Value> = frame.pop_n(arg as usize)?;
                frame.push(Value::tuple(items));
            }
            BuildList => {
                let items: Vec<Value> = frame.pop_n(arg as usize)?;
                frame.push(Value::list(items));
            }
            BuildMap => {
                let flat: Vec<Value> = frame.pop_n(2 * arg as usize)?;
                frame.push(ops::build_map(flat));
            }
            JumpForward => {
                frame.ip += arg as usize;
            }
            JumpAbsolute => {
                frame.ip = arg as usize;
            }
            PopJumpIfFalse | PopJumpIfTrue => {
                let condition = frame.pop()?.is_truthy();
                if condition == (instr.op == PopJumpIfTrue) {
                    frame.ip = arg as usize;
                }
            }
            LoadClosure => {
                let cell = frame.cell(instr.op, arg)?.clone();
                frame.push(Value::Cell(cell));
            }
            LoadDeref => {
                let value = frame.cell(instr.op, arg)?.borrow().clone();
                match value {
                    Some(value) => frame.push(value),
                    None => {
                        return Err(RuntimeError::UnboundLocal {
                            name: frame.cell_name(arg),
                        }
                        .into());
                    }
                }
            }
            StoreDeref => {
                let value = frame.pop()?;
                *frame.cell(instr.op, arg)?.borrow_mut() = Some(value);
            }
            MakeFunction | MakeClosure => {
                let code = match frame.pop()? {
                    Value::Code(code) => code,
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "expected a code object, got '{}'",
                            other.type_name()
                        ))
                        .into());
                    }
                };
                let closure = if instr.op == MakeClosure {
                    closure_cells(&frame.pop()?)?
                } else {
                    Vec::new()
                };
                if closure.len() != code.free_vars.len() {
                    return Err(RuntimeError::type_error(format!(
                        "{} requires closure of length {}, not {}",
                        code.name,
                        code.free_vars.len(),
                        closure.len()
                    ))
                    .into());
                }
                let defaults: Vec<Value> = frame.pop_n(arg as usize)?;
                let function = Function::new(code, frame.function().globals.clone())
                    .with_defaults(defaults)
                    .with_closure(closure);
                frame.push(Value::Function(Rc::new(function)));
            }
            CallFunction => {
                let args: Args = frame.pop_n(arg as usize)?;
                let callee = frame.pop()?;
                self.call_value(callee, &args)?;
            }
        }
        Ok(Step::Continue)
    }

    fn call_value(&mut self, callee: Value, args: &[Value]) -> Result<(), ExecutionError> {
        match callee {
            Value::Function(function) => self.push_frame(function, args),
            Value::Native(native) => {
                let result = native.call(&CallContext::new(&self.frames), args)?;
                self.frame_mut()?.push(result);
                Ok(())
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn print_item(&mut self, value: &Value) -> Result<(), ExecutionError> {
        let text = value.to_string();
        let mut out = self.options.stdout.borrow_mut();
        if self.softspace {
            out.write_all(b" ").map_err(io_error)?;
        }
        out.write_all(text.as_bytes()).map_err(io_error)?;
        self.softspace = !text.ends_with('\n');
        Ok(())
    }

    fn print_newline(&mut self) -> Result<(), ExecutionError> {
        self.options
            .stdout
            .borrow_mut()
            .write_all(b"\n")
            .map_err(io_error)?;
        self.softspace = false;
        Ok(())
    }

    /// Number of active script frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The active frames, innermost last.
    pub fn call_context(&self) -> CallContext<'_> {
        CallContext::new(&self.frames)
    }
}

fn closure_cells(value: &Value) -> Result<Vec<Cell>, ExecutionError> {
    let Value::Tuple(items) = value else {
        return Err(RuntimeError::type_error(format!(
            "closure must be a tuple of cells, not '{}'",
            value.type_name()
        ))
        .into());
    };
    items
        .iter()
        .map(|item| match item {
            Value::Cell(cell) => Ok(cell.clone()),
            other => Err(RuntimeError::type_error(format!(
                "closure items must be cells, not '{}'",
                other.type_name()
            ))
            .into()),
        })
        .collect()
}

fn io_error(e: std::io::Error) -> ExecutionError {
    RuntimeError::Io {
        message: e.to_string(),
    }
    .into()
}
