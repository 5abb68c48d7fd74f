mod code;
mod error;
mod frame;
mod instruction_set;
mod line_table;
mod ops;
mod runtime;
mod stack;


pub use code::{CodeIdentity, CodeObject};
pub use error::{
    ErrorKind, ExecutionError, InternalError, ResourceExceededError, RuntimeError, TraceEntry,
};
pub use frame::{CallContext, Frame, InvocationId};
pub use instruction_set::{
    ComparisonOp, DecodeError, Decoder, Instruction, JumpKind, Opcode, assemble,
};
pub use line_table::{LineRun, LineTable};
pub use runtime::{ExecutionOptions, SharedWriter, VM, stdout_writer};
