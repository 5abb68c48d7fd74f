//! Runtime execution errors.
//!
//! # Error Categories
//!
//! - **Runtime errors**: errors raised by the executed program itself
//!   (division by zero, unbound names, explicit raises, ...).
//!
//! - **Resource exceeded errors**: fatal resource limit violations such as
//!   call depth overflow.
//!
//! - **Internal errors**: the interpreter's own invariants do not hold:
//!   malformed bytecode, operand stack underflow, or a call stack that does
//!   not contain the invocation a redirected print belongs to. These abort
//!   the call rather than continue with misattributed state.

use ecow::EcoString;

use super::instruction_set::DecodeError;
use crate::resolver::ResolveError;

/// An error raised while executing bytecode, with the frames it unwound.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    /// Unwound frames, innermost first.
    pub traceback: Vec<TraceEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    ResourceExceeded(#[from] ResourceExceededError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Errors raised by the executed program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("repeated string exceeds {limit} bytes")]
    StringTooLong { limit: usize },

    #[error("index {index} out of range (length: {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("name '{name}' is not defined")]
    NameNotDefined { name: EcoString },

    #[error("local variable '{name}' referenced before assignment")]
    UnboundLocal { name: EcoString },

    #[error("type error: {message}")]
    TypeError { message: String },

    #[error("{function}() takes {expected} arguments ({given} given)")]
    Arity {
        function: EcoString,
        expected: String,
        given: usize,
    },

    #[error("{message}")]
    Raised { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            message: message.into(),
        }
    }
}

/// Resource limit exceeded errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceExceededError {
    #[error("call stack overflow: depth {depth} exceeds maximum of {max_depth}")]
    StackOverflow { depth: usize, max_depth: usize },
}

/// Violations of the interpreter's own invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalError {
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(#[from] DecodeError),

    #[error("operand stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },

    #[error("operand {operand} of {op} at offset {offset} is out of range")]
    BadOperand {
        op: &'static str,
        operand: u32,
        offset: usize,
    },

    #[error("no active frame")]
    NoActiveFrame,

    #[error("call stack inconsistency: {0}")]
    StackInconsistency(#[from] ResolveError),
}

/// One unwound frame of a traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub function: EcoString,
    pub filename: EcoString,
    pub line: u32,
}

impl ExecutionError {
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        Self {
            kind: kind.into(),
            traceback: Vec::new(),
        }
    }

    /// Line of the innermost frame the error passed through.
    pub fn line(&self) -> Option<u32> {
        self.traceback.first().map(|entry| entry.line)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal(_))
    }
}

impl From<RuntimeError> for ExecutionError {
    fn from(e: RuntimeError) -> Self {
        ExecutionError::new(e)
    }
}

impl From<ResourceExceededError> for ExecutionError {
    fn from(e: ResourceExceededError) -> Self {
        ExecutionError::new(e)
    }
}

impl From<InternalError> for ExecutionError {
    fn from(e: InternalError) -> Self {
        ExecutionError::new(e)
    }
}

impl From<ResolveError> for ExecutionError {
    fn from(e: ResolveError) -> Self {
        ExecutionError::new(InternalError::StackInconsistency(e))
    }
}

impl From<DecodeError> for ExecutionError {
    fn from(e: DecodeError) -> Self {
        ExecutionError::new(InternalError::InvalidBytecode(e))
    }
}
