//! Assembly errors.

use ecow::EcoString;

/// Errors that can occur while assembling a code object.
///
/// Apart from `UnknownLocal`, `StackUnderflow` and `LateParameter` these are resource limits
/// that only very large functions hit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("too many local variables (limit: ~4 billion)")]
    TooManyLocals,

    #[error("too many constants (limit: ~4 billion)")]
    TooManyConstants,

    #[error("too many global names (limit: ~4 billion)")]
    TooManyNames,

    /// Forward jumps are emitted with a single 16-bit operand.
    #[error("jump from offset {from} to {to} does not fit in 16 bits")]
    JumpTooFar { from: usize, to: usize },

    #[error("unknown variable '{name}'")]
    UnknownLocal { name: EcoString },

    /// The instruction ending at `offset` pops more than was pushed.
    #[error("operand stack underflow in instruction ending at offset {offset}")]
    StackUnderflow { offset: usize },

    #[error("parameter '{name}' declared after a local variable")]
    LateParameter { name: EcoString },
}
