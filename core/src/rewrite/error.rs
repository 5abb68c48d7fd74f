use crate::vm::DecodeError;

/// Errors raised while rewriting a code object. All of them are reported at
/// decoration time, before the function ever runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The redirection constants would land beyond what a single 16-bit
    /// `LoadConst` operand can address.
    #[error("constant index {index} does not fit in a 16-bit operand")]
    UnsupportedOperand { index: usize },

    #[error("jump operand {operand} at offset {offset} no longer fits its encoded width")]
    OperandOutOfRange { offset: usize, operand: u64 },

    #[error("line table covers {covered} bytes but the instruction stream has {length}")]
    LineTableMismatch { covered: u64, length: usize },

    #[error("line run containing offset {offset} would exceed {max} bytes", max = u32::MAX)]
    LineRunOverflow { offset: usize },

    #[error("ExtendedArg prefix before operand-less instruction at offset {offset}")]
    DanglingExtendedArg { offset: usize },
}
