//! Instruction set for the smartlog stack-based virtual machine.
//!
//! # Instruction Format
//!
//! Instructions are variable width. Every instruction starts with a one-byte
//! opcode; opcodes at or above [`Opcode::HAVE_ARGUMENT`] are followed by a
//! 16-bit little-endian operand:
//! ```text
//! ┌────────────┐      ┌────────────┬──────────────────────┐
//! │   Opcode   │  or  │   Opcode   │  Operand (u16, LE)   │
//! │  (8 bits)  │      │  (8 bits)  │      (16 bits)       │
//! └────────────┘      └────────────┴──────────────────────┘
//! ```
//!
//! The width of an instruction depends only on its opcode, so a stream can
//! be decoded in a single forward pass.
//!
//! # Extended Arguments
//!
//! For operands > 0xFFFF, use the `ExtendedArg` prefix:
//! ```ignore
//! ExtendedArg(0x0001)     // High bits for the next instruction
//! LoadConst(0x0002)       // Combined: (0x0001 << 16) | 0x0002 = 65538
//! ```
//!
//! The accumulator is `(acc | arg) << 16` after each prefix and resets to
//! zero after the first non-prefix instruction.
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`

use core::fmt;

/// Operation codes.
///
/// The numbering follows the classic CPython 2 layout so that disassembly
/// reads familiarly; only the subset the interpreter needs is defined.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ========================================================================
    // Stack (0x00 - 0x0A)
    // ========================================================================
    /// No operation
    Nop = 0x00,

    /// Pop top value
    /// Stack: [..., a] -> [...]
    PopTop = 0x01,

    /// Swap top two values
    /// Stack: [..., a, b] -> [..., b, a]
    RotTwo = 0x02,

    /// Lift second and third values one position, move top down to third
    /// Stack: [..., a, b, c] -> [..., c, a, b]
    RotThree = 0x03,

    /// Duplicate top value
    /// Stack: [..., a] -> [..., a, a]
    DupTop = 0x04,

    // ========================================================================
    // Unary & Binary Operations (0x0B - 0x1F)
    // ========================================================================
    /// Stack: [..., a] -> [..., -a]
    UnaryNegative = 0x0B,

    /// Stack: [..., a] -> [..., not a]
    UnaryNot = 0x0C,

    /// Stack: [..., a, b] -> [..., a * b]
    BinaryMultiply = 0x14,

    /// Integer operands use floor division.
    /// Stack: [..., a, b] -> [..., a / b(!)]
    BinaryDivide = 0x15,

    /// Stack: [..., a, b] -> [..., a % b(!)]
    BinaryModulo = 0x16,

    /// Numbers add, strings/lists/tuples concatenate.
    /// Stack: [..., a, b] -> [..., a + b]
    BinaryAdd = 0x17,

    /// Stack: [..., a, b] -> [..., a - b]
    BinarySubtract = 0x18,

    /// Index a sequence or look up a dict key.
    /// Stack: [..., container, key] -> [..., item(!)]
    BinarySubscr = 0x19,

    // ========================================================================
    // Print Statement (0x47 - 0x48)
    // ========================================================================
    /// Write one item of a print statement to the VM's output.
    /// Stack: [..., value] -> [...]
    PrintItem = 0x47,

    /// Terminate a print statement (newline).
    /// Stack: [...] -> [...]
    PrintNewline = 0x48,

    // ========================================================================
    // Control (0x50 - 0x59)
    // ========================================================================
    /// Raise a runtime error whose message is the popped value.
    /// Stack: [..., message] -> !
    RaiseError = 0x50,

    /// Return from function
    /// Stack: [..., retval] -> (caller) [..., retval]
    ReturnValue = 0x53,

    // ========================================================================
    // Argument-bearing opcodes (0x5A and above)
    // ========================================================================
    /// Store into a global (name index)
    /// Stack: [..., value] -> [...]
    StoreGlobal = 0x61,

    /// Push constant from pool
    /// Stack: [...] -> [..., value]
    LoadConst = 0x64,

    /// Stack: [..., e1, ..., eN] -> [..., (e1, ..., eN)]
    BuildTuple = 0x66,

    /// Stack: [..., e1, ..., eN] -> [..., [e1, ..., eN]]
    BuildList = 0x67,

    /// Operand is the number of pairs.
    /// Stack: [..., k1, v1, ..., kN, vN] -> [..., {k1: v1, ...}]
    BuildMap = 0x69,

    /// Operand encodes a [`ComparisonOp`].
    /// Stack: [..., a, b] -> [..., result: Bool]
    CompareOp = 0x6B,

    /// Jump relative to the next instruction (operand in bytes)
    JumpForward = 0x6E,

    /// Jump to an absolute byte offset
    JumpAbsolute = 0x71,

    /// Pop and jump to an absolute byte offset if falsy
    /// Stack: [..., cond] -> [...]
    PopJumpIfFalse = 0x72,

    /// Pop and jump to an absolute byte offset if truthy
    /// Stack: [..., cond] -> [...]
    PopJumpIfTrue = 0x73,

    /// Load a global (name index)
    /// Stack: [...] -> [..., value(!)]
    LoadGlobal = 0x74,

    /// Load local variable
    /// Stack: [...] -> [..., value(!)]
    LoadFast = 0x7C,

    /// Store to local variable
    /// Stack: [..., value] -> [...]
    StoreFast = 0x7D,

    /// Call a function with N positional arguments
    /// Stack: [..., callee, a1, ..., aN] -> [..., result(!)]
    CallFunction = 0x83,

    /// Create a function from a code constant with N default values
    /// Stack: [..., d1, ..., dN, code] -> [..., function]
    MakeFunction = 0x84,

    /// Like `MakeFunction`, with a tuple of captured cells below the code
    /// Stack: [..., d1, ..., dN, cells, code] -> [..., function]
    MakeClosure = 0x86,

    /// Push a cell (own cell variables first, then free variables)
    /// Stack: [...] -> [..., cell]
    LoadClosure = 0x87,

    /// Load the contents of a cell
    /// Stack: [...] -> [..., value(!)]
    LoadDeref = 0x88,

    /// Store into a cell
    /// Stack: [..., value] -> [...]
    StoreDeref = 0x89,

    /// Extended argument prefix - supplies the high 16 bits of the next
    /// argument-bearing instruction's operand.
    ExtendedArg = 0x91,
}
static_assertions::assert_eq_size!(Opcode, u8);

/// How a jump instruction encodes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Operand is a byte distance from the next instruction.
    Relative,
    /// Operand is a byte offset from the start of the stream.
    Absolute,
}

impl Opcode {
    /// First opcode value that carries an operand.
    pub const HAVE_ARGUMENT: u8 = 0x5A;

    /// Whether the opcode is followed by a 16-bit operand.
    pub const fn has_arg(self) -> bool {
        self as u8 >= Self::HAVE_ARGUMENT
    }

    /// Encoded size in bytes.
    pub const fn size(self) -> usize {
        if self.has_arg() { 3 } else { 1 }
    }

    pub const fn jump_kind(self) -> Option<JumpKind> {
        match self {
            Self::JumpForward => Some(JumpKind::Relative),
            Self::JumpAbsolute | Self::PopJumpIfFalse | Self::PopJumpIfTrue => {
                Some(JumpKind::Absolute)
            }
            _ => None,
        }
    }

    /// Whether this is one of the two print-statement operations.
    pub const fn is_print(self) -> bool {
        matches!(self, Self::PrintItem | Self::PrintNewline)
    }

    /// Net effect on the operand stack depth (fall-through path).
    pub fn stack_effect(self, arg: u32) -> i64 {
        let n = i64::from(arg);
        match self {
            Self::Nop | Self::RotTwo | Self::RotThree => 0,
            Self::UnaryNegative | Self::UnaryNot => 0,
            Self::PrintNewline | Self::ExtendedArg => 0,
            Self::JumpForward | Self::JumpAbsolute => 0,
            Self::DupTop | Self::LoadConst | Self::LoadGlobal | Self::LoadFast => 1,
            Self::LoadClosure | Self::LoadDeref => 1,
            Self::PopTop | Self::PrintItem | Self::ReturnValue | Self::RaiseError => -1,
            Self::StoreGlobal | Self::StoreFast | Self::StoreDeref => -1,
            Self::PopJumpIfFalse | Self::PopJumpIfTrue | Self::CompareOp => -1,
            Self::BinaryMultiply
            | Self::BinaryDivide
            | Self::BinaryModulo
            | Self::BinaryAdd
            | Self::BinarySubtract
            | Self::BinarySubscr => -1,
            Self::BuildTuple | Self::BuildList => 1 - n,
            Self::BuildMap => 1 - 2 * n,
            Self::CallFunction | Self::MakeFunction => -n,
            Self::MakeClosure => -n - 1,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        let op = match byte {
            0x00 => Nop,
            0x01 => PopTop,
            0x02 => RotTwo,
            0x03 => RotThree,
            0x04 => DupTop,
            0x0B => UnaryNegative,
            0x0C => UnaryNot,
            0x14 => BinaryMultiply,
            0x15 => BinaryDivide,
            0x16 => BinaryModulo,
            0x17 => BinaryAdd,
            0x18 => BinarySubtract,
            0x19 => BinarySubscr,
            0x47 => PrintItem,
            0x48 => PrintNewline,
            0x50 => RaiseError,
            0x53 => ReturnValue,
            0x61 => StoreGlobal,
            0x64 => LoadConst,
            0x66 => BuildTuple,
            0x67 => BuildList,
            0x69 => BuildMap,
            0x6B => CompareOp,
            0x6E => JumpForward,
            0x71 => JumpAbsolute,
            0x72 => PopJumpIfFalse,
            0x73 => PopJumpIfTrue,
            0x74 => LoadGlobal,
            0x7C => LoadFast,
            0x7D => StoreFast,
            0x83 => CallFunction,
            0x84 => MakeFunction,
            0x86 => MakeClosure,
            0x87 => LoadClosure,
            0x88 => LoadDeref,
            0x89 => StoreDeref,
            0x91 => ExtendedArg,
            other => return Err(other),
        };
        Ok(op)
    }
}

/// Comparison selected by the `CompareOp` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt = 0,
    Le = 1,
    Eq = 2,
    Ne = 3,
    Gt = 4,
    Ge = 5,
}

impl ComparisonOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl TryFrom<u32> for ComparisonOp {
    type Error = u32;

    fn try_from(arg: u32) -> Result<Self, Self::Error> {
        Ok(match arg {
            0 => Self::Lt,
            1 => Self::Le,
            2 => Self::Eq,
            3 => Self::Ne,
            4 => Self::Gt,
            5 => Self::Ge,
            other => return Err(other),
        })
    }
}

/// A single decoded instruction.
///
/// `arg` holds only the 16 bits encoded in this instruction; high-order bits
/// contributed by preceding `ExtendedArg` prefixes are accumulated by the
/// consumer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub arg: u16,
}

impl Instruction {
    pub const fn new(op: Opcode, arg: u16) -> Self {
        Self { op, arg }
    }

    /// An instruction without operand.
    pub const fn simple(op: Opcode) -> Self {
        Self { op, arg: 0 }
    }

    pub const fn size(&self) -> usize {
        self.op.size()
    }

    /// Append the encoded bytes of this instruction.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.op as u8);
        if self.op.has_arg() {
            out.extend_from_slice(&self.arg.to_le_bytes());
        }
    }

    /// Decode the instruction starting at `offset`.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<Self, DecodeError> {
        let Some(&byte) = bytes.get(offset) else {
            return Err(DecodeError::UnexpectedEnd { offset });
        };
        let op = Opcode::try_from(byte).map_err(|byte| DecodeError::InvalidOpcode { offset, byte })?;
        if !op.has_arg() {
            return Ok(Self::simple(op));
        }
        match bytes.get(offset + 1..offset + 3) {
            Some(&[lo, hi]) => Ok(Self::new(op, u16::from_le_bytes([lo, hi]))),
            _ => Err(DecodeError::TruncatedOperand { offset, op }),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Opcode::CompareOp => match ComparisonOp::try_from(u32::from(self.arg)) {
                Ok(cmp) => write!(f, "CompareOp({})", cmp.symbol()),
                Err(raw) => write!(f, "CompareOp(?{})", raw),
            },
            Opcode::ExtendedArg => write!(f, "ExtendedArg(0x{:04X})", self.arg),
            op if op.has_arg() => write!(f, "{:?}({})", op, self.arg),
            op => write!(f, "{:?}", op),
        }
    }
}

/// Forward-only cursor over an encoded instruction stream.
///
/// Yields `(offset, instruction)` pairs. After the first error the decoder
/// is exhausted.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let offset = self.offset;
        match Instruction::decode(self.bytes, offset) {
            Ok(instr) => {
                self.offset += instr.size();
                Some(Ok((offset, instr)))
            }
            Err(e) => {
                self.offset = self.bytes.len();
                Some(Err(e))
            }
        }
    }
}

/// Encode a sequence of instructions.
pub fn assemble(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(instructions.len() * 3);
    for instr in instructions {
        instr.encode(&mut out);
    }
    out
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid opcode 0x{byte:02X} at offset {offset}")]
    InvalidOpcode { offset: usize, byte: u8 },

    #[error("truncated operand for {op:?} at offset {offset}")]
    TruncatedOperand { offset: usize, op: Opcode },

    #[error("instruction stream ends at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("operand at offset {offset} does not fit in 32 bits")]
    OperandOverflow { offset: usize },

    #[error("line table has odd length {len}")]
    OddLineTable { len: usize },
}
