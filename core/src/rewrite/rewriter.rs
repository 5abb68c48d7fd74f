//! The instruction-stream rewrite pass.
//!
//! # Replacement sequences
//!
//! ```text
//! PrintItem      ->  LoadConst h; RotTwo; LoadConst m; RotTwo; CallFunction 2; PopTop
//! PrintNewline   ->  LoadConst h; LoadConst m; CallFunction 1; PopTop
//! ```
//!
//! `h` is the redirection handler and `m` the marker constant, both appended
//! to the constant pool on the first print site. The item sequence leaves
//! `[h, m, value]` on the stack so the handler is called as `h(m, value)`;
//! the terminator calls `h(m)`. Both sequences need two extra stack slots.
//!
//! # Offsets
//!
//! Every replacement grows the stream. The line run containing the print
//! site absorbs the growth, so each original instruction keeps its line.
//! Jump operands are re-targeted afterwards through the old-to-new offset
//! map, including any `ExtendedArg` prefixes they carry.

use std::rc::Rc;

use smallvec::{SmallVec, smallvec};

use super::error::RewriteError;
use super::marker::PrintMarker;
use crate::values::{Function, NativeFunction, Value};
use crate::vm::{CodeObject, Decoder, Instruction, JumpKind, LineRun, LineTable, Opcode};

/// Extra operand stack slots a replacement sequence needs.
const STACK_HEADROOM: usize = 2;

/// The two constants every rewritten print site loads.
#[derive(Debug, Clone)]
pub struct PrintRedirect {
    pub handler: Value,
    pub marker: Value,
}

/// A rewritten print site.
#[derive(Debug, Clone, Copy)]
struct Site {
    /// Original offset of the print instruction.
    offset: usize,
    /// Bytes inserted up to and including this site.
    growth: usize,
}

/// A jump found in the original stream.
#[derive(Debug, Clone, Copy)]
struct Jump {
    /// Offset of the first `ExtendedArg` prefix, or of the jump itself.
    start: usize,
    offset: usize,
    next: usize,
    target: u64,
    kind: JumpKind,
}

type Replacement = SmallVec<[Instruction; 6]>;

fn replacement(op: Opcode, handler: u16, marker: u16) -> Replacement {
    use Opcode::*;
    match op {
        PrintItem => smallvec![
            Instruction::new(LoadConst, handler),
            Instruction::simple(RotTwo),
            Instruction::new(LoadConst, marker),
            Instruction::simple(RotTwo),
            Instruction::new(CallFunction, 2),
            Instruction::simple(PopTop),
        ],
        _ => smallvec![
            Instruction::new(LoadConst, handler),
            Instruction::new(LoadConst, marker),
            Instruction::new(CallFunction, 1),
            Instruction::simple(PopTop),
        ],
    }
}

/// Append the handler and marker constants, returning their indices.
fn append_constants(
    constants: &mut Vec<Value>,
    redirect: &PrintRedirect,
) -> Result<(u16, u16), RewriteError> {
    let handler = constants.len();
    let marker = handler + 1;
    let encode = |index: usize| u16::try_from(index).map_err(|_| RewriteError::UnsupportedOperand { index });
    let indices = (encode(handler)?, encode(marker)?);
    constants.push(redirect.handler.clone());
    constants.push(redirect.marker.clone());
    Ok(indices)
}

/// Map an original offset to its offset in the rewritten stream.
fn relocate(sites: &[Site], offset: u64) -> u64 {
    let before = sites.partition_point(|site| (site.offset as u64) < offset);
    match before {
        0 => offset,
        n => offset + sites[n - 1].growth as u64,
    }
}

/// Rewrite every print operation in `code` into a call to the redirect
/// handler.
///
/// Code without print operations comes back unchanged, with no constants
/// appended.
pub fn rewrite_code(code: &CodeObject, redirect: &PrintRedirect) -> Result<CodeObject, RewriteError> {
    let source = &code.bytecode;
    let covered = code.line_table.total_bytes();
    if covered != source.len() as u64 {
        return Err(RewriteError::LineTableMismatch {
            covered,
            length: source.len(),
        });
    }

    let mut out = Vec::with_capacity(source.len() + 32);
    let mut constants: Option<Vec<Value>> = None;
    let mut pool: Option<(u16, u16)> = None;

    let mut runs = code.line_table.runs().to_vec();
    runs.push(LineRun::SENTINEL);
    let mut run_index = 0;
    let mut run_end = u64::from(runs[0].bytes);

    let mut sites: Vec<Site> = Vec::new();
    let mut jumps: Vec<Jump> = Vec::new();
    let mut growth = 0usize;
    let mut last_copied = 0;
    let mut extended_arg: u64 = 0;
    let mut prefix_start: Option<usize> = None;

    for decoded in Decoder::new(source) {
        let (offset, instr) = decoded?;
        let next = offset + instr.size();

        // Move to the run containing `offset`, skipping empty runs.
        while offset as u64 >= run_end && run_index + 1 < runs.len() {
            run_index += 1;
            run_end += u64::from(runs[run_index].bytes);
        }

        let arg = extended_arg | u64::from(instr.arg);
        if instr.op == Opcode::ExtendedArg {
            prefix_start.get_or_insert(offset);
            extended_arg = arg << 16;
            continue;
        }

        if let Some(kind) = instr.op.jump_kind() {
            let target = match kind {
                JumpKind::Relative => next as u64 + arg,
                JumpKind::Absolute => arg,
            };
            jumps.push(Jump {
                start: prefix_start.unwrap_or(offset),
                offset,
                next,
                target,
                kind,
            });
        }

        if instr.op.is_print() {
            if prefix_start.is_some() {
                return Err(RewriteError::DanglingExtendedArg { offset });
            }
            out.extend_from_slice(&source[last_copied..offset]);

            let (handler, marker) = match pool {
                Some(indices) => indices,
                None => {
                    let pool_constants = constants.get_or_insert_with(|| code.constants.clone());
                    let indices = append_constants(pool_constants, redirect)?;
                    pool = Some(indices);
                    indices
                }
            };

            let before = out.len();
            for replacement_instr in replacement(instr.op, handler, marker) {
                replacement_instr.encode(&mut out);
            }
            let inserted = out.len() - before - instr.size();

            let run = &mut runs[run_index];
            run.bytes = u32::try_from(inserted)
                .ok()
                .and_then(|inserted| run.bytes.checked_add(inserted))
                .ok_or(RewriteError::LineRunOverflow { offset })?;

            growth += inserted;
            sites.push(Site { offset, growth });
            last_copied = next;
        }

        extended_arg = 0;
        prefix_start = None;
    }

    let Some(constants) = constants else {
        tracing::debug!(function = %code.name, "no print statements to rewrite");
        return Ok(code.clone());
    };

    out.extend_from_slice(&source[last_copied..]);
    runs.pop();

    for jump in &jumps {
        retarget(&mut out, &sites, jump)?;
    }

    tracing::debug!(
        function = %code.name,
        sites = sites.len(),
        jumps = jumps.len(),
        growth,
        "rewrote print statements"
    );

    Ok(CodeObject {
        constants,
        bytecode: out,
        line_table: LineTable::new(runs),
        max_stack_size: code.max_stack_size + STACK_HEADROOM,
        ..code.clone()
    })
}

/// Rewrite the operand of one jump (and its prefixes) in the new stream.
fn retarget(out: &mut [u8], sites: &[Site], jump: &Jump) -> Result<(), RewriteError> {
    let target = relocate(sites, jump.target);
    let operand = match jump.kind {
        JumpKind::Absolute => target,
        JumpKind::Relative => target - relocate(sites, jump.next as u64),
    };

    // Operands are stored in 16-bit chunks: one per prefix plus the jump's.
    let prefixes = (jump.offset - jump.start) / Opcode::ExtendedArg.size();
    let bits = 16 * (prefixes as u32 + 1);
    let new_offset = relocate(sites, jump.offset as u64) as usize;
    if bits < 64 && operand >> bits != 0 {
        return Err(RewriteError::OperandOutOfRange {
            offset: new_offset,
            operand,
        });
    }

    let new_start = relocate(sites, jump.start as u64) as usize;
    for chunk in 0..=prefixes {
        let at = new_start + chunk * Opcode::ExtendedArg.size();
        let shift = 16 * (prefixes - chunk);
        let value = (operand >> shift) as u16;
        out[at + 1..at + 3].copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

/// Rewrite a function's code, keeping its globals, defaults and closure.
pub fn rewrite_function(function: &Function, redirect: &PrintRedirect) -> Result<Function, RewriteError> {
    let code = rewrite_code(&function.code, redirect)?;
    Ok(function.with_code(Rc::new(code)))
}

/// Rewrites functions so their prints call `handler(marker, value)` and
/// `handler(marker)`.
#[derive(Debug, Clone)]
pub struct PrintRewriter {
    handler: NativeFunction,
}

impl PrintRewriter {
    pub fn new(handler: NativeFunction) -> Self {
        Self { handler }
    }

    pub fn rewrite(
        &self,
        function: &Function,
        default_severity: Option<u32>,
    ) -> Result<Function, RewriteError> {
        let marker = PrintMarker::new(default_severity, function.code.clone());
        let redirect = PrintRedirect {
            handler: Value::Native(self.handler.clone()),
            marker: marker.to_value(),
        };
        rewrite_function(function, &redirect)
    }
}
