use core::fmt;

use ecow::EcoString;
use hashbrown::{HashMap, HashSet};

use super::instruction_set::{Decoder, Instruction, JumpKind, Opcode};
use super::line_table::LineTable;
use crate::values::Value;

/// Compiled representation of one function body.
///
/// This is the intermediate representation the rewriter transforms: the
/// encoded instruction stream together with its constant pool and debug
/// line table.
#[derive(Clone)]
pub struct CodeObject {
    pub name: EcoString,
    pub filename: EcoString,
    /// Line of the definition; line table deltas are relative to it.
    pub first_line: u32,
    /// Number of positional parameters (the first `arg_count` locals).
    pub arg_count: u16,
    /// Local variable names indexed by slot, parameters first.
    pub var_names: Vec<EcoString>,
    /// Global names referenced by `LoadGlobal` / `StoreGlobal`.
    pub names: Vec<EcoString>,
    /// Locals captured by nested closures.
    pub cell_vars: Vec<EcoString>,
    /// Variables captured from enclosing functions.
    pub free_vars: Vec<EcoString>,
    pub constants: Vec<Value>,
    pub bytecode: Vec<u8>,
    pub line_table: LineTable,
    pub max_stack_size: usize,
}

/// What identifies a code object across rewrites: its source identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeIdentity {
    pub filename: EcoString,
    pub name: EcoString,
    pub first_line: u32,
}

impl fmt::Display for CodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (\"{}\", line {})", self.name, self.filename, self.first_line)
    }
}

impl CodeObject {
    pub fn identity(&self) -> CodeIdentity {
        CodeIdentity {
            filename: self.filename.clone(),
            name: self.name.clone(),
            first_line: self.first_line,
        }
    }

    pub fn line_for_offset(&self, offset: usize) -> u32 {
        self.line_table.line_for_offset(self.first_line, offset)
    }

    pub fn instructions(&self) -> Decoder<'_> {
        Decoder::new(&self.bytecode)
    }

    /// Index of a cell by name: own cell variables first, then free variables.
    pub fn cell_index(&self, name: &str) -> Option<usize> {
        self.cell_vars
            .iter()
            .chain(self.free_vars.iter())
            .position(|n| n == name)
    }

    pub fn cell_name(&self, index: usize) -> Option<&EcoString> {
        self.cell_vars.iter().chain(self.free_vars.iter()).nth(index)
    }
}

/// Resolve the absolute target of a jump, if `instr` is one.
fn jump_target(instr: &Instruction, offset: usize, arg: u64) -> Option<u64> {
    match instr.op.jump_kind()? {
        JumpKind::Relative => Some((offset + instr.size()) as u64 + arg),
        JumpKind::Absolute => Some(arg),
    }
}

impl fmt::Debug for CodeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Code {} {{", self.identity())?;
        writeln!(f, "  arg_count: {}", self.arg_count)?;
        writeln!(f, "  var_names: {:?}", self.var_names)?;
        writeln!(f, "  max_stack_size: {}", self.max_stack_size)?;

        // Print constants pool
        if !self.constants.is_empty() {
            writeln!(f, "  constants: [")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "    [{}] = {:?}", i, constant)?;
            }
            writeln!(f, "  ]")?;
        } else {
            writeln!(f, "  constants: []")?;
        }

        // First pass: collect all jump targets to determine which offsets need labels
        let mut jump_targets: HashSet<u64> = HashSet::new();
        let mut extended_arg: u64 = 0;
        for decoded in self.instructions() {
            let Ok((offset, instr)) = decoded else { break };
            let arg = extended_arg | u64::from(instr.arg);
            if instr.op == Opcode::ExtendedArg {
                extended_arg = arg << 16;
                continue;
            }
            if let Some(target) = jump_target(&instr, offset, arg) {
                jump_targets.insert(target);
            }
            extended_arg = 0;
        }

        // Assign label numbers to targets (sorted for deterministic output)
        let mut sorted_targets: Vec<_> = jump_targets.into_iter().collect();
        sorted_targets.sort();
        let label_map: HashMap<u64, usize> = sorted_targets
            .into_iter()
            .enumerate()
            .map(|(i, offset)| (offset, i))
            .collect();

        // Second pass: print instructions with labels and line numbers
        writeln!(f, "  instructions:")?;
        extended_arg = 0;
        let mut last_line = None;
        for decoded in self.instructions() {
            let (offset, instr) = match decoded {
                Ok(decoded) => decoded,
                Err(e) => {
                    writeln!(f, "    <{}>", e)?;
                    break;
                }
            };
            let line = self.line_for_offset(offset);
            let line_prefix = if last_line != Some(line) {
                last_line = Some(line);
                format!("{:>4}", line)
            } else {
                String::new()
            };
            let label_prefix = label_map
                .get(&(offset as u64))
                .map(|label| format!("L{}:", label))
                .unwrap_or_default();

            let arg = extended_arg | u64::from(instr.arg);
            if instr.op == Opcode::ExtendedArg {
                extended_arg = arg << 16;
                writeln!(f, "  {:>4} {:4} {:>4}  {:?}", line_prefix, offset, label_prefix, instr)?;
                continue;
            }
            extended_arg = 0;

            if let Some(target) = jump_target(&instr, offset, arg) {
                let target_label = label_map
                    .get(&target)
                    .map(|l| format!("L{}", l))
                    .unwrap_or_else(|| format!("@{}", target));
                writeln!(
                    f,
                    "  {:>4} {:4} {:>4}  {:?} (to {})",
                    line_prefix, offset, label_prefix, instr, target_label
                )?;
            } else {
                writeln!(f, "  {:>4} {:4} {:>4}  {:?}", line_prefix, offset, label_prefix, instr)?;
            }
        }

        write!(f, "}}")
    }
}
