//! Tests for the print rewrite pass.

use core::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::assembler::CodeBuilder;
use crate::rewrite::{PrintMarker, PrintRedirect, PrintRewriter, RewriteError, rewrite_code};
use crate::test_utils;
use crate::values::{Function, Globals, NativeFunction, Value};
use crate::vm::{
    CodeObject, ComparisonOp, Decoder, ExecutionOptions, Instruction, LineRun, LineTable, Opcode,
    SharedWriter, VM, assemble,
};

type Calls = Rc<RefCell<Vec<Vec<Value>>>>;

/// A handler recording the arguments of every call.
fn recording_handler() -> (NativeFunction, Calls) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let handler = NativeFunction::new("handler", move |_ctx, args| {
        sink.borrow_mut().push(args.to_vec());
        Ok(Value::None)
    });
    (handler, calls)
}

fn redirect() -> PrintRedirect {
    PrintRedirect {
        handler: Value::str("h"),
        marker: Value::str("m"),
    }
}

fn raw_code(bytecode: Vec<u8>, runs: Vec<LineRun>, constants: Vec<Value>) -> CodeObject {
    CodeObject {
        name: "raw".into(),
        filename: "raw.py".into(),
        first_line: 1,
        arg_count: 0,
        var_names: Vec::new(),
        names: Vec::new(),
        cell_vars: Vec::new(),
        free_vars: Vec::new(),
        constants,
        bytecode,
        line_table: LineTable::new(runs),
        max_stack_size: 1,
    }
}

fn instructions(code: &CodeObject) -> Vec<(usize, Instruction)> {
    Decoder::new(&code.bytecode).map(|d| d.unwrap()).collect()
}

fn quiet_vm() -> VM {
    let stdout: SharedWriter = Rc::new(RefCell::new(Vec::<u8>::new()));
    VM::new(ExecutionOptions {
        stdout,
        ..ExecutionOptions::default()
    })
}

/// line 2: print "x",
/// line 3: print
/// line 4: return None
fn print_code() -> CodeObject {
    let mut b = CodeBuilder::new("f", "test.py", 1);
    b.set_line(2);
    b.load_const("x").print_item();
    b.set_line(3);
    b.print_newline();
    b.set_line(4);
    b.load_const(Value::None).return_value();
    b.build().unwrap()
}

#[test]
fn test_code_without_prints_is_unchanged() {
    let mut b = CodeBuilder::new("f", "test.py", 1);
    b.load_const(1).load_const(2).emit(Opcode::BinaryAdd).return_value();
    let code = b.build().unwrap();

    let rewritten = rewrite_code(&code, &redirect()).unwrap();
    assert_eq!(rewritten.bytecode, code.bytecode);
    assert_eq!(rewritten.constants.len(), code.constants.len());
    assert_eq!(rewritten.line_table, code.line_table);
    assert_eq!(rewritten.max_stack_size, code.max_stack_size);
}

#[test]
fn test_replacement_sequences() {
    let code = print_code();
    let rewritten = rewrite_code(&code, &redirect()).unwrap();

    // "x" and None, then handler and marker.
    assert_eq!(rewritten.constants.len(), 4);
    assert_eq!(rewritten.constants[2], Value::str("h"));
    assert_eq!(rewritten.constants[3], Value::str("m"));
    assert_eq!(rewritten.max_stack_size, code.max_stack_size + 2);

    let ops: Vec<Instruction> = instructions(&rewritten).into_iter().map(|(_, i)| i).collect();
    assert_eq!(
        ops,
        vec![
            Instruction::new(Opcode::LoadConst, 0),
            // print item
            Instruction::new(Opcode::LoadConst, 2),
            Instruction::simple(Opcode::RotTwo),
            Instruction::new(Opcode::LoadConst, 3),
            Instruction::simple(Opcode::RotTwo),
            Instruction::new(Opcode::CallFunction, 2),
            Instruction::simple(Opcode::PopTop),
            // print newline
            Instruction::new(Opcode::LoadConst, 2),
            Instruction::new(Opcode::LoadConst, 3),
            Instruction::new(Opcode::CallFunction, 1),
            Instruction::simple(Opcode::PopTop),
            Instruction::new(Opcode::LoadConst, 1),
            Instruction::simple(Opcode::ReturnValue),
        ]
    );
}

#[test]
fn test_line_runs_absorb_growth() {
    let code = print_code();
    assert_eq!(
        code.line_table.runs(),
        &[LineRun::new(4, 1), LineRun::new(1, 1), LineRun::new(4, 1)]
    );

    let rewritten = rewrite_code(&code, &redirect()).unwrap();
    assert_eq!(
        rewritten.line_table.runs(),
        &[LineRun::new(15, 1), LineRun::new(10, 1), LineRun::new(4, 1)]
    );
    assert_eq!(
        rewritten.line_table.total_bytes(),
        rewritten.bytecode.len() as u64
    );

    // Every instruction of the replacement keeps the line of the print.
    for (offset, _) in instructions(&rewritten) {
        let expected = match offset {
            0..15 => 2,
            15..25 => 3,
            _ => 4,
        };
        assert_eq!(rewritten.line_for_offset(offset), expected, "offset {}", offset);
    }
}

#[test]
fn test_relative_jump_over_print_is_retargeted() {
    // 0: LoadConst 0; 3: JumpForward +1 (to 7); 6: PrintItem; 7: PrintNewline;
    // 8: LoadConst 0; 11: ReturnValue
    let bytecode = assemble(&[
        Instruction::new(Opcode::LoadConst, 0),
        Instruction::new(Opcode::JumpForward, 1),
        Instruction::simple(Opcode::PrintItem),
        Instruction::simple(Opcode::PrintNewline),
        Instruction::new(Opcode::LoadConst, 0),
        Instruction::simple(Opcode::ReturnValue),
    ]);
    let code = raw_code(bytecode, vec![LineRun::new(12, 1)], vec![Value::None]);
    let rewritten = rewrite_code(&code, &redirect()).unwrap();

    let decoded = instructions(&rewritten);
    assert_eq!(decoded[1], (3, Instruction::new(Opcode::JumpForward, 12)));
    // The jump lands on the terminator's replacement.
    assert_eq!(decoded[8], (18, Instruction::new(Opcode::LoadConst, 1)));
    assert_eq!(rewritten.line_table.runs(), &[LineRun::new(32, 1)]);
}

/// `PrintNewline; [ExtendedArg 0;] JumpAbsolute 65534; Nop...` padded to
/// 65535 bytes.
fn far_jump_code(with_prefix: bool) -> CodeObject {
    let mut instrs = vec![Instruction::simple(Opcode::PrintNewline)];
    if with_prefix {
        instrs.push(Instruction::new(Opcode::ExtendedArg, 0));
    }
    instrs.push(Instruction::new(Opcode::JumpAbsolute, 65534));
    let mut bytecode = assemble(&instrs);
    bytecode.resize(65535, Opcode::Nop as u8);
    raw_code(bytecode, vec![LineRun::new(65535, 0)], Vec::new())
}

#[test]
fn test_retargeted_operand_must_fit() {
    let code = far_jump_code(false);
    assert_eq!(
        rewrite_code(&code, &redirect()).unwrap_err(),
        RewriteError::OperandOutOfRange {
            offset: 10,
            operand: 65543
        }
    );
}

#[test]
fn test_extended_arg_prefix_carries_high_bits() {
    let code = far_jump_code(true);
    let rewritten = rewrite_code(&code, &redirect()).unwrap();
    let decoded = instructions(&rewritten);
    assert_eq!(decoded[4], (10, Instruction::new(Opcode::ExtendedArg, 1)));
    assert_eq!(decoded[5], (13, Instruction::new(Opcode::JumpAbsolute, 7)));
}

#[test]
fn test_constant_index_beyond_16_bits() {
    let bytecode = assemble(&[
        Instruction::simple(Opcode::PrintNewline),
        Instruction::new(Opcode::LoadConst, 0),
        Instruction::simple(Opcode::ReturnValue),
    ]);
    let code = raw_code(
        bytecode,
        vec![LineRun::new(5, 0)],
        vec![Value::None; 65535],
    );
    assert_eq!(
        rewrite_code(&code, &redirect()).unwrap_err(),
        RewriteError::UnsupportedOperand { index: 65536 }
    );
}

#[test]
fn test_line_table_must_cover_stream() {
    let bytecode = assemble(&[
        Instruction::simple(Opcode::PrintNewline),
        Instruction::new(Opcode::LoadConst, 0),
        Instruction::simple(Opcode::ReturnValue),
    ]);
    let code = raw_code(bytecode, vec![LineRun::new(3, 0)], vec![Value::None]);
    assert_eq!(
        rewrite_code(&code, &redirect()).unwrap_err(),
        RewriteError::LineTableMismatch {
            covered: 3,
            length: 5
        }
    );
}

#[test]
fn test_loop_with_prints_runs_correctly() {
    test_utils::init_test_logging();

    // i = 0
    // while i < 3:
    //     print i, "!"
    //     i = i + 1
    // return i
    let mut b = CodeBuilder::new("count", "loop.py", 1);
    b.set_line(2);
    b.load_const(0).store_local("i");
    b.set_line(3);
    let top = b.current_offset();
    b.load_local("i").load_const(3).compare(ComparisonOp::Lt);
    let exit = b.emit_jump(Opcode::PopJumpIfFalse);
    b.set_line(4);
    b.load_local("i").print_item();
    b.load_const("!").print_item();
    b.print_newline();
    b.set_line(5);
    b.load_local("i").load_const(1).emit(Opcode::BinaryAdd).store_local("i");
    b.emit_jump_to(Opcode::JumpAbsolute, top);
    b.patch_jump(exit);
    b.set_line(6);
    b.load_local("i").return_value();
    let function = Function::new(Rc::new(b.build().unwrap()), Globals::new());

    let (handler, calls) = recording_handler();
    let rewritten = Rc::new(PrintRewriter::new(handler).rewrite(&function, Some(20)).unwrap());

    let mut vm = quiet_vm();
    assert_eq!(vm.call(&rewritten, &[]).unwrap(), Value::Int(3));

    let calls = calls.borrow();
    assert_eq!(calls.len(), 9);
    let fragments: Vec<String> = calls
        .iter()
        .map(|args| match &args[..] {
            [_, value] => value.to_string(),
            _ => "<flush>".to_string(),
        })
        .collect();
    assert_eq!(
        fragments,
        vec!["0", "!", "<flush>", "1", "!", "<flush>", "2", "!", "<flush>"]
    );

    let marker = PrintMarker::from_value(&calls[0][0]).unwrap();
    assert_eq!(marker.default_severity, Some(20));
    assert_eq!(marker.origin.identity(), function.code.identity());
}

#[test]
fn test_traceback_line_survives_rewrite() {
    // line 2: print "before"
    // line 3: raise "failed"
    let mut b = CodeBuilder::new("fails", "err.py", 1);
    b.set_line(2);
    b.load_const("before").print_item().print_newline();
    b.set_line(3);
    b.load_const("failed").emit(Opcode::RaiseError);
    let function = Function::new(Rc::new(b.build().unwrap()), Globals::new());

    let (handler, _calls) = recording_handler();
    let rewritten = PrintRewriter::new(handler).rewrite(&function, None).unwrap();

    let mut vm = quiet_vm();
    let original_error = vm.call(&Rc::new(function), &[]).unwrap_err();
    let rewritten_error = vm.call(&Rc::new(rewritten), &[]).unwrap_err();
    assert_eq!(original_error.line(), Some(3));
    assert_eq!(rewritten_error.line(), Some(3));
    assert_eq!(rewritten_error.traceback, original_error.traceback);
}

#[test]
fn test_handler_error_reports_print_line() {
    let mut b = CodeBuilder::new("f", "err.py", 1);
    b.set_line(7);
    b.load_const("x").print_item();
    b.set_line(8);
    b.load_const(Value::None).return_value();
    let function = Function::new(Rc::new(b.build().unwrap()), Globals::new());

    let failing = NativeFunction::new("handler", |_ctx, _args| {
        Err(crate::vm::RuntimeError::Raised {
            message: "handler failed".into(),
        }
        .into())
    });
    let rewritten = PrintRewriter::new(failing).rewrite(&function, None).unwrap();
    let err = quiet_vm().call(&Rc::new(rewritten), &[]).unwrap_err();
    assert_eq!(err.to_string(), "handler failed");
    assert_eq!(err.line(), Some(7));
}
