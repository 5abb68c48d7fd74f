//! End-to-end tests: decorating functions, running them, and checking the
//! records loggers emit.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use smartlog::values::new_cell;
use smartlog::vm::{ComparisonOp, Opcode};
use smartlog::{
    CodeBuilder, Error, ExecutionOptions, Function, Globals, Level, LoggerFactory, LoggingConfig,
    MemoryHandler, SharedWriter, SmartPrintOptions, VM, Value, render_error_to_string,
};

struct Harness {
    factory: LoggerFactory,
    memory: MemoryHandler,
    tee: Rc<RefCell<Vec<u8>>>,
    stdout: Rc<RefCell<Vec<u8>>>,
}

/// Routes `tracing` output through the test harness; set `RUST_LOG` to see it.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    fn new() -> Self {
        init_logging();
        let memory = MemoryHandler::new();
        let tee = Rc::new(RefCell::new(Vec::new()));
        let tee_writer: SharedWriter = tee.clone();
        let factory = LoggerFactory::new(LoggingConfig {
            default_level: Level::WARNING,
            handlers: vec![Rc::new(memory.clone())],
            tee: tee_writer,
            ..LoggingConfig::default()
        });
        Self {
            factory,
            memory,
            tee,
            stdout: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn vm(&self) -> VM {
        let stdout: SharedWriter = self.stdout.clone();
        VM::new(ExecutionOptions {
            stdout,
            ..ExecutionOptions::default()
        })
    }

    fn records(&self) -> Vec<(String, String)> {
        self.memory.messages()
    }

    fn tee_output(&self) -> String {
        String::from_utf8(self.tee.borrow().clone()).unwrap()
    }

    fn stdout_output(&self) -> String {
        String::from_utf8(self.stdout.borrow().clone()).unwrap()
    }
}

fn expected(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(level, message)| (level.to_string(), message.to_string()))
        .collect()
}

/// def test_print2():
///     a = 'local value test'
///     d = {1: 2, 3: None, '5': [7]}
///     print "hello2, {{a?}}"
///     print "info2, this is info, {{d?}}"
///     print "error2, this is error"
fn test_print2(globals: &Globals) -> Function {
    let mut b = CodeBuilder::new("test_print2", "test.py", 30);
    b.set_line(31);
    b.load_const("local value test").store_local("a");
    b.set_line(32);
    b.load_const(1).load_const(2);
    b.load_const(3).load_const(Value::None);
    b.load_const("5").load_const(7).emit_arg(Opcode::BuildList, 1);
    b.emit_arg(Opcode::BuildMap, 3).store_local("d");
    b.set_line(34);
    b.load_const("hello2, {{a?}}").print_item().print_newline();
    b.set_line(35);
    b.load_const("info2, this is info, {{d?}}").print_item().print_newline();
    b.set_line(36);
    b.load_const("error2, this is error").print_item().print_newline();
    b.load_const(Value::None).return_value();
    Function::new(Rc::new(b.build().unwrap()), globals.clone())
}

#[test]
fn test_default_severity_and_inference() {
    let harness = Harness::new();
    let log = harness.factory.get_logger("a");
    let options = SmartPrintOptions {
        default_severity: Some(Level::WARNING),
        ..SmartPrintOptions::default()
    };
    let decorated = Rc::new(
        log.smart_print_with(&test_print2(&Globals::new()), options)
            .unwrap(),
    );

    harness.vm().call(&decorated, &[]).unwrap();

    assert_eq!(
        harness.records(),
        expected(&[
            ("WARNING", "hello2, a:'local value test'"),
            ("INFO", "info2, this is info, d:{1: 2, 3: None, '5': [7]}"),
            ("ERROR", "error2, this is error"),
        ])
    );
    assert_eq!(harness.stdout_output(), "");
}

#[test]
fn test_undecorated_function_still_prints() {
    let harness = Harness::new();
    harness
        .vm()
        .call(&Rc::new(test_print2(&Globals::new())), &[])
        .unwrap();
    assert_eq!(
        harness.stdout_output(),
        "hello2, {{a?}}\ninfo2, this is info, {{d?}}\nerror2, this is error\n"
    );
    assert!(harness.records().is_empty());
}

#[test]
fn test_print_inside_loop_and_global_lookup() {
    // i = 0
    // while i < 3:
    //     print "debug, step", i, "of [[total]]"
    //     i = i + 1
    let harness = Harness::new();
    let log = harness.factory.get_logger("loop");
    let globals = Globals::new();
    globals.set("total", 3);

    let mut b = CodeBuilder::new("steps", "loop.py", 1);
    b.set_line(2);
    b.load_const(0).store_local("i");
    b.set_line(3);
    let top = b.current_offset();
    b.load_local("i").load_const(3).compare(ComparisonOp::Lt);
    let exit = b.emit_jump(Opcode::PopJumpIfFalse);
    b.set_line(4);
    b.load_const("debug, step").print_item();
    b.load_local("i").print_item();
    b.load_const("of [[total]]").print_item().print_newline();
    b.set_line(5);
    b.load_local("i").load_const(1).emit(Opcode::BinaryAdd).store_local("i");
    b.emit_jump_to(Opcode::JumpAbsolute, top);
    b.patch_jump(exit);
    b.set_line(6);
    b.load_local("i").return_value();
    let function = Function::new(Rc::new(b.build().unwrap()), globals);

    let decorated = Rc::new(log.smart_print(&function).unwrap());
    assert_eq!(harness.vm().call(&decorated, &[]).unwrap(), Value::Int(3));
    assert_eq!(
        harness.records(),
        expected(&[
            ("DEBUG", "debug, step 0 of 3"),
            ("DEBUG", "debug, step 1 of 3"),
            ("DEBUG", "debug, step 2 of 3"),
        ])
    );
}

#[test]
fn test_interpolation_uses_the_decorated_frame() {
    // def helper(x): print "warning, x is [[x]]"   (decorated)
    // def caller(): x = "caller's"; helper("helper's")
    let harness = Harness::new();
    let log = harness.factory.get_logger("frames");
    let globals = Globals::new();

    let mut helper = CodeBuilder::new("helper", "frames.py", 1);
    helper.param("x");
    helper.set_line(2);
    helper.load_const("warning, x is [[x]]").print_item().print_newline();
    helper.load_const(Value::None).return_value();
    let helper = Function::new(Rc::new(helper.build().unwrap()), globals.clone());
    globals.set(
        "helper",
        Value::Function(Rc::new(log.smart_print(&helper).unwrap())),
    );

    let mut caller = CodeBuilder::new("caller", "frames.py", 4);
    caller.set_line(5);
    caller.load_const("caller's").store_local("x");
    caller.set_line(6);
    caller
        .load_global("helper")
        .load_const("helper's")
        .call(1)
        .return_value();
    let caller = Rc::new(Function::new(Rc::new(caller.build().unwrap()), globals));

    harness.vm().call(&caller, &[]).unwrap();
    assert_eq!(
        harness.records(),
        expected(&[("WARNING", "warning, x is helper's")])
    );
    let origin = harness.memory.records()[0].origin.clone().unwrap();
    assert_eq!((origin.function.as_str(), origin.line), ("helper", 2));
}

#[test]
fn test_closure_variables_are_visible() {
    // def report(): print "critical, {{what}} is down"   with `what` captured
    let harness = Harness::new();
    let log = harness.factory.get_logger("closure");

    let mut b = CodeBuilder::new("report", "closure.py", 10);
    b.free_var("what");
    b.set_line(11);
    b.load_const("critical, {{what}} is down").print_item().print_newline();
    b.load_const(Value::None).return_value();
    let function = Function::new(Rc::new(b.build().unwrap()), Globals::new())
        .with_closure(vec![new_cell(Some(Value::str("db")))]);

    let decorated = Rc::new(log.smart_print(&function).unwrap());
    harness.vm().call(&decorated, &[]).unwrap();
    assert_eq!(
        harness.records(),
        expected(&[("CRITICAL", "critical, 'db' is down")])
    );
}

#[test]
fn test_tee_and_threshold_for_script_logging() {
    // def main():
    //     user = "ann"
    //     info("login [[user]]")          below threshold
    //     warn("slow {{user?}}", True)
    let harness = Harness::new();
    let log = harness.factory.get_logger("script");
    let globals = Globals::new();
    globals.set("info", Value::Native(log.native_method(Level::INFO)));
    globals.set("warn", Value::Native(log.native_method(Level::WARNING)));

    let mut b = CodeBuilder::new("main", "script.py", 1);
    b.set_line(2);
    b.load_const("ann").store_local("user");
    b.set_line(3);
    b.load_global("info").load_const("login [[user]]").call(1).pop_top();
    b.set_line(4);
    b.load_global("warn")
        .load_const("slow {{user?}}")
        .load_const(true)
        .call(2)
        .pop_top();
    b.load_const(Value::None).return_value();
    let main = Rc::new(Function::new(Rc::new(b.build().unwrap()), globals));

    harness.vm().call(&main, &[]).unwrap();
    assert_eq!(harness.records(), expected(&[("WARNING", "slow user:'ann'")]));
    assert_eq!(harness.tee_output(), "slow user:'ann'\n");
}

#[test]
fn test_error_after_redirected_print_renders_traceback() {
    // def fail():
    //     print "error, about to fail"
    //     raise "boom"
    let harness = Harness::new();
    let log = harness.factory.get_logger("fail");
    let mut b = CodeBuilder::new("fail", "fail.py", 1);
    b.set_line(2);
    b.load_const("error, about to fail").print_item().print_newline();
    b.set_line(3);
    b.load_const("boom").emit(Opcode::RaiseError);
    b.load_const(Value::None).return_value();
    let function = Function::new(Rc::new(b.build().unwrap()), Globals::new());

    let decorated = Rc::new(log.smart_print(&function).unwrap());
    let err = harness.vm().call(&decorated, &[]).unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert_eq!(harness.records(), expected(&[("ERROR", "error, about to fail")]));
    assert_eq!(
        render_error_to_string(&Error::from(err)),
        "Traceback (most recent call last):\n  \
         File \"fail.py\", line 3, in fail\n\
         RuntimeError: boom\n"
    );
}
