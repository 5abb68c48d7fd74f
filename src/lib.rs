//! smartlog - logging with caller-aware templates and print redirection
//!
//! # Overview
//!
//! Loggers created here can do two things an ordinary logger cannot:
//!
//! - Interpolate the caller's variables into messages: `[[name]]` inserts
//!   the plain form of `name`, `{{name}}` its diagnostic form, and a
//!   trailing `?` (`[[name?]]`) prefixes the value with `name:`.
//! - Take over the `print` statements of a function. Each print statement
//!   becomes one record, whose severity is inferred from the level name the
//!   message starts with (`"error, disk full"` is an `ERROR` record).
//!
//! Functions are bytecode functions of the embedded interpreter, built with
//! [`CodeBuilder`] and run by a [`VM`].
//!
//! # Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use smartlog::{CodeBuilder, Function, Globals, LoggerFactory, LoggingConfig, VM};
//!
//! let factory = LoggerFactory::new(LoggingConfig::default());
//! let log = factory.get_logger("app");
//!
//! // def report():
//! //     total = 42
//! //     print "info, total is [[total]]"
//! let mut b = CodeBuilder::new("report", "app.py", 1);
//! b.set_line(2).load_const(42).store_local("total");
//! b.set_line(3).load_const("info, total is [[total]]").print_item().print_newline();
//! b.load_const(smartlog::Value::None).return_value();
//! let report = Function::new(Rc::new(b.build()?), Globals::new());
//!
//! // Emits an INFO record "info, total is 42" instead of printing.
//! let report = Rc::new(log.smart_print(&report)?);
//! VM::new(Default::default()).call(&report, &[])?;
//! ```

mod error_renderer;

pub use error_renderer::{render_error, render_error_to, render_error_to_string};

// Re-export public API from smartlog_core
pub use smartlog_core::assembler::{AssembleError, CodeBuilder};
pub use smartlog_core::logging::{
    self, Handler, Level, LevelRegistry, LogError, LogOptions, Logger, LoggerFactory,
    LoggingConfig, MemoryHandler, Origin, Record, SmartPrintOptions, TracingHandler,
};
pub use smartlog_core::rewrite::RewriteError;
pub use smartlog_core::scope::{BindingContext, Bindings};
pub use smartlog_core::template::interpolate;
pub use smartlog_core::values::{self, Function, Globals, NativeFunction, Value};
pub use smartlog_core::vm::{
    self, CallContext, ExecutionError, ExecutionOptions, SharedWriter, TraceEntry, VM,
};

/// Any error the public API can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("cannot redirect prints: {0}")]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("logging failed: {0}")]
    Log(#[from] LogError),
}
