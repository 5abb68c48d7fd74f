//! Engine of `smartlog`: a small bytecode interpreter whose functions a
//! logger can rewrite so that their print statements become log records,
//! plus message templates that read the caller's variables.
//!
//! Layers, leaves first:
//!
//! - [`values`], [`vm`]: runtime values, code objects, the interpreter.
//! - [`assembler`]: building well-formed code objects.
//! - [`template`], [`resolver`]: interpolation and call-stack lookups.
//! - [`rewrite`]: the print-redirecting bytecode pass.
//! - [`logging`]: levels, loggers, handlers and print dispatch.

pub mod assembler;
pub mod logging;
pub mod resolver;
pub mod rewrite;
pub mod scope;
pub mod template;
pub mod values;
pub mod vm;

pub use logging::{
    Handler, Level, LevelRegistry, LogError, LogOptions, Logger, LoggerFactory, LoggingConfig,
    MemoryHandler, Record, SmartPrintOptions, TracingHandler,
};
pub use rewrite::RewriteError;
pub use template::interpolate;
pub use values::{Function, Globals, NativeFunction, Value};
pub use vm::{ExecutionError, ExecutionOptions, VM};
