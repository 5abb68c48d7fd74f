//! Named loggers.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

use ecow::EcoString;

use super::dispatcher::{Dispatcher, print_handler};
use super::error::LogError;
use super::handler::Handler;
use super::level::{Level, LevelRegistry};
use super::options::{LogOptions, SmartPrintOptions};
use super::record::{Origin, Record};
use crate::resolver::resolve_caller_context;
use crate::rewrite::{PrintRewriter, RewriteError};
use crate::scope::BindingContext;
use crate::template::interpolate;
use crate::values::{Function, NativeFunction, Value};
use crate::vm::{RuntimeError, SharedWriter};

struct LoggerState {
    name: EcoString,
    level: Cell<Level>,
    handlers: RefCell<Vec<Rc<dyn Handler>>>,
    registry: Rc<LevelRegistry>,
    tee: SharedWriter,
    dispatcher: RefCell<Dispatcher>,
}

/// A named logger. Clones refer to the same logger.
///
/// Obtained from [`LoggerFactory::get_logger`](super::LoggerFactory::get_logger).
#[derive(Clone)]
pub struct Logger(Rc<LoggerState>);

impl Logger {
    pub(super) fn new(
        name: EcoString,
        level: Level,
        handlers: Vec<Rc<dyn Handler>>,
        registry: Rc<LevelRegistry>,
        tee: SharedWriter,
    ) -> Self {
        Logger(Rc::new(LoggerState {
            name,
            level: Cell::new(level),
            handlers: RefCell::new(handlers),
            registry,
            tee,
            dispatcher: RefCell::new(Dispatcher::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn level(&self) -> Level {
        self.0.level.get()
    }

    pub fn set_level(&self, level: Level) {
        self.0.level.set(level);
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.0.level.get()
    }

    pub fn add_handler(&self, handler: Rc<dyn Handler>) {
        self.0.handlers.borrow_mut().push(handler);
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.0.registry
    }

    pub(super) fn dispatcher(&self) -> &RefCell<Dispatcher> {
        &self.0.dispatcher
    }

    /// Number of invocations with buffered, not yet flushed print output.
    pub fn pending_prints(&self) -> usize {
        self.0.dispatcher.borrow().pending()
    }

    pub fn ptr_eq(&self, other: &Logger) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Interpolate `template` against `context` and emit it at `level`,
    /// unless the level is below the threshold.
    pub fn log(
        &self,
        level: Level,
        template: &str,
        context: &BindingContext<'_>,
        options: LogOptions,
    ) -> Result<(), LogError> {
        if !self.is_enabled_for(level) {
            return Ok(());
        }
        let message = interpolate(template, context);
        self.emit(level, message, None, options.tee_stdout)
    }

    pub fn debug(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.log(Level::DEBUG, template, context, LogOptions::default())
    }

    pub fn info(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.log(Level::INFO, template, context, LogOptions::default())
    }

    pub fn warning(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.log(Level::WARNING, template, context, LogOptions::default())
    }

    /// Alias of [`warning`](Self::warning).
    pub fn warn(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.warning(template, context)
    }

    pub fn error(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.log(Level::ERROR, template, context, LogOptions::default())
    }

    pub fn critical(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.log(Level::CRITICAL, template, context, LogOptions::default())
    }

    /// Alias of [`critical`](Self::critical).
    pub fn fatal(&self, template: &str, context: &BindingContext<'_>) -> Result<(), LogError> {
        self.critical(template, context)
    }

    /// Tee if requested, then hand one record to every handler. Does not
    /// check the threshold.
    pub(super) fn emit(
        &self,
        level: Level,
        message: String,
        origin: Option<Origin>,
        tee: bool,
    ) -> Result<(), LogError> {
        if tee {
            let mut out = self.0.tee.borrow_mut();
            writeln!(out, "{}", message)?;
            out.flush()?;
        }

        let record = Record {
            logger: self.0.name.clone(),
            level,
            level_name: self.0.registry.name_of(level),
            message,
            origin,
        };
        // Handlers may add handlers; iterate over a snapshot.
        let handlers = self.0.handlers.borrow().clone();
        for handler in &handlers {
            handler.handle(&record);
        }
        Ok(())
    }

    /// A native function logging at `level` from script code.
    ///
    /// Scripts call it as `f(template)` or `f(template, tee)`; markers in the
    /// template resolve against the calling frame.
    pub fn native_method(&self, level: Level) -> NativeFunction {
        let logger = self.clone();
        let name = ecow::eco_format!(
            "{}.{}",
            self.name(),
            self.0.registry.name_of(level).to_lowercase()
        );
        let function = name.clone();
        NativeFunction::new(name, move |ctx, args| {
            let (template, tee) = match args {
                [template] => (template, false),
                [template, tee] => (template, tee.is_truthy()),
                _ => {
                    return Err(RuntimeError::Arity {
                        function: function.clone(),
                        expected: "1 to 2".into(),
                        given: args.len(),
                    }
                    .into());
                }
            };
            if !logger.is_enabled_for(level) {
                return Ok(Value::None);
            }
            let context = resolve_caller_context(ctx, 0)?;
            let message = interpolate(&template.to_string(), &context);
            let origin = ctx.frames().last().map(Origin::of);
            logger.emit(level, message, origin, tee)?;
            Ok(Value::None)
        })
    }

    /// Redirect the print statements of `function` into this logger.
    pub fn smart_print(&self, function: &Function) -> Result<Function, RewriteError> {
        self.smart_print_with(function, SmartPrintOptions::default())
    }

    pub fn smart_print_with(
        &self,
        function: &Function,
        options: SmartPrintOptions,
    ) -> Result<Function, RewriteError> {
        let handler = print_handler(self.clone(), options.tee_stdout);
        PrintRewriter::new(handler).rewrite(function, options.default_severity.map(Level::value))
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.0.name)
            .field("level", &self.0.level.get())
            .field("handlers", &self.0.handlers.borrow().len())
            .finish()
    }
}
