//! Configuration for loggers and decorations.

use core::fmt;
use std::rc::Rc;

use super::handler::{Handler, TracingHandler};
use super::level::{Level, LevelRegistry};
use crate::vm::{SharedWriter, stdout_writer};

/// Everything a [`LoggerFactory`](super::LoggerFactory) needs, fixed at
/// construction.
///
/// # Example
///
/// ```ignore
/// let memory = MemoryHandler::new();
/// let config = LoggingConfig {
///     default_level: Level::DEBUG,
///     handlers: vec![Rc::new(memory.clone())],
///     ..LoggingConfig::default()
/// };
/// let log = LoggerFactory::new(config).get_logger("app");
/// ```
#[derive(Clone)]
pub struct LoggingConfig {
    /// Threshold of newly created loggers.
    ///
    /// Default: `Level::WARNING`
    pub default_level: Level,

    /// Level names, used for severity inference and record level names.
    pub levels: LevelRegistry,

    /// Handlers every new logger starts with.
    ///
    /// Default: a single [`TracingHandler`]
    pub handlers: Vec<Rc<dyn Handler>>,

    /// Destination of tee'd messages.
    ///
    /// Default: standard output
    pub tee: SharedWriter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARNING,
            levels: LevelRegistry::default(),
            handlers: vec![Rc::new(TracingHandler)],
            tee: stdout_writer(),
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("default_level", &self.default_level)
            .field("levels", &self.levels)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

/// Options of a `smart_print` decoration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartPrintOptions {
    /// Severity of printed messages that do not start with a level name.
    /// `None` falls back to the logger's threshold.
    pub default_severity: Option<Level>,

    /// Also write each flushed message to the tee writer.
    pub tee_stdout: bool,
}

/// Options of a direct logging call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Write the substituted message to the tee writer before emitting.
    pub tee_stdout: bool,
}
