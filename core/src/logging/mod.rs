//! A logging facility whose messages can reference the caller's variables
//! and whose loggers can take over a function's print statements.
//!
//! ```text
//! LoggingConfig -> LoggerFactory -> Logger
//!                                     |-- log / info / ...      direct calls
//!                                     |-- native_method(level)  called from scripts
//!                                     `-- smart_print(function) redirected prints
//! ```

mod dispatcher;
mod error;
mod factory;
mod handler;
mod level;
mod logger;
mod options;
mod record;


pub use dispatcher::{Dispatcher, infer_severity};
pub use error::LogError;
pub use factory::LoggerFactory;
pub use handler::{Handler, MemoryHandler, TracingHandler};
pub use level::{Level, LevelRegistry};
pub use logger::Logger;
pub use options::{LogOptions, LoggingConfig, SmartPrintOptions};
pub use record::{Origin, Record};
