use ecow::EcoString;

use super::level::Level;
use crate::vm::Frame;

/// Where a record was produced in script code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub function: EcoString,
    pub filename: EcoString,
    pub line: u32,
}

impl Origin {
    pub fn of(frame: &Frame) -> Self {
        let entry = frame.trace_entry();
        Self {
            function: entry.function,
            filename: entry.filename,
            line: entry.line,
        }
    }
}

/// One emitted log record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub logger: EcoString,
    pub level: Level,
    pub level_name: EcoString,
    /// Message with template markers already substituted.
    pub message: String,
    pub origin: Option<Origin>,
}
