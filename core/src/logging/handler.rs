//! Record sinks.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use super::record::Record;

/// Receives every record a logger emits.
pub trait Handler: fmt::Debug {
    fn handle(&self, record: &Record);
}

/// Forwards records to `tracing` at the closest matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

macro_rules! forward {
    ($level:expr, $record:expr) => {{
        let record = $record;
        let origin = record.origin.as_ref();
        tracing::event!(
            $level,
            logger = %record.logger,
            severity = %record.level_name,
            function = origin.map(|o| o.function.as_str()),
            filename = origin.map(|o| o.filename.as_str()),
            line = origin.map(|o| o.line),
            "{}",
            record.message
        )
    }};
}

impl Handler for TracingHandler {
    fn handle(&self, record: &Record) {
        match record.level.to_tracing() {
            tracing::Level::ERROR => forward!(tracing::Level::ERROR, record),
            tracing::Level::WARN => forward!(tracing::Level::WARN, record),
            tracing::Level::INFO => forward!(tracing::Level::INFO, record),
            tracing::Level::DEBUG => forward!(tracing::Level::DEBUG, record),
            _ => forward!(tracing::Level::TRACE, record),
        }
    }
}

/// Keeps every record in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandler {
    records: Rc<RefCell<Vec<Record>>>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.borrow().clone()
    }

    /// `(level name, message)` of every record, oldest first.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.records
            .borrow()
            .iter()
            .map(|r| (r.level_name.to_string(), r.message.clone()))
            .collect()
    }

    pub fn take(&self) -> Vec<Record> {
        self.records.take()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl Handler for MemoryHandler {
    fn handle(&self, record: &Record) {
        self.records.borrow_mut().push(record.clone());
    }
}
