use core::cell::RefCell;
use std::rc::Rc;

use ecow::EcoString;
use hashbrown::HashMap;

use super::level::LevelRegistry;
use super::logger::Logger;
use super::options::LoggingConfig;

/// Creates loggers from one [`LoggingConfig`] and hands out the same logger
/// for the same name.
#[derive(Debug)]
pub struct LoggerFactory {
    config: LoggingConfig,
    registry: Rc<LevelRegistry>,
    loggers: RefCell<HashMap<EcoString, Logger>>,
}

impl LoggerFactory {
    pub fn new(config: LoggingConfig) -> Self {
        let registry = Rc::new(config.levels.clone());
        Self {
            config,
            registry,
            loggers: RefCell::new(HashMap::new()),
        }
    }

    pub fn get_logger(&self, name: &str) -> Logger {
        if let Some(logger) = self.loggers.borrow().get(name) {
            return logger.clone();
        }

        tracing::debug!(logger = name, level = %self.config.default_level, "creating logger");
        let logger = Logger::new(
            name.into(),
            self.config.default_level,
            self.config.handlers.clone(),
            self.registry.clone(),
            self.config.tee.clone(),
        );
        self.loggers.borrow_mut().insert(name.into(), logger.clone());
        logger
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }
}

impl Default for LoggerFactory {
    fn default() -> Self {
        Self::new(LoggingConfig::default())
    }
}
