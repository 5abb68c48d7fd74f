//! Severity levels and the name registry used to infer them from text.

use core::fmt;

use ecow::{EcoString, eco_format};

/// A numeric severity. Larger is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub u32);

impl Level {
    pub const NOTSET: Level = Level(0);
    pub const DEBUG: Level = Level(10);
    pub const INFO: Level = Level(20);
    pub const WARNING: Level = Level(30);
    pub const ERROR: Level = Level(40);
    pub const CRITICAL: Level = Level(50);

    pub fn value(self) -> u32 {
        self.0
    }

    /// The closest `tracing` level at or below this severity.
    pub fn to_tracing(self) -> tracing::Level {
        match self.0 {
            n if n >= Level::ERROR.0 => tracing::Level::ERROR,
            n if n >= Level::WARNING.0 => tracing::Level::WARN,
            n if n >= Level::INFO.0 => tracing::Level::INFO,
            n if n >= Level::DEBUG.0 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Level {
    fn from(value: u32) -> Self {
        Level(value)
    }
}

/// Ordered mapping of level names to levels.
///
/// Order matters twice: [`infer`](Self::infer) returns the first name a
/// message starts with, and [`name_of`](Self::name_of) the first name
/// registered for a level.
#[derive(Debug, Clone)]
pub struct LevelRegistry {
    entries: Vec<(EcoString, Level)>,
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                ("CRITICAL".into(), Level::CRITICAL),
                ("FATAL".into(), Level::CRITICAL),
                ("ERROR".into(), Level::ERROR),
                ("WARNING".into(), Level::WARNING),
                ("WARN".into(), Level::WARNING),
                ("INFO".into(), Level::INFO),
                ("DEBUG".into(), Level::DEBUG),
                ("NOTSET".into(), Level::NOTSET),
            ],
        }
    }
}

impl LevelRegistry {
    /// A registry with no names at all.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `name` for `level`. Re-registering a name moves it to the
    /// new level but keeps its position.
    pub fn add_level(&mut self, name: impl Into<EcoString>, level: Level) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = level,
            None => self.entries.push((name, level)),
        }
        self
    }

    pub fn level_named(&self, name: &str) -> Option<Level> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, level)| *level)
    }

    pub fn name_of(&self, level: Level) -> EcoString {
        self.entries
            .iter()
            .find(|(_, l)| *l == level)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| eco_format!("Level {}", level.0))
    }

    /// Level of the first registered name `message` starts with, ignoring
    /// case.
    pub fn infer(&self, message: &str) -> Option<Level> {
        self.entries
            .iter()
            .find(|(name, _)| {
                message
                    .get(..name.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name))
            })
            .map(|(_, level)| *level)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Level)> {
        self.entries.iter().map(|(name, level)| (name.as_str(), *level))
    }
}
