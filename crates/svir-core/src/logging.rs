//! # Logging
//!
//! Level/tag-filtered event dispatch. The core never talks to a logging
//! backend directly: callers provide a sink, and the binary bridges events
//! into `tracing`. There is no process-wide logger state; a [`Logger`] is
//! passed through the pass context.

use std::collections::BTreeSet;
use std::fmt;

/// Severity levels, ordered. `Off` disables everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        };
        f.write_str(name)
    }
}

/// One dispatched log record.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: LogLevel,
    pub tag: String,
    pub message: String,
}

/// Sink callback receiving events that pass the filters.
pub type LogSink = Box<dyn Fn(&LogEvent)>;

/// Level- and tag-filtered dispatcher.
///
/// An event reaches the sink when `level >= threshold` and the tag
/// allow-list is empty or contains the tag.
pub struct Logger {
    threshold: LogLevel,
    allowed_tags: BTreeSet<String>,
    sink: Option<LogSink>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("threshold", &self.threshold)
            .field("allowed_tags", &self.allowed_tags)
            .finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Silent logger (threshold `Warn`, no sink).
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: LogLevel::Warn,
            allowed_tags: BTreeSet::new(),
            sink: None,
        }
    }

    /// Logger with a sink at the given threshold.
    #[must_use]
    pub fn with_sink(threshold: LogLevel, sink: LogSink) -> Self {
        Self {
            threshold,
            allowed_tags: BTreeSet::new(),
            sink: Some(sink),
        }
    }

    /// Replace the level threshold.
    pub fn set_level(&mut self, level: LogLevel) {
        self.threshold = level;
    }

    /// Current threshold.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.threshold
    }

    /// Add a tag to the allow-list. An empty allow-list admits every tag.
    pub fn allow_tag(&mut self, tag: &str) {
        self.allowed_tags.insert(tag.to_string());
    }

    /// True if an event at this level/tag would reach the sink.
    #[must_use]
    pub fn enabled(&self, level: LogLevel, tag: &str) -> bool {
        if level == LogLevel::Off || level < self.threshold {
            return false;
        }
        self.allowed_tags.is_empty() || self.allowed_tags.contains(tag)
    }

    /// Dispatch an event through the filters.
    pub fn log(&self, level: LogLevel, tag: &str, message: &str) {
        if !self.enabled(level, tag) {
            return;
        }
        if let Some(sink) = &self.sink {
            sink(&LogEvent {
                level,
                tag: tag.to_string(),
                message: message.to_string(),
            });
        }
    }

    /// Shorthand for debug-level events.
    pub fn debug(&self, tag: &str, message: &str) {
        self.log(LogLevel::Debug, tag, message);
    }

    /// Shorthand for trace-level events.
    pub fn trace(&self, tag: &str, message: &str) {
        self.log(LogLevel::Trace, tag, message);
    }
}

// =============================================================================
// TESTS
// =============================================================================
