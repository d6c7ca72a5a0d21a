//! Host Logging Abstraction
//!
//! Lets the core mirror its structured logs into the host logging pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Target module/component (e.g. `core_location::session`, `renderer`)
    pub target: String,
    pub message: String,
    /// Structured fields, ordered by key
    pub fields: BTreeMap<String, String>,
    /// Name of the enclosing span, if any
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the core to host logging pipelines:
/// - **Android**: Logcat (tag per target)
/// - **iOS**: OSLog
/// - **Desktop**: console or file logs
///
/// Implementations must not log raw coordinates in release builds; the core
/// already coarsens them when PII redaction is enabled.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Minimum level this sink wants to receive
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Sink printing to stderr, for development hosts.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl ConsoleLogger {
    fn format(entry: &LogEntry) -> String {
        let mut line = format!(
            "[{}] {} {}: {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.level.as_str(),
            entry.target,
            entry.message
        );
        for (key, value) in &entry.fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        line
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            eprintln!("{}", Self::format(&entry));
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Info, "renderer", "page loaded")
            .with_field("url", "index.html")
            .with_span("bridge");

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "renderer");
        assert_eq!(entry.message, "page loaded");
        assert_eq!(entry.fields.get("url"), Some(&"index.html".to_string()));
        assert_eq!(entry.span, Some("bridge".to_string()));
    }

    #[test]
    fn test_console_format_includes_fields_in_order() {
        let entry = LogEntry::new(LogLevel::Warn, "core_location", "provider error")
            .with_field("b", "2")
            .with_field("a", "1");

        let line = ConsoleLogger::format(&entry);
        assert!(line.contains("WARN core_location: provider error a=1 b=2"));
    }

    #[tokio::test]
    async fn test_console_logger() {
        let logger = ConsoleLogger::default();
        let entry = LogEntry::new(LogLevel::Info, "test", "Test log");

        logger.log(entry).await.unwrap();
    }
}
