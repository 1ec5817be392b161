//! Structured JSON logger
//!
//! - One log line = one event, encoded as a JSON object
//! - `event` first, then `severity`, then fields in alphabetical order
//! - Synchronous, no buffering
//! - Events below the minimum severity of the thread's logger are dropped
//! - Written to stderr so that query results on stdout stay clean
//!
//! Each session owns a [`Logger`] and attaches it to the threads doing its
//! work, so sessions with different levels do not interfere. A thread with
//! no attached logger logs at INFO.

use std::cell::Cell;
use std::fmt;
use std::io::{self, Write};

use serde_json::{Map, Value};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Engine defects
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Parses a configured level name (case-insensitive)
    pub fn parse(level: &str) -> Option<Self> {
        match level.to_ascii_lowercase().as_str() {
            "trace" => Some(Severity::Trace),
            "info" => Some(Severity::Info),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            "fatal" => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

thread_local! {
    static CURRENT: Cell<Option<Logger>> = const { Cell::new(None) };
}

/// A structured logger that outputs JSON lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logger {
    min_severity: Severity,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}

impl Logger {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    /// Returns true if events at this severity are written
    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// The logger attached to this thread
    pub fn current() -> Logger {
        CURRENT.with(|current| current.get()).unwrap_or_default()
    }

    /// Attaches this logger to the calling thread until the guard drops
    pub fn attach(self) -> LoggerGuard {
        let previous = CURRENT.with(|current| current.replace(Some(self)));
        LoggerGuard { previous }
    }

    /// Attaches this logger to the calling thread for the thread's lifetime
    pub fn attach_for_thread(self) {
        CURRENT.with(|current| current.set(Some(self)));
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::current().enabled(severity) {
            return;
        }
        let line = Self::render(severity, event, fields);
        Self::write_line(&mut io::stderr().lock(), &line);
    }

    /// Renders one event as a single JSON line
    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);

        let mut record = Map::with_capacity(fields.len() + 2);
        record.insert("event".into(), Value::from(event));
        record.insert("severity".into(), Value::from(severity.as_str()));
        for (key, value) in sorted {
            record.insert((*key).to_string(), Value::from(*value));
        }

        let mut line = Value::Object(record).to_string();
        line.push('\n');
        line
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        // A failed log write must never fail the query
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Restores the previously attached logger on drop
#[must_use = "the logger is detached when the guard drops"]
pub struct LoggerGuard {
    previous: Option<Logger>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.previous));
    }
}

/// Capture logs to a buffer for testing
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::write_line(&mut buffer, &Logger::render(severity, event, fields));
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("WARN"), Some(Severity::Warn));
        assert_eq!(Severity::parse("trace"), Some(Severity::Trace));
        assert_eq!(Severity::parse("verbose"), None);
    }

    #[test]
    fn test_attached_logger_is_scoped() {
        assert_eq!(Logger::current(), Logger::default());
        {
            let _warn = Logger::new(Severity::Warn).attach();
            assert!(!Logger::current().enabled(Severity::Info));
            {
                let _trace = Logger::new(Severity::Trace).attach();
                assert_eq!(Logger::current().min_severity(), Severity::Trace);
            }
            assert_eq!(Logger::current().min_severity(), Severity::Warn);
        }
        assert_eq!(Logger::current().min_severity(), Severity::Info);
    }

    #[test]
    fn test_loggers_are_per_thread() {
        let _error = Logger::new(Severity::Error).attach();
        let other = std::thread::spawn(Logger::current).join().unwrap();
        assert_eq!(other.min_severity(), Severity::Info);
        assert_eq!(Logger::current().min_severity(), Severity::Error);
    }

    #[test]
    fn test_log_json_format() {
        let output = capture_log(Severity::Info, "QUERY_BEGIN", &[]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "QUERY_BEGIN");
        assert_eq!(parsed["severity"], "INFO");
    }

    #[test]
    fn test_log_deterministic_ordering() {
        let output1 = capture_log(
            Severity::Info,
            "SHUFFLE_COMPLETE",
            &[("zebra", "1"), ("apple", "2"), ("mango", "3")],
        );
        let output2 = capture_log(
            Severity::Info,
            "SHUFFLE_COMPLETE",
            &[("apple", "2"), ("mango", "3"), ("zebra", "1")],
        );

        assert_eq!(output1, output2);

        let parsed: Map<String, Value> = serde_json::from_str(&output1).unwrap();
        let keys: Vec<&str> = parsed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["event", "severity", "apple", "mango", "zebra"]);
    }

    #[test]
    fn test_log_escapes_special_chars() {
        let output = capture_log(
            Severity::Error,
            "QUERY_REJECTED",
            &[("message", "bad \"key\"\nat line 2")],
        );

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["message"], "bad \"key\"\nat line 2");
    }

    #[test]
    fn test_log_one_line() {
        let output = capture_log(Severity::Info, "SOURCE_INGESTED", &[("location", "a\nb")]);

        assert_eq!(output.matches('\n').count(), 1);
        assert!(output.ends_with('\n'));
    }
}
