//! Structured JSON-line logging for render sessions.
//!
//! Events carry a target such as `bedrock_ui::session` plus arbitrary JSON
//! fields. Sinks decide where the line goes; the session never fails because a
//! sink did.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

pub type LogFields = Map<String, Value>;

pub const SESSION_TARGET: &str = "bedrock_ui::session";
pub const SUSPENSE_TARGET: &str = "bedrock_ui::suspense";
pub const METRICS_TARGET: &str = "bedrock_ui::session.metrics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub ts_ms: u128,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "LogFields::is_empty", default)]
    pub fields: LogFields,
}

impl LogEvent {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ts_ms: current_ms(),
            level,
            target: target.into(),
            message: message.into(),
            fields: LogFields::new(),
        }
    }

    pub fn with_fields(
        level: LogLevel,
        target: impl Into<String>,
        message: impl Into<String>,
        fields: LogFields,
    ) -> Self {
        Self {
            fields,
            ..Self::new(level, target, message)
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

fn current_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

pub type LoggingResult<T> = std::result::Result<T, LoggingError>;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("log sink poisoned")]
    Poisoned,
}

pub trait LogSink: Send + Sync {
    fn log(&self, event: &LogEvent) -> LoggingResult<()>;
}

/// Cheap handle over a shared sink.
///
/// Scoped fields added with [`with_field`](Self::with_field) are stamped on
/// every event that does not already carry the key, so one logger per
/// session tags all of that session's lines with its player.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    min_level: LogLevel,
    scope: LogFields,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new<S>(sink: S) -> Self
    where
        S: LogSink + 'static,
    {
        Self {
            sink: Arc::new(sink),
            min_level: LogLevel::Trace,
            scope: LogFields::new(),
        }
    }

    /// Drop events below `level` before they reach the sink.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.scope.insert(key.to_string(), value.into());
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn log(&self, level: LogLevel, target: &str, message: &str) -> LoggingResult<()> {
        self.log_event(LogEvent::new(level, target, message))
    }

    pub fn log_event(&self, mut event: LogEvent) -> LoggingResult<()> {
        if !self.enabled(event.level) {
            return Ok(());
        }
        for (key, value) in &self.scope {
            event
                .fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self.sink.log(&event)
    }
}

/// Appends one JSON object per line.
///
/// Once a line would push the file past `max_bytes` the current file moves
/// to `<path>.1`, replacing any older generation, and a fresh file starts.
/// `max_bytes == 0` never rotates.
pub struct FileSink {
    path: PathBuf,
    max_bytes: u64,
    state: Mutex<FileState>,
}

struct FileState {
    writer: BufWriter<File>,
    written: u64,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>, max_bytes: u64) -> LoggingResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            state: Mutex::new(FileState {
                writer: BufWriter::new(file),
                written,
            }),
        })
    }

    pub fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".1");
        PathBuf::from(name)
    }

    fn append(&self, line: &[u8]) -> LoggingResult<()> {
        let mut state = self.state.lock().map_err(|_| LoggingError::Poisoned)?;
        let incoming = line.len() as u64;
        if self.max_bytes > 0 && state.written > 0 && state.written + incoming > self.max_bytes {
            state.writer.flush()?;
            std::fs::rename(&self.path, self.rotated_path())?;
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            state.writer = BufWriter::new(file);
            state.written = 0;
        }
        state.writer.write_all(line)?;
        state.writer.flush()?;
        state.written += incoming;
        Ok(())
    }
}

impl LogSink for FileSink {
    fn log(&self, event: &LogEvent) -> LoggingResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.append(&line)
    }
}

/// Keeps events in memory; cloning shares the buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.message).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, event: &LogEvent) -> LoggingResult<()> {
        let mut guard = self.events.lock().map_err(|_| LoggingError::Poisoned)?;
        guard.push(event.clone());
        Ok(())
    }
}

pub fn event_with_fields(
    level: LogLevel,
    target: &str,
    message: &str,
    fields: impl IntoIterator<Item = (String, Value)>,
) -> LogEvent {
    let map: LogFields = fields.into_iter().collect();
    LogEvent::with_fields(level, target, message, map)
}

pub fn json_kv(key: &str, value: impl Into<Value>) -> (String, Value) {
    (key.to_string(), value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_sink_records_fields() {
        let sink = MemorySink::new();
        let logger = Logger::new(sink.clone());
        let event = event_with_fields(
            LogLevel::Info,
            SESSION_TARGET,
            "form_shown",
            [json_kv("bytes", json!(42))],
        );
        logger.log_event(event).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("bytes"), Some(&json!(42)));
    }

    #[test]
    fn min_level_filters_events() {
        let sink = MemorySink::new();
        let logger = Logger::new(sink.clone()).with_min_level(LogLevel::Warn);
        logger.log(LogLevel::Debug, SESSION_TARGET, "noise").unwrap();
        logger.log(LogLevel::Error, SESSION_TARGET, "boom").unwrap();
        assert_eq!(sink.messages(), vec!["boom".to_string()]);
    }

    #[test]
    fn scoped_fields_do_not_override_event_fields() {
        let sink = MemorySink::new();
        let logger = Logger::new(sink.clone())
            .with_field("player", "p-1")
            .with_field("phase", "scope");
        let event = event_with_fields(
            LogLevel::Info,
            SESSION_TARGET,
            "form_shown",
            [json_kv("phase", "event")],
        );
        logger.log_event(event).unwrap();

        let events = sink.events();
        assert_eq!(events[0].field("player"), Some(&json!("p-1")));
        assert_eq!(events[0].field("phase"), Some(&json!("event")));
    }

    #[test]
    fn file_sink_keeps_one_rotated_generation() {
        let dir = std::env::temp_dir().join(format!("bedrock_ui_log_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.log");
        let _ = std::fs::remove_file(&path);
        let sink = FileSink::new(&path, 64).unwrap();
        let logger = Logger::new(sink);
        for i in 0..3 {
            logger
                .log(LogLevel::Info, SESSION_TARGET, &format!("line_{i}"))
                .unwrap();
        }

        let current = std::fs::read_to_string(&path).unwrap();
        let rotated = std::fs::read_to_string(dir.join("session.log.1")).unwrap();
        assert!(current.contains("line_2"));
        assert!(rotated.contains("line_1"));
        assert!(!current.contains("line_0") && !rotated.contains("line_0"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn events_serialize_without_empty_fields() {
        let event = LogEvent::new(LogLevel::Warn, SUSPENSE_TARGET, "timed_out");
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains("\"level\":\"warn\""));
        assert!(!line.contains("fields"));
    }
}
