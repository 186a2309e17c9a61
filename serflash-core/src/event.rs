//! Timestamped, leveled events emitted by the core.
//!
//! The core never renders anything itself. Every operation reports through
//! an [`EventSink`], and the front-end decides how the stream is displayed.
//! Events from concurrent sources (operator commands, the port watcher,
//! programmer output readers) interleave arbitrarily, so every event is
//! self-describing.

use std::sync::Mutex;

use chrono::{DateTime, Local};

/// Severity or kind of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
    /// Raw output line from the programmer executable.
    Command,
}

/// A single log event. Immutable once created; ordering is arrival order.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

/// Abstract sink for log events and status-line updates.
///
/// Implementations must tolerate calls from the watcher and runner threads.
pub trait EventSink: Send + Sync {
    fn event(&self, event: LogEvent);

    /// Connection status line update. Front-ends without a status line can
    /// ignore it.
    fn status(&self, _connected: bool, _text: &str) {}

    fn emit(&self, level: Level, message: &str) {
        self.event(LogEvent::new(level, message));
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    fn success(&self, message: &str) {
        self.emit(Level::Success, message);
    }

    fn command(&self, message: &str) {
        self.emit(Level::Command, message);
    }
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn event(&self, _event: LogEvent) {}
}

/// Buffers events in memory, in arrival order.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Drains the buffer.
    pub fn take(&self) -> Vec<LogEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventSink for MemorySink {
    fn event(&self, event: LogEvent) {
        self.events.lock().unwrap().push(event);
    }
}
