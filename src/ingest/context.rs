//! Per-message log context passed explicitly through the pipeline

use log::Level;

/// Destination for pipeline log records.
///
/// The orchestrator creates one sink per message and hands it to every
/// step, so each record keeps the message id and sender it belongs to.
pub trait LogSink: Send + Sync {
    fn record(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.record(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}

/// Forwards to the `log` facade with a `[message_id sender]` prefix
#[derive(Debug, Clone)]
pub struct MessageLog {
    pub message_id: String,
    pub sender: Option<String>,
}

impl MessageLog {
    pub fn new(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            sender: None,
        }
    }

    pub fn with_sender(&self, sender: &str) -> Self {
        Self {
            message_id: self.message_id.clone(),
            sender: Some(sender.to_string()),
        }
    }
}

impl LogSink for MessageLog {
    fn record(&self, level: Level, message: &str) {
        match &self.sender {
            Some(sender) => log::log!(target: "daycare_reports::ingest", level, "[{} {}] {}", self.message_id, sender, message),
            None => log::log!(target: "daycare_reports::ingest", level, "[{}] {}", self.message_id, message),
        }
    }
}

/// Sink that drops everything; for callers that parse outside a sync run
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl LogSink for NullLog {
    fn record(&self, _level: Level, _message: &str) {}
}
