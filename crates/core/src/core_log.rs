use std::sync::Arc;

use parking_lot::Mutex;

/// Minimal logger for core so we don't depend on any logging backend.
/// Implement this in the CLI (or any other host) and hand it to the engine.
pub trait CoreLog: Send + Sync {
    fn info(&self, msg: &str) {
        let _ = msg;
    }
    fn warn(&self, msg: &str) {
        let _ = msg;
    }
    fn error(&self, msg: &str) {
        let _ = msg;
    }
    fn debug(&self, msg: &str) {
        let _ = msg;
    }
}

/// No-op logger if you don't care about logs.
pub struct NoopLog;
impl CoreLog for NoopLog {}

/// Shared no-op logger, used as the default by every engine component.
pub fn noop() -> Arc<dyn CoreLog> {
    Arc::new(NoopLog)
}

/// Captures log lines in memory as `"LEVEL: message"`.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// True if any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    fn push(&self, level: &str, msg: &str) {
        self.lines.lock().push(format!("{level}: {msg}"));
    }
}

impl CoreLog for MemoryLog {
    fn info(&self, msg: &str) {
        self.push("INFO", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("WARN", msg);
    }
    fn error(&self, msg: &str) {
        self.push("ERROR", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("DEBUG", msg);
    }
}
