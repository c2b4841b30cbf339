use std::sync::{Arc, Mutex, PoisonError};

use console::style;

/// User-facing progress notices ("<id>: migrating..."). Operational detail
/// goes through `tracing` instead.
pub trait Reporter {
    fn success(&self, message: &str);
}

/// Prints notices to stdout in green. `console` drops the colour when
/// stdout is not a terminal or `NO_COLOR` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn success(&self, message: &str) {
        println!("{}", render(message));
    }
}

fn render(message: &str) -> String {
    style(message).green().to_string()
}

/// Drops every notice (`--quiet`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn success(&self, _message: &str) {}
}

/// Collects notices in memory. Clones share the same buffer, so a test can
/// keep one handle and give the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Reporter for MemoryReporter {
    fn success(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
