//! output
//!
//! User-facing output as an explicit, injectable sink.
//!
//! Results of project operations (skip notices, per-entry status lines,
//! publish reports) are data the caller asked for, so they flow through
//! an [`Output`] handle passed down at construction time rather than an
//! ambient stream. Diagnostic logging goes through `tracing` instead.
//!
//! An `Output` carries a prefix; `spawn` derives a child handle with an
//! extended prefix, which is how per-entry output gets its `path: `
//! marker without every call site formatting it.

use std::sync::{Arc, Mutex};

/// Destination for user-facing output lines.
pub trait Sink: Send + Sync {
    /// Write one line (no trailing newline).
    fn append(&self, line: &str);
}

/// Sink that prints to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn append(&self, line: &str) {
        println!("{}", line);
    }
}

/// Sink that collects lines in memory, for tests and nested capture.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of everything appended so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("output buffer poisoned").clone()
    }
}

impl Sink for BufferSink {
    fn append(&self, line: &str) {
        self.lines
            .lock()
            .expect("output buffer poisoned")
            .push(line.to_string());
    }
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn append(&self, _line: &str) {}
}

/// Cloneable handle onto a shared sink, with a line prefix.
#[derive(Clone)]
pub struct Output {
    sink: Arc<dyn Sink>,
    prefix: String,
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Output {
    /// Wrap a sink with an empty prefix.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            prefix: String::new(),
        }
    }

    /// Convenience: an output that prints to stdout.
    pub fn stdout() -> Self {
        Self::new(Arc::new(StdoutSink))
    }

    /// Convenience: an output that discards everything.
    pub fn null() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Append one line, prefixed.
    ///
    /// Multi-line input is split so every physical line gets the prefix.
    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        for line in text.lines() {
            self.sink.append(&format!("{}{}", self.prefix, line));
        }
    }

    /// Derive a child handle whose prefix extends this one.
    pub fn spawn(&self, prefix: &str) -> Output {
        Output {
            sink: Arc::clone(&self.sink),
            prefix: format!("{}{}", self.prefix, prefix),
        }
    }
}
