//! Per-connection diagnostic tracing.
//!
//! When a connection's debug flag is set, every transmitted value is written
//! as one line to a [`TraceSink`]: `--> value` for writes, `<-- value` for
//! reads. Tracing is a pure side effect; it never touches the wire bytes or
//! the return values of the traced operation.

use crate::config::TRACE_PREVIEW_CHARS;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Destination of trace lines. Fire-and-forget: implementations must not
/// fail or block for long.
pub trait TraceSink: Send + Sync {
    fn write(&self, line: &str);
}

/// Default sink: emits each line as a `tracing` event on the
/// `wire_connection::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn write(&self, line: &str) {
        tracing::info!(target: "wire_connection::trace", "{line}");
    }
}

/// Direction of a traced transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::Sent => "-->",
            Direction::Received => "<--",
        }
    }
}

/// Debug flag plus sink, shared by both halves of a connection
#[derive(Clone)]
pub struct Tracer {
    enabled: Arc<AtomicBool>,
    sink: Arc<dyn TraceSink>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Tracer {
    pub fn new(enabled: bool, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
            sink,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// A toggle racing an in-flight operation may or may not trace it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Trace a literal value
    pub fn value<V: Display>(&self, direction: Direction, value: V) {
        if self.is_enabled() {
            self.sink.write(&format!("{} {value}", direction.arrow()));
        }
    }

    /// Trace an object frame by its payload size
    pub fn object(&self, direction: Direction, len: usize) {
        if self.is_enabled() {
            self.sink.write(&format!("{} {len} bytes", direction.arrow()));
        }
    }

    /// Trace a block frame by a sanitised preview of its contents
    pub fn block(&self, direction: Direction, bytes: &[u8]) {
        if self.is_enabled() {
            self.sink
                .write(&format!("{} {}", direction.arrow(), preview(bytes)));
        }
    }
}

/// First 200 characters of `bytes` read as text, with every character that
/// is not alphanumeric replaced by `.`
pub fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(TRACE_PREVIEW_CHARS)
        .map(|c| if c.is_alphanumeric() { c } else { '.' })
        .collect()
}
