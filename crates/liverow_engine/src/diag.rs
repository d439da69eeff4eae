//! Diagnostic sinks for absorbed failures.

use parking_lot::Mutex;

/// Destination for diagnostics the engine absorbs instead of returning.
///
/// Fetch misses, persist failures, and duplicate-channel warnings all go
/// through the sink configured per attach.
pub trait DiagnosticSink: Send + Sync {
    /// Reports one diagnostic message.
    fn warn(&self, message: &str);
}

/// The default sink: forwards to `tracing::warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "liverow", "{message}");
    }
}

/// A sink that records messages for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded messages.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn warn(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
