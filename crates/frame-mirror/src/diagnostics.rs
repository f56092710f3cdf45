//! Injected diagnostic capability.
//!
//! The mirror never owns process-wide logging state; embedders hand it a sink
//! at construction and decide where warnings go.

use tracing::warn;

/// Sink for non-fatal diagnostics emitted while mirroring a session.
pub trait DiagnosticSink: Send + Sync {
    fn warning(&self, message: &str);
}

/// Default sink forwarding to the ambient `tracing` subscriber.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warning(&self, message: &str) {
        warn!(target: "frame-mirror", "{message}");
    }
}

/// Discards all diagnostics.
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn warning(&self, _message: &str) {}
}
