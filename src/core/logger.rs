//! Fan-out logger: the ingestion entry point of the pipeline.

use crate::core::processor::BatchProcessor;
use crate::core::record::{Attribute, Record, Severity, SpanContext};
use crate::diagnostics::Diagnostics;
use crate::sinks::Sink;
use std::sync::Arc;
use tracing::warn;

/// Writes each record synchronously to an ordered list of local sinks, then
/// enqueues it for batched remote export.
///
/// The two deliveries are independent: a sink failure is counted and
/// swallowed, and the enqueue never blocks on the network, so neither path
/// can slow down or fail the other. `emit` returns nothing; remote
/// delivery is asynchronous by nature and has no per-record outcome.
///
/// Instances are explicitly constructed and passed around; there is no
/// process-wide singleton.
#[derive(Debug)]
pub struct FanoutLogger {
    sinks: Vec<Arc<dyn Sink>>,
    processor: Arc<BatchProcessor>,
    min_severity: Severity,
    diagnostics: Arc<Diagnostics>,
}

impl FanoutLogger {
    pub(crate) fn new(
        sinks: Vec<Arc<dyn Sink>>,
        processor: Arc<BatchProcessor>,
        min_severity: Severity,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            sinks,
            processor,
            min_severity,
            diagnostics,
        }
    }

    /// Emit one structured log record.
    ///
    /// Safe to call from any thread. Never fails and never blocks on
    /// network I/O; under the `Block` backpressure policy it may wait up to
    /// the configured bound for buffer space.
    pub fn emit(
        &self,
        severity: Severity,
        body: impl Into<String>,
        attributes: Vec<Attribute>,
        context: Option<SpanContext>,
    ) {
        if severity < self.min_severity {
            return;
        }

        let record = Record::new(severity, body, attributes, context);
        self.diagnostics.increment_records_emitted();

        for sink in &self.sinks {
            if let Err(e) = sink.accept(&record) {
                self.diagnostics.increment_sink_errors();
                warn!(sink = sink.name(), error = %e, "sink failed to accept record");
            }
        }

        self.processor.enqueue(record);
    }

    /// Convenience wrappers for the common severities.
    pub fn debug(&self, body: impl Into<String>) {
        self.emit(Severity::Debug, body, Vec::new(), None);
    }

    pub fn info(&self, body: impl Into<String>) {
        self.emit(Severity::Info, body, Vec::new(), None);
    }

    pub fn warn(&self, body: impl Into<String>) {
        self.emit(Severity::Warn, body, Vec::new(), None);
    }

    pub fn error(&self, body: impl Into<String>) {
        self.emit(Severity::Error, body, Vec::new(), None);
    }
}
