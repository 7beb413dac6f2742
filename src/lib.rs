//! # fanlog
//!
//! Process-local telemetry pipeline with a two-way fan-out: every emitted
//! record is written synchronously to local sinks (stderr by default) and
//! buffered for asynchronous, batched export to a remote collector over
//! HTTP.
//!
//! The two delivery paths are isolated from each other. Local delivery
//! happens on the emitting thread before `emit` returns; remote delivery is
//! handled by a background flush worker that batches records, retries
//! transient failures with exponential backoff, and applies a configurable
//! backpressure policy when the buffer fills. A slow or dead collector can
//! never block emission.
//!
//! ## Quick start
//!
//! ```no_run
//! use fanlog::{Pipeline, PipelineConfig, Severity};
//!
//! # #[tokio::main]
//! # async fn main() -> fanlog::Result<()> {
//! let config = PipelineConfig {
//!     remote_endpoint: "collector.example.com:4318/v1/logs".to_string(),
//!     ..Default::default()
//! };
//! let pipeline = Pipeline::builder().config(config).build()?;
//!
//! pipeline.logger().emit(
//!     Severity::Info,
//!     "service started",
//!     vec![("port".to_string(), serde_json::json!(8080))],
//!     None,
//! );
//!
//! let summary = pipeline.shutdown().await;
//! println!(
//!     "exported {} records, lost {}",
//!     summary.records_exported, summary.records_lost
//! );
//! # Ok(())
//! # }
//! ```
//!
//! `build` spawns the flush worker onto the ambient tokio runtime, so it
//! must be called from within one. There is no global pipeline: construct
//! one explicitly and share it (it is cheap to wrap in an `Arc`).

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod shutdown;
pub mod sinks;
pub mod transport;

pub use crate::config::{
    load_config_from_file, load_config_from_str, BackpressurePolicy, PipelineConfig,
};
pub use crate::core::{Attribute, Batch, FanoutLogger, Record, Severity, SpanContext};
pub use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use crate::error::{FanlogError, Result};
pub use crate::shutdown::ShutdownSummary;
pub use crate::sinks::{Sink, SinkError, SinkResult, StderrSink};
pub use crate::transport::{ExportError, HttpTransport, Transport};

use crate::core::processor::{run_flush_worker, BatchProcessor, Command};
use crate::shutdown::ShutdownCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Capacity of the control channel toward the flush worker. Flush and drain
/// are rare, caller-awaited operations, so a small buffer suffices.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// A running telemetry pipeline.
///
/// Owns the fan-out logger, the flush worker, and the shutdown state.
/// Dropped without [`shutdown`](Pipeline::shutdown), the worker drains
/// whatever is buffered once the control channel closes, but only a shutdown
/// waits for that drain and reports its outcome.
#[derive(Debug)]
pub struct Pipeline {
    logger: FanoutLogger,
    coordinator: ShutdownCoordinator,
    cmd_tx: mpsc::Sender<Command>,
    diagnostics: Arc<Diagnostics>,
    shutdown_deadline: Duration,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// The emission handle. `emit` is synchronous and safe from any thread.
    pub fn logger(&self) -> &FanoutLogger {
        &self.logger
    }

    /// Flush the live buffer through the transport and wait for it.
    ///
    /// Returns once every record buffered before the call has been exported
    /// or given up on by the retry policy.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush(ack_tx))
            .await
            .map_err(|_| FanlogError::channel("flush worker is not running"))?;
        ack_rx
            .await
            .map_err(|_| FanlogError::channel("flush worker stopped before acknowledging"))
    }

    /// Drain and stop the pipeline, bounded by the configured deadline.
    ///
    /// Idempotent: repeated calls return the summary of the first.
    pub async fn shutdown(&self) -> ShutdownSummary {
        self.coordinator.shutdown(self.shutdown_deadline).await
    }

    /// Drain and stop the pipeline with an explicit deadline.
    pub async fn shutdown_with_deadline(&self, deadline: Duration) -> ShutdownSummary {
        self.coordinator.shutdown(deadline).await
    }

    /// Point-in-time copy of the pipeline's diagnostic counters.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }
}

/// Builder for [`Pipeline`].
///
/// Sinks are optional; with none configured a colored [`StderrSink`] is
/// used. A custom [`Transport`] replaces the default [`HttpTransport`] and
/// removes the need for `remote_endpoint` in the configuration.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    sinks: Vec<Arc<dyn Sink>>,
    transport: Option<Arc<dyn Transport>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            sinks: Vec::new(),
            transport: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a sink. Sinks receive every record in the order they were
    /// added, on the emitting thread.
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration, wire the pipeline, and spawn its flush
    /// worker onto the ambient tokio runtime.
    pub fn build(self) -> Result<Pipeline> {
        config::validate_config(&self.config)?;
        let min_severity: Severity = self.config.min_severity.parse()?;

        let sinks = if self.sinks.is_empty() {
            vec![Arc::new(StderrSink::default()) as Arc<dyn Sink>]
        } else {
            self.sinks
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };

        let diagnostics = Arc::new(Diagnostics::new());
        let processor = Arc::new(BatchProcessor::new(&self.config, Arc::clone(&diagnostics)));

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let worker = tokio::spawn(run_flush_worker(
            Arc::clone(&processor),
            Arc::clone(&transport),
            cmd_rx,
        ));

        let logger = FanoutLogger::new(
            sinks,
            Arc::clone(&processor),
            min_severity,
            Arc::clone(&diagnostics),
        );
        let coordinator = ShutdownCoordinator::new(
            processor,
            transport,
            cmd_tx.clone(),
            worker,
            Arc::clone(&diagnostics),
        );

        Ok(Pipeline {
            logger,
            coordinator,
            cmd_tx,
            diagnostics,
            shutdown_deadline: self.config.shutdown_deadline(),
        })
    }
}
