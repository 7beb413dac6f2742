//! Graceful shutdown of a pipeline.
//!
//! Shutdown is a three-step sequence: close intake so producers stop adding
//! records, ask the flush worker to drain the buffer through the transport,
//! then close the transport. The whole sequence is bounded by a deadline; if
//! the drain cannot finish in time the remaining records are abandoned and
//! counted, never waited on forever.

use crate::core::processor::{BatchProcessor, Command};
use crate::diagnostics::Diagnostics;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Outcome of a completed shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Records accepted into the buffer that were never delivered: dropped
    /// by backpressure, abandoned by the retry policy, or still buffered
    /// when the deadline expired.
    pub records_lost: u64,
    /// Records confirmed delivered by the transport over the pipeline's
    /// whole lifetime.
    pub records_exported: u64,
    /// Whether the drain finished before the deadline expired.
    pub completed_within_deadline: bool,
}

/// Runs the shutdown sequence exactly once and remembers its outcome.
///
/// Concurrent and repeated calls are safe: the first caller performs the
/// sequence, everyone else gets the same stored summary. The transport is
/// closed on every path, including deadline expiry, and only once.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    processor: Arc<BatchProcessor>,
    transport: Arc<dyn Transport>,
    cmd_tx: mpsc::Sender<Command>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
    diagnostics: Arc<Diagnostics>,
    // async mutex: held across the drain await, which also serializes
    // concurrent shutdown callers behind the first one
    result: tokio::sync::Mutex<Option<ShutdownSummary>>,
}

impl ShutdownCoordinator {
    pub(crate) fn new(
        processor: Arc<BatchProcessor>,
        transport: Arc<dyn Transport>,
        cmd_tx: mpsc::Sender<Command>,
        worker: JoinHandle<()>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            processor,
            transport,
            cmd_tx,
            worker: std::sync::Mutex::new(Some(worker)),
            diagnostics,
            result: tokio::sync::Mutex::new(None),
        }
    }

    /// Drain and stop the pipeline, bounded by `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> ShutdownSummary {
        let mut result = self.result.lock().await;
        if let Some(summary) = result.as_ref() {
            return summary.clone();
        }

        info!(deadline_ms = deadline.as_millis() as u64, "pipeline shutdown started");
        self.processor.close_intake();

        let completed_within_deadline = self.drain_with_deadline(deadline).await;
        if !completed_within_deadline {
            warn!(
                buffered = self.processor.buffered_records(),
                "shutdown deadline expired before drain finished"
            );
        }

        self.transport.close().await;

        let summary = ShutdownSummary {
            records_lost: self.diagnostics.records_undelivered(),
            records_exported: self.diagnostics.records_exported(),
            completed_within_deadline,
        };
        info!(
            records_exported = summary.records_exported,
            records_lost = summary.records_lost,
            completed_within_deadline,
            "pipeline shutdown finished"
        );
        *result = Some(summary.clone());
        summary
    }

    /// Send the drain command and wait for the worker to finish, returning
    /// whether everything completed inside the deadline.
    async fn drain_with_deadline(&self, deadline: Duration) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Drain(ack_tx)).await.is_err() {
            // worker already gone; nothing left to drain through it
            warn!("flush worker stopped before shutdown drain");
            return true;
        }

        let acked = tokio::time::timeout(deadline, ack_rx).await.is_ok();
        if let Some(handle) = self.take_worker() {
            if acked {
                // the worker exits right after acknowledging a drain
                let _ = handle.await;
            } else {
                // stuck mid-export; cut it loose
                handle.abort();
            }
        }
        acked
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}
