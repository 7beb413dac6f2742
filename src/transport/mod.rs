//! Transport abstraction for remote batch export.
//!
//! The batch processor talks to the remote collector exclusively through the
//! [`Transport`] trait, so tests (and alternative backends) can substitute
//! their own implementation without touching the pipeline.

pub mod http;

use crate::core::record::Record;
use async_trait::async_trait;
use std::fmt::Debug;

pub use http::HttpTransport;

/// Classified export failure.
///
/// The classification drives the retry policy: `Retryable` failures are
/// retried with backoff up to the configured attempt budget, `Fatal`
/// failures drop the batch immediately.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Transient failure (network error, timeout, 5xx-class response)
    #[error("retryable export failure: {0}")]
    Retryable(String),

    /// Permanent failure (malformed batch, 4xx-class response)
    #[error("fatal export failure: {0}")]
    Fatal(String),
}

/// Asynchronous, network-backed delivery target for batches.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send one batch to the remote collector.
    ///
    /// The batch is never empty. Calls are serialized by the flush worker;
    /// implementations never see overlapping sends.
    async fn send(&self, batch: &[Record]) -> Result<(), ExportError>;

    /// Release connection state. Idempotent: a second call is a no-op.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_display() {
        let retryable = ExportError::Retryable("connection reset".to_string());
        assert!(retryable.to_string().contains("retryable"));
        assert!(retryable.to_string().contains("connection reset"));

        let fatal = ExportError::Fatal("collector returned 400".to_string());
        assert!(fatal.to_string().contains("fatal"));
    }
}
