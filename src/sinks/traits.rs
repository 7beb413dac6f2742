//! Sink trait for synchronous local delivery.
//!
//! A sink is the reliable half of the fan-out: it receives every record at
//! emission time, on the caller's thread, before the record enters the
//! export buffer. The contract is strict:
//!
//! - `accept` must not block on network I/O,
//! - a sink failure is reported through the returned error so the logger can
//!   count it, but it is never propagated to the emitting call.

use crate::core::record::Record;
use std::fmt::Debug;

/// Error type for sink-internal failures.
///
/// These never reach application code; the fan-out logger swallows them and
/// increments the sink error counter.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// I/O error while writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be formatted
    #[error("Format error: {0}")]
    Format(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Synchronous local delivery target.
///
/// Implementations must be cheap and local: stderr, an in-memory ring, a
/// test collector. Anything network-backed belongs behind the transport,
/// not here.
pub trait Sink: Send + Sync + Debug {
    /// Deliver one record. Must not block on network I/O.
    fn accept(&self, record: &Record) -> SinkResult<()>;

    /// Name used in diagnostics messages.
    fn name(&self) -> &'static str;
}
