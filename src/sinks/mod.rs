//! Local delivery sinks.
//!
//! Sinks are the synchronous half of the fan-out: every record is handed to
//! each configured sink, in declared order, on the emitting thread. Remote
//! delivery lives in [`crate::transport`] instead.

pub mod stderr;
pub mod traits;

pub use stderr::StderrSink;
pub use traits::{Sink, SinkError, SinkResult};
