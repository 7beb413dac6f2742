//! Core pipeline machinery: records, the fan-out logger, and the batch
//! processor behind it.

pub mod logger;
pub mod processor;
pub mod record;

pub use logger::FanoutLogger;
pub use processor::BatchProcessor;
pub use record::{Attribute, Batch, Record, Severity, SpanContext};
