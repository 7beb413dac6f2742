//! Record definitions for the fanlog pipeline.
//!
//! A [`Record`] is the immutable value handed to every delivery path. It is
//! constructed once at emission time and never mutated afterwards, so sinks
//! and the batch processor may share it concurrently without synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered log severity: `Debug < Info < Warn < Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = crate::error::FanlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            _ => Err(crate::error::FanlogError::InvalidSeverity(s.to_string())),
        }
    }
}

/// Opaque correlation token carried on a record.
///
/// The pipeline never interprets the contents; it only serializes them for
/// the remote collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanContext(String);

impl SpanContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One key/value attribute pair. Keys need not be unique.
pub type Attribute = (String, serde_json::Value);

/// One structured log event.
///
/// Attributes are kept as an ordered sequence rather than a map so that
/// insertion order survives serialization; on the wire each pair becomes a
/// two-element `[key, value]` array.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub body: String,
    pub attributes: Vec<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<SpanContext>,
}

impl Record {
    /// Construct a record, stamping it with the current time.
    pub fn new(
        severity: Severity,
        body: impl Into<String>,
        attributes: Vec<Attribute>,
        context: Option<SpanContext>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            body: body.into(),
            attributes,
            context,
        }
    }
}

/// An ordered group of records flushed together to the remote transport.
///
/// Invariant: never empty when handed to a transport, and never longer than
/// the configured `max_batch_size`.
pub type Batch = Vec<Record>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_severity_round_trip() {
        for severity in [
            Severity::Debug,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
        ] {
            let parsed: Severity = severity.as_str().parse().unwrap();
            assert_eq!(parsed, severity);
        }
        // parsing is case-insensitive
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warn);
        assert!("LOUD".parse::<Severity>().is_err());
    }

    #[test]
    fn test_record_construction() {
        let record = Record::new(
            Severity::Warn,
            "disk nearly full",
            vec![("disk".to_string(), json!("/dev/sda1"))],
            Some(SpanContext::new("trace-abc/span-1")),
        );

        assert_eq!(record.severity, Severity::Warn);
        assert_eq!(record.body, "disk nearly full");
        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.context.as_ref().unwrap().as_str(), "trace-abc/span-1");
    }

    #[test]
    fn test_attribute_order_preserved_in_json() {
        let record = Record::new(
            Severity::Info,
            "m",
            vec![
                ("b".to_string(), json!(2)),
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!(3)),
            ],
            None,
        );

        let json = serde_json::to_string(&record).unwrap();
        // duplicate keys survive and order is exactly insertion order
        let b2 = json.find("[\"b\",2]").unwrap();
        let a1 = json.find("[\"a\",1]").unwrap();
        let b3 = json.find("[\"b\",3]").unwrap();
        assert!(b2 < a1 && a1 < b3);
    }

    #[test]
    fn test_context_omitted_when_absent() {
        let record = Record::new(Severity::Info, "m", Vec::new(), None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("context"));
    }
}
