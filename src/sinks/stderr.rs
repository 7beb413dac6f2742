//! Stderr sink: one structured text line per record on standard error.

use crate::core::record::{Record, Severity};
use crate::sinks::traits::{Sink, SinkResult};
use colored::Colorize;
use std::io::Write;

/// A sink that writes log records to the process's standard error stream.
#[derive(Debug, Clone)]
pub struct StderrSink {
    /// Whether to color the severity field
    colored: bool,
}

impl StderrSink {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    /// Formats one record as a single output line (without trailing newline).
    fn format_line(&self, record: &Record) -> String {
        let timestamp = record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let severity = self.format_severity(record.severity);

        let mut line = format!("[{}] {} {}", timestamp, severity, record.body);

        if !record.attributes.is_empty() {
            let attributes = record
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            line.push_str(&format!(" {}", attributes));
        }

        if let Some(context) = &record.context {
            line.push_str(&format!(" [{}]", context.as_str()));
        }

        line
    }

    fn format_severity(&self, severity: Severity) -> String {
        if self.colored {
            match severity {
                Severity::Error => severity.as_str().red().to_string(),
                Severity::Warn => severity.as_str().yellow().to_string(),
                Severity::Info => severity.as_str().green().to_string(),
                Severity::Debug => severity.as_str().cyan().to_string(),
            }
        } else {
            severity.as_str().to_string()
        }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Sink for StderrSink {
    fn accept(&self, record: &Record) -> SinkResult<()> {
        let line = self.format_line(record);
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        writeln!(handle, "{}", line)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stderr"
    }
}
