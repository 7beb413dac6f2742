//! HTTP transport: ships JSON-serialized batches to a collector endpoint.

use crate::config::PipelineConfig;
use crate::core::record::Record;
use crate::error::{FanlogError, Result};
use crate::transport::{ExportError, Transport};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};

/// Transport that POSTs each batch as a JSON array to the configured
/// collector endpoint.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Build a transport from the pipeline configuration.
    ///
    /// Fails if the endpoint is missing or the HTTP client cannot be
    /// constructed; this is the one place a bad remote configuration
    /// surfaces, and it does not prevent local-sink delivery.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        if config.remote_endpoint.trim().is_empty() {
            return Err(FanlogError::config(
                "remote_endpoint is required when no custom transport is supplied",
            ));
        }

        let endpoint = Self::resolve_endpoint(&config.remote_endpoint, config.insecure_transport);

        let client = reqwest::Client::builder()
            .timeout(config.export_timeout())
            .build()
            .map_err(|e| FanlogError::transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            closed: AtomicBool::new(false),
        })
    }

    /// Prefix a scheme when the configured endpoint has none.
    fn resolve_endpoint(endpoint: &str, insecure: bool) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if insecure {
            format!("http://{}", endpoint)
        } else {
            format!("https://{}", endpoint)
        }
    }

    /// Transient statuses worth retrying; everything else non-2xx is fatal.
    fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[Record]) -> std::result::Result<(), ExportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExportError::Fatal("transport is closed".to_string()));
        }

        let body = serde_json::to_vec(batch)
            .map_err(|e| ExportError::Fatal(format!("batch serialization failed: {}", e)))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ExportError::Retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if Self::is_retryable_status(status) {
            Err(ExportError::Retryable(format!(
                "collector returned {}",
                status
            )))
        } else {
            Err(ExportError::Fatal(format!("collector returned {}", status)))
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(endpoint = %self.endpoint, "HTTP transport closed");
        }
    }
}
