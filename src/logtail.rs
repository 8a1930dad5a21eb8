use crate::config::LogtailConfig;
use crate::diagnostics::{default_diagnostics, DiagnosticSink};
use crate::error::{LogtailError, TransportError};
use crate::formatter::{LogtailFormatter, MessageFormatter};
use crate::record::LogEvent;
use crate::sink::BatchedLogSink;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Carries one formatted envelope to the ingestion endpoint.
///
/// `Err` means the request never got a response (connection refused,
/// timeout, DNS failure). Any HTTP response, including 4xx/5xx, is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: String) -> Result<(), TransportError>;
}

/// [`Transport`] over HTTP(S) using a single pooled `reqwest` client with
/// the bearer credential installed as a default header.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    /// **Returns**
    /// - `Err(LogtailError::InvalidArgument)` if the token cannot be sent
    ///   as an HTTP header value.
    pub fn new(url: Url, token: &str, timeout: Duration) -> Result<Self, LogtailError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            LogtailError::invalid_argument("token", "contains characters not allowed in an HTTP header")
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;

        Ok(HttpTransport { client, url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: String) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        // Rejections are not retried or reported as failures.
        if !resp.status().is_success() {
            debug!(status = %resp.status(), url = %self.url, "ingestion endpoint did not accept log event");
        }
        Ok(())
    }
}

/// Delivers each event of a batch as its own POST to the Logtail
/// ingestion endpoint.
///
/// A failed POST is reported on the diagnostic channel and the event is
/// dropped; the remaining events of the batch are still sent. The HTTP
/// client is owned by the sink and released when the sink is dropped.
pub struct LogtailSink {
    formatter: Arc<dyn MessageFormatter>,
    transport: Box<dyn Transport>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl LogtailSink {
    /// Construct a sink from [`LogtailConfig`], validating it first.
    ///
    /// **Returns**
    /// - a sink posting to the configured (or default) endpoint.
    /// - `Err(LogtailError::InvalidArgument)` for an empty token or
    ///   application name, or a malformed ingestion URI. No network
    ///   activity happens in that case.
    pub fn new(config: &LogtailConfig) -> Result<Self, LogtailError> {
        let url = config.validate()?;
        let formatter = LogtailFormatter::new(config)?;
        let transport = HttpTransport::new(url, &config.token, config.request_timeout)?;
        Ok(Self::from_parts(Arc::new(formatter), Box::new(transport)))
    }

    /// Assemble a sink from a custom formatter and transport.
    pub fn from_parts(formatter: Arc<dyn MessageFormatter>, transport: Box<dyn Transport>) -> Self {
        LogtailSink {
            formatter,
            transport,
            diagnostics: default_diagnostics(),
        }
    }

    /// Route delivery faults to `diagnostics` instead of standard error.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

#[async_trait]
impl BatchedLogSink for LogtailSink {
    async fn emit_batch(&self, events: &[LogEvent]) -> Result<(), Box<dyn Error + Send + Sync>> {
        trace!(count = events.len(), "sending log batch");
        for event in events {
            let body = self.formatter.format_message(event);
            if let Err(e) = self.transport.post(body).await {
                self.diagnostics.write_line(&format!(
                    "[LogtailSink] error while sending log event to logtail: {e}"
                ));
            }
        }
        Ok(())
    }
}
