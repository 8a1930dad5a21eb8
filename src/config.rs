use crate::batch::BatchOptions;
use crate::env::{
    LOGTAIL_APP_NAME_ENV, LOGTAIL_FACILITY_ENV, LOGTAIL_INGESTION_URI_ENV,
    LOGTAIL_MINIMUM_LEVEL_ENV, LOGTAIL_OUTPUT_TEMPLATE_ENV, LOGTAIL_SOURCE_HOST_ENV,
    LOGTAIL_TOKEN_ENV,
};
use crate::error::LogtailError;
use crate::formatter::DEFAULT_MESSAGE_ID_PROPERTY;
use crate::severity::{Facility, Level, SeverityMap, SeverityMapping};
use crate::template::MessageRenderer;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Ingestion endpoint used when no override is configured.
pub const DEFAULT_INGESTION_URI: &str = "https://in.logs.betterstack.com";

/// Configuration for [`LogtailSink`](crate::logtail::LogtailSink) and
/// its [`LogtailFormatter`](crate::formatter::LogtailFormatter).
///
/// Nothing is validated here; validation happens when the sink is built,
/// so a bad value fails before any event is accepted.
#[derive(Clone)]
pub struct LogtailConfig {
    /// Bearer credential (source token).
    pub token: String,
    /// Application name; sanitized to at most 48 printable ASCII chars.
    pub application_name: String,
    pub facility: Facility,
    /// Property whose value becomes the envelope's `msgid`.
    pub message_id_property_name: String,
    /// Written verbatim to `host`/`hostname`. Defaults to the machine name.
    pub source_host: Option<String>,
    pub severity_mapping: Arc<dyn SeverityMapping>,
    /// Template for the envelope's `message`, e.g. `"[{Level:u3}] {Message}"`.
    /// Blank means the event message is used as-is.
    pub output_template: Option<String>,
    /// Custom `message` rendering; takes precedence over `output_template`.
    pub message_renderer: Option<Arc<dyn MessageRenderer>>,
    /// Least severe level forwarded by [`init_logtail`](crate::init::init_logtail).
    pub minimum_level: Level,
    /// Absolute URI overriding [`DEFAULT_INGESTION_URI`].
    pub ingestion_uri: Option<String>,
    pub request_timeout: Duration,
    pub batch: BatchOptions,
}

impl LogtailConfig {
    pub fn new(token: impl Into<String>, application_name: impl Into<String>) -> Self {
        LogtailConfig {
            token: token.into(),
            application_name: application_name.into(),
            facility: Facility::default(),
            message_id_property_name: DEFAULT_MESSAGE_ID_PROPERTY.to_string(),
            source_host: None,
            severity_mapping: Arc::new(SeverityMap::default()),
            output_template: None,
            message_renderer: None,
            minimum_level: Level::Verbose,
            ingestion_uri: None,
            request_timeout: Duration::from_secs(10),
            batch: BatchOptions::default(),
        }
    }

    /// Build a config from `LOGTAIL_*` environment variables.
    ///
    /// `LOGTAIL_TOKEN` and `LOGTAIL_APP_NAME` are required; the URI, source
    /// host, facility, minimum level and output template are optional.
    pub fn from_env() -> Result<Self, LogtailError> {
        let token = std::env::var(LOGTAIL_TOKEN_ENV)
            .map_err(|_| LogtailError::invalid_argument("token", format!("{LOGTAIL_TOKEN_ENV} is not set")))?;
        let application_name = std::env::var(LOGTAIL_APP_NAME_ENV).map_err(|_| {
            LogtailError::invalid_argument("application_name", format!("{LOGTAIL_APP_NAME_ENV} is not set"))
        })?;

        let mut config = LogtailConfig::new(token, application_name);
        if let Ok(uri) = std::env::var(LOGTAIL_INGESTION_URI_ENV) {
            config.ingestion_uri = Some(uri);
        }
        if let Ok(host) = std::env::var(LOGTAIL_SOURCE_HOST_ENV) {
            config.source_host = Some(host);
        }
        if let Ok(facility) = std::env::var(LOGTAIL_FACILITY_ENV) {
            config.facility = facility.parse()?;
        }
        if let Ok(level) = std::env::var(LOGTAIL_MINIMUM_LEVEL_ENV) {
            config.minimum_level = level.parse()?;
        }
        if let Ok(template) = std::env::var(LOGTAIL_OUTPUT_TEMPLATE_ENV) {
            config.output_template = Some(template);
        }
        Ok(config)
    }

    pub fn facility(mut self, facility: Facility) -> Self {
        self.facility = facility;
        self
    }

    pub fn message_id_property_name(mut self, name: impl Into<String>) -> Self {
        self.message_id_property_name = name.into();
        self
    }

    pub fn source_host(mut self, host: impl Into<String>) -> Self {
        self.source_host = Some(host.into());
        self
    }

    pub fn severity_mapping(mut self, mapping: impl SeverityMapping + 'static) -> Self {
        self.severity_mapping = Arc::new(mapping);
        self
    }

    pub fn output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    pub fn message_renderer(mut self, renderer: impl MessageRenderer + 'static) -> Self {
        self.message_renderer = Some(Arc::new(renderer));
        self
    }

    pub fn minimum_level(mut self, level: Level) -> Self {
        self.minimum_level = level;
        self
    }

    pub fn ingestion_uri(mut self, uri: impl Into<String>) -> Self {
        self.ingestion_uri = Some(uri.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn batch(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }

    /// Check the token and application name and resolve the endpoint.
    ///
    /// **Returns**
    /// - the ingestion [`Url`] to post to.
    /// - `Err(LogtailError::InvalidArgument)` for an empty token or
    ///   application name, or an override that is not an absolute
    ///   http(s) URI.
    pub fn validate(&self) -> Result<Url, LogtailError> {
        if self.token.trim().is_empty() {
            return Err(LogtailError::invalid_argument("token", "must not be empty"));
        }
        if self.application_name.trim().is_empty() {
            return Err(LogtailError::invalid_argument("application_name", "must not be empty"));
        }

        let raw = self.ingestion_uri.as_deref().unwrap_or(DEFAULT_INGESTION_URI);
        let url = Url::parse(raw).map_err(|e| {
            LogtailError::invalid_argument("ingestion_uri", format!("{raw:?} is not a valid absolute uri: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(LogtailError::invalid_argument(
                "ingestion_uri",
                format!("{raw:?} must be an absolute http(s) uri"),
            ));
        }
        Ok(url)
    }
}

impl fmt::Debug for LogtailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogtailConfig")
            .field("token", &"<redacted>")
            .field("application_name", &self.application_name)
            .field("facility", &self.facility)
            .field("message_id_property_name", &self.message_id_property_name)
            .field("source_host", &self.source_host)
            .field("output_template", &self.output_template)
            .field("message_renderer", &self.message_renderer.as_ref().map(|_| "<custom>"))
            .field("minimum_level", &self.minimum_level)
            .field("ingestion_uri", &self.ingestion_uri)
            .field("request_timeout", &self.request_timeout)
            .field("batch", &self.batch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = LogtailConfig::new("t", "app");
        assert_eq!(config.facility, Facility::Local0);
        assert_eq!(config.message_id_property_name, "SourceContext");
        assert_eq!(config.batch.batch_size_limit, 1000);
        assert_eq!(config.batch.period, Duration::from_secs(2));
        assert_eq!(config.batch.queue_limit, 100_000);
        assert_eq!(config.minimum_level, Level::Verbose);
        assert!(config.output_template.is_none());
        assert!(config.message_renderer.is_none());
        assert_eq!(config.validate().unwrap().as_str(), "https://in.logs.betterstack.com/");
    }

    #[test]
    fn empty_token_is_invalid() {
        let err = LogtailConfig::new("", "app").validate().unwrap_err();
        assert!(matches!(err, LogtailError::InvalidArgument { name: "token", .. }));
    }

    #[test]
    fn empty_application_name_is_invalid() {
        let err = LogtailConfig::new("t", "").validate().unwrap_err();
        assert!(matches!(err, LogtailError::InvalidArgument { name: "application_name", .. }));
    }

    #[test]
    fn relative_or_odd_uris_are_invalid() {
        for uri in ["/relative/path", "not a uri", "ftp://example.com", "mailto:ops@example.com"] {
            let err = LogtailConfig::new("t", "app").ingestion_uri(uri).validate().unwrap_err();
            assert!(
                matches!(err, LogtailError::InvalidArgument { name: "ingestion_uri", .. }),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn custom_uri_is_kept() {
        let url = LogtailConfig::new("t", "app")
            .ingestion_uri("http://127.0.0.1:8080/ingest")
            .validate()
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/ingest");
    }

    #[test]
    fn debug_output_redacts_token() {
        let rendered = format!("{:?}", LogtailConfig::new("secret-token", "app"));
        assert!(!rendered.contains("secret-token"));
    }
}
