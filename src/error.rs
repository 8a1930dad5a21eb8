/// Error type returned by configuration, construction and level parsing.
///
/// Per-event delivery failures never surface through this type to the
/// logging call site; they are contained inside the sink and reported on
/// the diagnostic channel.
#[derive(thiserror::Error, Debug)]
pub enum LogtailError {
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInstall(String),

    #[error("log delivery: {0}")]
    Delivery(String),
}

impl LogtailError {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        LogtailError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// A single POST that failed before a response was received.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
