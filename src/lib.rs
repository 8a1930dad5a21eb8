//! Ship `tracing` events to a Logtail (Better Stack) ingestion endpoint as
//! syslog-shaped JSON envelopes.
//!
//! Events are converted by [`layer::LogtailLayer`], queued without blocking,
//! batched by [`batch::PeriodicBatcher`] and posted one request per event by
//! [`logtail::LogtailSink`].

pub mod sanitize;
pub mod severity;
pub mod record;
pub mod envelope;
pub mod formatter;
pub mod template;
pub mod sink;
pub mod logtail;
pub mod batch;
pub mod layer;
pub mod config;
pub mod diagnostics;
pub mod env;
pub mod error;

pub mod init;
pub mod noop_sink;

#[cfg(test)]
mod test_utils;

pub use config::LogtailConfig;
pub use error::LogtailError;
pub use init::{init_logtail, init_tracing, init_tracing_with_config, LayerConfig, LogtailGuard};
pub use logtail::LogtailSink;
pub use record::LogEvent;
pub use severity::{Facility, Level, Severity};
pub use template::{MessageRenderer, OutputTemplate};
