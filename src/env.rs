//! Environment variable names read by [`LogtailConfig::from_env`].
//!
//! These are purely helpers; the sink types themselves never touch the
//! environment.
//!
//! [`LogtailConfig::from_env`]: crate::config::LogtailConfig::from_env

/// Source token used as the bearer credential.
pub const LOGTAIL_TOKEN_ENV: &str = "LOGTAIL_TOKEN";

/// Application name written to `syslog.appname`.
pub const LOGTAIL_APP_NAME_ENV: &str = "LOGTAIL_APP_NAME";

/// Optional ingestion endpoint override.
pub const LOGTAIL_INGESTION_URI_ENV: &str = "LOGTAIL_INGESTION_URI";

/// Optional host name written to `syslog.host`/`syslog.hostname`.
pub const LOGTAIL_SOURCE_HOST_ENV: &str = "LOGTAIL_SOURCE_HOST";

/// Optional syslog facility name, e.g. `Local3`.
pub const LOGTAIL_FACILITY_ENV: &str = "LOGTAIL_FACILITY";

/// Optional minimum level name, e.g. `Warning` or `info`.
pub const LOGTAIL_MINIMUM_LEVEL_ENV: &str = "LOGTAIL_MINIMUM_LEVEL";

/// Optional output template for the `message` field.
pub const LOGTAIL_OUTPUT_TEMPLATE_ENV: &str = "LOGTAIL_OUTPUT_TEMPLATE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
