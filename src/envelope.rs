//! Wire model of a single envelope.
//!
//! Field names are part of the ingestion contract; renaming any of them
//! breaks downstream pipelines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured-data id under which the extras mapping is written.
pub const EXTRAS_SD_ID: &str = "logtail@11993";

/// Value of the `platform` field.
pub const PLATFORM: &str = "syslog";

/// Placeholder for unavailable header data (RFC 5424 NILVALUE).
pub const NIL_VALUE: &str = "-";

/// Key of the exception object inside the extras mapping.
pub const EXCEPTION_DETAIL_KEY: &str = "exceptionDetail";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedEnvelope {
    pub message: String,
    #[serde(rename = "dt")]
    pub timestamp: String,
    pub level: String,
    pub platform: String,
    #[serde(rename = "osplatform")]
    pub os_platform: String,
    pub priority: u8,
    #[serde(rename = "msgid")]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    pub syslog: SyslogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyslogSection {
    #[serde(rename = "appname")]
    pub app_name: String,
    pub facility: String,
    pub host: String,
    #[serde(rename = "hostname")]
    pub host_name: String,
    #[serde(rename = "logtail@11993", default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}
