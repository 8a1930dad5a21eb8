use crate::config::LogtailConfig;
use crate::envelope::{
    FormattedEnvelope, SyslogSection, EXCEPTION_DETAIL_KEY, NIL_VALUE, PLATFORM,
};
use crate::error::LogtailError;
use crate::record::LogEvent;
use crate::sanitize::{
    as_printable_ascii, clean_key, clean_value, trim_and_unescape_quotes, with_max_length,
    MAX_APP_NAME_LENGTH, MAX_MESSAGE_ID_LENGTH,
};
use crate::severity::{priority, Facility, SeverityMapping};
use crate::template::{MessageRenderer, OutputTemplate};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Property consulted for the message id when none is configured.
pub const DEFAULT_MESSAGE_ID_PROPERTY: &str = "SourceContext";

/// `dt` format: microsecond precision with a numeric UTC offset.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Anything that can turn a [`LogEvent`] into the request body for one POST.
///
/// Implementations must not fail: anomalies degrade to placeholder values.
pub trait MessageFormatter: Send + Sync {
    fn format_message(&self, event: &LogEvent) -> String;
}

/// Builds RFC 5424 flavoured JSON envelopes for the Logtail ingestion API.
pub struct LogtailFormatter {
    application_name: String,
    message_id_property_name: String,
    facility: Facility,
    host: String,
    severity_mapping: Arc<dyn SeverityMapping>,
    renderer: Option<Arc<dyn MessageRenderer>>,
}

impl LogtailFormatter {
    /// Construct a formatter, normalizing the application name and the
    /// message-id property name once.
    ///
    /// **Returns**
    /// - `Err(LogtailError::InvalidArgument)` if the application name is empty.
    pub fn new(config: &LogtailConfig) -> Result<Self, LogtailError> {
        if config.application_name.trim().is_empty() {
            return Err(LogtailError::invalid_argument(
                "application_name",
                "must not be empty",
            ));
        }

        let mut application_name = with_max_length(
            &as_printable_ascii(&config.application_name),
            MAX_APP_NAME_LENGTH,
        );
        if application_name.is_empty() {
            application_name = PLATFORM.to_string();
        }

        let mut message_id_property_name = with_max_length(
            &as_printable_ascii(&config.message_id_property_name),
            MAX_MESSAGE_ID_LENGTH,
        );
        if message_id_property_name.is_empty() {
            message_id_property_name = DEFAULT_MESSAGE_ID_PROPERTY.to_string();
        }

        let host = config.source_host.clone().unwrap_or_else(machine_host_name);

        let renderer = match (&config.message_renderer, &config.output_template) {
            (Some(renderer), _) => Some(Arc::clone(renderer)),
            (None, Some(template)) if !template.trim().is_empty() => {
                Some(Arc::new(OutputTemplate::parse(template)) as Arc<dyn MessageRenderer>)
            }
            _ => None,
        };

        Ok(LogtailFormatter {
            application_name,
            message_id_property_name,
            facility: config.facility,
            host,
            severity_mapping: Arc::clone(&config.severity_mapping),
            renderer,
        })
    }

    /// Build the envelope for `event` without serializing it.
    pub fn envelope(&self, event: &LogEvent) -> FormattedEnvelope {
        let severity = self.severity_mapping.severity(event.level);

        let properties = render_properties(event);
        let mut extras = BTreeMap::new();
        if let Some(exception) = &event.exception {
            let value = serde_json::to_value(exception)
                .unwrap_or_else(|_| serde_json::Value::String(exception.message.clone()));
            extras.insert(EXCEPTION_DETAIL_KEY.to_string(), value);
        }

        let message = match &self.renderer {
            Some(renderer) => renderer.render(event),
            None => event.message.clone(),
        };

        FormattedEnvelope {
            message,
            timestamp: event.timestamp.format(DATE_FORMAT).to_string(),
            level: event.level.label().to_string(),
            platform: PLATFORM.to_string(),
            os_platform: os_platform().to_string(),
            priority: priority(self.facility, severity),
            message_id: self.message_id(event),
            properties: (!properties.is_empty()).then_some(properties),
            syslog: SyslogSection {
                app_name: self.application_name.clone(),
                facility: self.facility.name().to_string(),
                host: self.host.clone(),
                host_name: self.host.clone(),
                extras,
            },
        }
    }

    fn message_id(&self, event: &LogEvent) -> String {
        let Some(value) = event.properties.get(&self.message_id_property_name) else {
            return NIL_VALUE.to_string();
        };

        let id = with_max_length(
            &as_printable_ascii(&trim_and_unescape_quotes(&value.render())),
            MAX_MESSAGE_ID_LENGTH,
        );
        if id.is_empty() {
            NIL_VALUE.to_string()
        } else {
            id
        }
    }
}

impl MessageFormatter for LogtailFormatter {
    fn format_message(&self, event: &LogEvent) -> String {
        let envelope = self.envelope(event);
        serde_json::to_string(&envelope).unwrap_or_else(|e| {
            serde_json::json!({
                "message": event.message,
                "dt": envelope.timestamp,
                "level": envelope.level,
                "platform": PLATFORM,
                "priority": envelope.priority,
                "msgid": NIL_VALUE,
                "error": e.to_string(),
            })
            .to_string()
        })
    }
}

/// Sanitized key -> escaped value. Keys that collide after cleaning keep
/// the last value in property order.
fn render_properties(event: &LogEvent) -> BTreeMap<String, String> {
    event
        .properties
        .iter()
        .map(|(key, value)| (clean_key(key), clean_value(&value.render())))
        .collect()
}

fn machine_host_name() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

static OS_PLATFORM: OnceLock<&'static str> = OnceLock::new();

/// Platform of the running process, resolved once.
pub fn os_platform() -> &'static str {
    OS_PLATFORM.get_or_init(detect_os_platform)
}

fn detect_os_platform() -> &'static str {
    if cfg!(all(target_arch = "wasm32", target_os = "unknown")) {
        "browser"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "freebsd") {
        "freebsd"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExceptionDetail, PropertyValue};
    use crate::severity::{Level, Severity, SeverityMap};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;

    fn config() -> LogtailConfig {
        LogtailConfig::new("token", "billing").source_host("web-1")
    }

    fn formatter() -> LogtailFormatter {
        LogtailFormatter::new(&config()).unwrap()
    }

    fn format(event: &LogEvent) -> Value {
        serde_json::from_str(&formatter().format_message(event)).unwrap()
    }

    #[test]
    fn error_on_local0_has_priority_131() {
        let json = format(&LogEvent::new(Level::Error, "boom"));
        assert_eq!(json["priority"], 131);
        assert_eq!(json["level"], "Error");
        assert_eq!(json["platform"], "syslog");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn information_uses_info_label_and_notice_severity() {
        let json = format(&LogEvent::new(Level::Information, "hello"));
        assert_eq!(json["level"], "Info");
        assert_eq!(json["priority"], 16 * 8 + 5);
    }

    #[test]
    fn missing_message_id_property_yields_nil_value() {
        let json = format(&LogEvent::new(Level::Warning, "no context"));
        assert_eq!(json["msgid"], "-");
    }

    #[test]
    fn message_id_is_unquoted_sanitized_and_capped() {
        let context = format!("app.{}\u{e9}", "x".repeat(40));
        let event = LogEvent::new(Level::Debug, "m").with_property("SourceContext", context);
        let json = format(&event);
        let msgid = json["msgid"].as_str().unwrap();
        assert_eq!(msgid.len(), 32);
        assert!(msgid.starts_with("app.xxx"));
        assert!(!msgid.contains('"'));
    }

    #[test]
    fn message_id_empty_after_filtering_yields_nil_value() {
        let event = LogEvent::new(Level::Debug, "m").with_property("SourceContext", "\u{e9}\u{e8}");
        assert_eq!(format(&event)["msgid"], "-");
    }

    #[test]
    fn custom_message_id_property_is_honoured() {
        let custom = config().message_id_property_name("RequestId\u{7}");
        let formatter = LogtailFormatter::new(&custom).unwrap();

        let event = LogEvent::new(Level::Information, "m").with_property("RequestId", 77u64);
        assert_eq!(formatter.envelope(&event).message_id, "77");
    }

    #[test]
    fn properties_are_cleaned_and_escaped() {
        let event = LogEvent::new(Level::Information, "m")
            .with_property("user id!", "O'Brien \"the great\"")
            .with_property("a=b", PropertyValue::Rendered("x]y\\z".into()));
        let json = format(&event);
        let properties = json["properties"].as_object().unwrap();

        assert_eq!(properties["user id!"], "O'Brien \\\"the great\\\"");
        assert_eq!(properties["ab"], "x\\]y\\\\z");
        for key in properties.keys() {
            assert!(!key.contains(['=', ']', '"']));
        }
    }

    #[test]
    fn colliding_keys_keep_the_last_value() {
        let event = LogEvent::new(Level::Information, "m")
            .with_property("k=", "first")
            .with_property("k]", "second");
        let envelope = formatter().envelope(&event);
        let properties = envelope.properties.unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties["k"], "second");
    }

    #[test]
    fn empty_properties_are_omitted() {
        let json = format(&LogEvent::new(Level::Information, "m"));
        assert!(json.get("properties").is_none());
    }

    #[test]
    fn exception_goes_into_extras_as_object() {
        let event = LogEvent::new(Level::Fatal, "crash")
            .with_exception(ExceptionDetail::new("IoError", "disk full").with_stack_trace("at main"));
        let json = format(&event);
        let detail = &json["syslog"]["logtail@11993"]["exceptionDetail"];
        assert_eq!(detail["type"], "IoError");
        assert_eq!(detail["message"], "disk full");
        assert_eq!(detail["stackTrace"], "at main");
        assert_eq!(json["priority"], 16 * 8);
    }

    #[test]
    fn syslog_section_carries_app_facility_and_host() {
        let json = format(&LogEvent::new(Level::Information, "m"));
        let syslog = &json["syslog"];
        assert_eq!(syslog["appname"], "billing");
        assert_eq!(syslog["facility"], "Local0");
        assert_eq!(syslog["host"], "web-1");
        assert_eq!(syslog["hostname"], "web-1");
        assert_eq!(syslog["logtail@11993"], serde_json::json!({}));
    }

    #[test]
    fn timestamp_has_microseconds_and_offset() {
        let ts: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::microseconds(123_456);
        let event = LogEvent::new(Level::Information, "m").with_timestamp(ts.into());
        assert_eq!(format(&event)["dt"], "2024-03-01T12:30:45.123456+00:00");
    }

    #[test]
    fn application_name_is_normalized_once() {
        let config = LogtailConfig::new("token", format!("{}\u{1}", "a".repeat(60)));
        let formatter = LogtailFormatter::new(&config).unwrap();
        let envelope = formatter.envelope(&LogEvent::new(Level::Information, "m"));
        assert_eq!(envelope.syslog.app_name, "a".repeat(48));
    }

    #[test]
    fn output_template_renders_the_message_field() {
        let templated = config().output_template("[{Level:u3}] {Message} ({SourceContext:l})");
        let formatter = LogtailFormatter::new(&templated).unwrap();
        let event = LogEvent::new(Level::Error, "boom").with_property("SourceContext", "jobs");
        let json: Value = serde_json::from_str(&formatter.format_message(&event)).unwrap();
        assert_eq!(json["message"], "[ERR] boom (jobs)");
        assert_eq!(json["msgid"], "jobs");
    }

    #[test]
    fn blank_output_template_keeps_the_plain_message() {
        let blank = config().output_template("   ");
        let formatter = LogtailFormatter::new(&blank).unwrap();
        assert_eq!(formatter.envelope(&LogEvent::new(Level::Information, "hi")).message, "hi");
    }

    #[test]
    fn custom_renderer_wins_over_template() {
        let custom = config()
            .output_template("{Message}!")
            .message_renderer(|e: &LogEvent| format!("{} via renderer", e.message));
        let formatter = LogtailFormatter::new(&custom).unwrap();
        assert_eq!(
            formatter.envelope(&LogEvent::new(Level::Information, "hi")).message,
            "hi via renderer"
        );
    }

    #[test]
    fn empty_application_name_is_rejected() {
        let result = LogtailFormatter::new(&LogtailConfig::new("token", "  "));
        assert!(matches!(
            result,
            Err(LogtailError::InvalidArgument { name: "application_name", .. })
        ));
    }

    #[test]
    fn severity_mapping_can_be_overridden() {
        let alert = config().severity_mapping(|_: Level| Severity::Alert);
        let formatter = LogtailFormatter::new(&alert).unwrap();
        let envelope = formatter.envelope(&LogEvent::new(Level::Verbose, "m"));
        assert_eq!(envelope.priority, 16 * 8 + 1);

        let named = config().severity_mapping(SeverityMap::NameBased);
        let formatter = LogtailFormatter::new(&named).unwrap();
        let envelope = formatter.envelope(&LogEvent::new(Level::Information, "m"));
        assert_eq!(envelope.priority, 16 * 8 + 6);
    }

    #[test]
    fn facility_changes_priority_and_name() {
        let user = config().facility(Facility::User);
        let formatter = LogtailFormatter::new(&user).unwrap();
        let envelope = formatter.envelope(&LogEvent::new(Level::Error, "m"));
        assert_eq!(envelope.priority, 8 + 3);
        assert_eq!(envelope.syslog.facility, "User");
    }

    #[test]
    fn os_platform_is_stable() {
        let first = os_platform();
        assert_eq!(first, os_platform());
        assert!(["windows", "linux", "freebsd", "macos", "browser", "unknown"].contains(&first));
    }

    #[test]
    fn formatted_envelope_round_trips() {
        let event = LogEvent::new(Level::Warning, "m")
            .with_property("SourceContext", "svc")
            .with_exception(ExceptionDetail::new("E", "bad"));
        let formatter = formatter();
        let expected = formatter.envelope(&event);
        let parsed: FormattedEnvelope =
            serde_json::from_str(&formatter.format_message(&event)).unwrap();
        assert_eq!(parsed, expected);
    }
}
