use crate::severity::Level;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// A structured log event as produced by the application (or by the
/// tracing layer on its behalf). Consumed once by the formatter.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: Level,
    pub message: String,
    pub exception: Option<ExceptionDetail>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl LogEvent {
    /// Create an event stamped with the current UTC time and no properties.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now().into(),
            level,
            message: message.into(),
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: ExceptionDetail) -> Self {
        self.exception = Some(exception);
        self
    }
}

/// Value of a single event property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    /// Nested structures or `Debug` output, already rendered to text.
    Rendered(String),
}

impl PropertyValue {
    /// Textual form used by the formatter: strings are quoted with inner
    /// quotes escaped, everything else is rendered as-is.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::I64(n) => n.to_string(),
            PropertyValue::U64(n) => n.to_string(),
            PropertyValue::F64(n) => n.to_string(),
            PropertyValue::Rendered(s) => s.clone(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::I64(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::I64(value.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::U64(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::F64(value)
    }
}

/// Structured description of an error attached to an event. Serialized as
/// an object so that type, message and trace stay separately addressable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetail {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<Box<ExceptionDetail>>,
}

impl ExceptionDetail {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionDetail {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            inner_exception: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Build a detail from an error and its `source()` chain.
    ///
    /// `dyn Error` does not expose a type name, so the leading identifier of
    /// the `Debug` output is used (`Os { .. }` gives `Os`, `ParseIntError
    /// { .. }` gives `ParseIntError`).
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let debug = format!("{err:?}");
        let type_name: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();

        ExceptionDetail {
            type_name: if type_name.is_empty() { "Error".to_string() } else { type_name },
            message: err.to_string(),
            stack_trace: None,
            inner_exception: err.source().map(|source| Box::new(ExceptionDetail::from_error(source))),
        }
    }
}
