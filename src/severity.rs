use crate::error::LogtailError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application log level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Verbose = 0,
    Debug = 1,
    Information = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Verbose,
        Level::Debug,
        Level::Information,
        Level::Warning,
        Level::Error,
        Level::Fatal,
    ];

    /// Enum name, as used for identification and parsing.
    pub fn name(self) -> &'static str {
        match self {
            Level::Verbose => "Verbose",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        }
    }

    /// Label written to the envelope's `level` field.
    pub fn label(self) -> &'static str {
        match self {
            Level::Information => "Info",
            other => other.name(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Level {
    type Error = LogtailError;

    fn try_from(value: u8) -> Result<Self, LogtailError> {
        Level::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| LogtailError::InvalidLevel(value.to_string()))
    }
}

impl FromStr for Level {
    type Err = LogtailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("info") {
            return Ok(Level::Information);
        }
        Level::ALL
            .iter()
            .copied()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LogtailError::InvalidLevel(s.to_string()))
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Verbose,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Information,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Syslog severity codes (RFC 5424 section 6.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Informational = 6,
    Debug = 7,
}

impl Severity {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Syslog facility codes (RFC 5424 section 6.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facility {
    Kernel = 0,
    User = 1,
    Mail = 2,
    Daemons = 3,
    Auth = 4,
    Syslog = 5,
    Lpr = 6,
    News = 7,
    Uucp = 8,
    Cron = 9,
    Auth2 = 10,
    Ftp = 11,
    Ntp = 12,
    Auth3 = 13,
    Auth4 = 14,
    Cron2 = 15,
    #[default]
    Local0 = 16,
    Local1 = 17,
    Local2 = 18,
    Local3 = 19,
    Local4 = 20,
    Local5 = 21,
    Local6 = 22,
    Local7 = 23,
}

impl Facility {
    const ALL: [Facility; 24] = [
        Facility::Kernel,
        Facility::User,
        Facility::Mail,
        Facility::Daemons,
        Facility::Auth,
        Facility::Syslog,
        Facility::Lpr,
        Facility::News,
        Facility::Uucp,
        Facility::Cron,
        Facility::Auth2,
        Facility::Ftp,
        Facility::Ntp,
        Facility::Auth3,
        Facility::Auth4,
        Facility::Cron2,
        Facility::Local0,
        Facility::Local1,
        Facility::Local2,
        Facility::Local3,
        Facility::Local4,
        Facility::Local5,
        Facility::Local6,
        Facility::Local7,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name written to the envelope's `syslog.facility` field.
    pub fn name(self) -> &'static str {
        match self {
            Facility::Kernel => "Kernel",
            Facility::User => "User",
            Facility::Mail => "Mail",
            Facility::Daemons => "Daemons",
            Facility::Auth => "Auth",
            Facility::Syslog => "Syslog",
            Facility::Lpr => "LPR",
            Facility::News => "News",
            Facility::Uucp => "UUCP",
            Facility::Cron => "Cron",
            Facility::Auth2 => "Auth2",
            Facility::Ftp => "FTP",
            Facility::Ntp => "NTP",
            Facility::Auth3 => "Auth3",
            Facility::Auth4 => "Auth4",
            Facility::Cron2 => "Cron2",
            Facility::Local0 => "Local0",
            Facility::Local1 => "Local1",
            Facility::Local2 => "Local2",
            Facility::Local3 => "Local3",
            Facility::Local4 => "Local4",
            Facility::Local5 => "Local5",
            Facility::Local6 => "Local6",
            Facility::Local7 => "Local7",
        }
    }
}

impl FromStr for Facility {
    type Err = LogtailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Facility::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LogtailError::invalid_argument("facility", format!("unknown facility {s:?}")))
    }
}

/// `facility * 8 + severity`, always within `0..=191`.
pub fn priority(facility: Facility, severity: Severity) -> u8 {
    facility.code() * 8 + severity.code()
}

/// Policy that turns an application [`Level`] into a syslog [`Severity`].
///
/// Any `Fn(Level) -> Severity` closure implements this trait, so callers
/// can override the mapping without defining a type.
pub trait SeverityMapping: Send + Sync {
    fn severity(&self, level: Level) -> Severity;
}

impl<F> SeverityMapping for F
where
    F: Fn(Level) -> Severity + Send + Sync,
{
    fn severity(&self, level: Level) -> Severity {
        self(level)
    }
}

/// Built-in mapping policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeverityMap {
    /// Walks the syslog scale numerically, skipping Alert and Critical so
    /// that Fatal lands on Emergency.
    #[default]
    ValueBased,
    /// Maps each level to the syslog severity with the closest name.
    NameBased,
}

impl SeverityMapping for SeverityMap {
    fn severity(&self, level: Level) -> Severity {
        match self {
            SeverityMap::ValueBased => value_based_severity(level),
            SeverityMap::NameBased => name_based_severity(level),
        }
    }
}

pub fn value_based_severity(level: Level) -> Severity {
    match level {
        Level::Verbose => Severity::Debug,
        Level::Debug => Severity::Informational,
        Level::Information => Severity::Notice,
        Level::Warning => Severity::Warning,
        Level::Error => Severity::Error,
        Level::Fatal => Severity::Emergency,
    }
}

pub fn name_based_severity(level: Level) -> Severity {
    match level {
        Level::Verbose | Level::Debug => Severity::Debug,
        Level::Information => Severity::Informational,
        Level::Warning => Severity::Warning,
        Level::Error => Severity::Error,
        Level::Fatal => Severity::Emergency,
    }
}
