//! Structured telemetry record model.

use crate::context::TraceContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output severity, numbered per the OpenTelemetry log data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Unspecified,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// OpenTelemetry `SeverityNumber` (0 for unspecified, 1/5/9/13/17/21 for
    /// the base of each range).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Trace => 1,
            Self::Debug => 5,
            Self::Info => 9,
            Self::Warn => 13,
            Self::Error => 17,
            Self::Fatal => 21,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flattened link of an exception chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub type_name: String,
    pub message: String,
    pub frame: Option<String>,
}

/// A translated log call, ready for the telemetry pipeline.
///
/// Records own everything they carry; in particular `context` is a copy of the
/// trace context at emission time, not a reference into the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub logger_name: String,
    pub severity: Severity,
    /// The legacy level name as the application wrote it.
    pub severity_text: String,
    pub message: String,
    pub timestamp_millis: i64,
    /// When the bridge translated the record. Excluded from [`Self::content_eq`].
    pub observed_timestamp_millis: i64,
    pub thread_name: String,
    /// Exception chain, outermost first.
    pub exceptions: Vec<ExceptionRecord>,
    pub attributes: Vec<(String, String)>,
    pub context: Option<TraceContext>,
    /// Name of the instrumentation module that produced this record.
    pub instrumentation_source: String,
}

impl TelemetryRecord {
    /// Compares every field except the observation timestamp.
    #[must_use]
    pub fn content_eq(&self, other: &Self) -> bool {
        Self {
            observed_timestamp_millis: other.observed_timestamp_millis,
            ..self.clone()
        } == *other
    }

    /// Looks up an attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
