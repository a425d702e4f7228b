//! Legacy log event model.
//!
//! [`LegacyLogEvent`] is the bridge's read-only view of one logging call as the
//! legacy framework saw it. It is built at the call site (see
//! [`crate::interceptor::capture`]) and never modified afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Legacy framework log levels.
///
/// The `log` facade produces the five standard levels. `Fatal` and `Custom`
/// exist for events that arrive with a level name instead (for example from a
/// `level` key-value forwarded by another framework).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    /// A level name the legacy framework allows but this bridge does not know.
    Custom(String),
}

impl LegacyLevel {
    /// Parses a level name case-insensitively.
    ///
    /// `WARNING` is accepted as `Warn`, `CRITICAL` as `Fatal`. Anything else
    /// becomes [`LegacyLevel::Custom`] holding the original name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Self::Trace,
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" | "WARNING" => Self::Warn,
            "ERROR" => Self::Error,
            "FATAL" | "CRITICAL" => Self::Fatal,
            _ => Self::Custom(name.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Custom(name) => name,
        }
    }
}

impl From<log::Level> for LegacyLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl fmt::Display for LegacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One link of an error chain attached to a log call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throwable {
    /// Best-effort type label of the error.
    pub type_name: String,
    pub message: String,
    /// Summary of the frame that raised or logged the error, when known.
    pub frame: Option<String>,
    pub cause: Option<Box<Throwable>>,
}

impl Throwable {
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frame: None,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    #[must_use]
    pub fn caused_by(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Builds a chain from a `std::error::Error`, following `source()`.
    ///
    /// Rust errors carry no class name, so the type label is the leading
    /// identifier of the value's `Debug` output (`Custom { .. }` gives
    /// `Custom`, `ParseIntError { .. }` gives `ParseIntError`).
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut links = Vec::new();
        let mut next = Some(error);
        while let Some(err) = next {
            links.push(Self::new(debug_type_label(err), err.to_string()));
            next = err.source();
        }

        links
            .into_iter()
            .rev()
            .reduce(|cause, outer| outer.caused_by(cause))
            .unwrap_or_else(|| Self::new("Error", error.to_string()))
    }

    /// Iterates the chain from outermost error to root cause.
    pub fn chain(&self) -> impl Iterator<Item = &Throwable> {
        std::iter::successors(Some(self), |t| t.cause.as_deref())
    }
}

fn debug_type_label(error: &dyn std::error::Error) -> String {
    let debug = format!("{error:?}");
    let label: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();

    if label.is_empty() {
        "Error".to_string()
    } else {
        label
    }
}

/// Source location of a log call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl Location {
    /// Renders `module (file:line)`, or whatever subset is known.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let position = match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        };

        match (&self.module_path, position) {
            (Some(module), Some(position)) => Some(format!("{module} ({position})")),
            (Some(module), None) => Some(module.clone()),
            (None, position) => position,
        }
    }
}

/// A log call as observed at the legacy call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLogEvent {
    /// The logger (target) name.
    pub logger_name: String,
    pub level: LegacyLevel,
    pub message: String,
    /// Wall-clock time of the call, milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    pub thread_name: String,
    pub throwable: Option<Throwable>,
    #[serde(default)]
    pub location: Location,
    /// Structured key-values of the call, rendered as strings, in call order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl LegacyLogEvent {
    /// Creates an event stamped with the current time and thread.
    #[must_use]
    pub fn new(logger_name: impl Into<String>, level: LegacyLevel, message: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            level,
            message: message.into(),
            timestamp_millis: chrono::Utc::now().timestamp_millis(),
            thread_name: current_thread_name(),
            throwable: None,
            location: Location::default(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_throwable(mut self, throwable: Throwable) -> Self {
        self.throwable = Some(throwable);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = timestamp_millis;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Name of the calling thread, falling back to its id for unnamed threads.
#[must_use]
pub fn current_thread_name() -> String {
    let thread = std::thread::current();
    thread
        .name()
        .map_or_else(|| format!("{:?}", thread.id()), String::from)
}
