//! Emission translator: legacy events → telemetry records.
//!
//! Translation is a pure mapping. It reads the carrier for the context snapshot
//! (or takes one explicitly) and otherwise depends only on its input, so the
//! same event always yields the same record content. The one exception is
//! [`TelemetryRecord::observed_timestamp_millis`], which is excluded from
//! [`TelemetryRecord::content_eq`].
//!
//! # Level mapping
//!
//! | legacy  | severity      | number |
//! |---------|---------------|--------|
//! | TRACE   | `Trace`       | 1      |
//! | DEBUG   | `Debug`       | 5      |
//! | INFO    | `Info`        | 9      |
//! | WARN    | `Warn`        | 13     |
//! | ERROR   | `Error`       | 17     |
//! | FATAL   | `Fatal`       | 21     |
//! | custom  | `Unspecified` | 0      |

pub mod event;
pub mod record;

pub use event::{current_thread_name, LegacyLevel, LegacyLogEvent, Location, Throwable};
pub use record::{ExceptionRecord, Severity, TelemetryRecord};

use crate::context::{carrier, TraceContext};
use crate::domain::error::{BridgeError, Result};

/// Longest exception chain kept on a record; deeper causes are cut.
pub const MAX_EXCEPTION_DEPTH: usize = 32;

/// Attribute set when an exception chain was cut, holding the number of links dropped.
pub const TRUNCATED_ATTRIBUTE: &str = "exception.truncated";

/// Maps a legacy level to its output severity. Total over all levels.
#[must_use]
pub const fn map_level(level: &LegacyLevel) -> Severity {
    match level {
        LegacyLevel::Trace => Severity::Trace,
        LegacyLevel::Debug => Severity::Debug,
        LegacyLevel::Info => Severity::Info,
        LegacyLevel::Warn => Severity::Warn,
        LegacyLevel::Error => Severity::Error,
        LegacyLevel::Fatal => Severity::Fatal,
        LegacyLevel::Custom(_) => Severity::Unspecified,
    }
}

/// Builds telemetry records stamped with one instrumentation source.
#[derive(Debug, Clone)]
pub struct Translator {
    source: String,
}

impl Translator {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Translates `event`, attaching the carrier's current context.
    ///
    /// # Errors
    ///
    /// See [`Translator::translate_with`].
    pub fn translate(&self, event: &LegacyLogEvent) -> Result<TelemetryRecord> {
        self.translate_with(event, carrier::current())
    }

    /// Translates `event` with an explicit context snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Translation`] for malformed events: an empty
    /// logger name or a timestamp before the Unix epoch.
    pub fn translate_with(
        &self,
        event: &LegacyLogEvent,
        context: Option<TraceContext>,
    ) -> Result<TelemetryRecord> {
        if event.logger_name.is_empty() {
            return Err(BridgeError::Translation("event has no logger name".to_string()));
        }
        if event.timestamp_millis < 0 {
            return Err(BridgeError::Translation(format!(
                "event timestamp {} is before the epoch",
                event.timestamp_millis
            )));
        }

        let mut attributes = event.attributes.clone();
        let exceptions = event
            .throwable
            .as_ref()
            .map(|throwable| flatten_chain(throwable, &event.location, &mut attributes))
            .unwrap_or_default();

        Ok(TelemetryRecord {
            logger_name: event.logger_name.clone(),
            severity: map_level(&event.level),
            severity_text: event.level.as_str().to_string(),
            message: event.message.clone(),
            timestamp_millis: event.timestamp_millis,
            observed_timestamp_millis: chrono::Utc::now().timestamp_millis(),
            thread_name: event.thread_name.clone(),
            exceptions,
            attributes,
            context,
            instrumentation_source: self.source.clone(),
        })
    }
}

/// Flattens a cause chain outermost-first.
///
/// The outermost link falls back to the call site's location for its frame.
fn flatten_chain(
    throwable: &Throwable,
    location: &Location,
    attributes: &mut Vec<(String, String)>,
) -> Vec<ExceptionRecord> {
    let mut exceptions: Vec<ExceptionRecord> = throwable
        .chain()
        .take(MAX_EXCEPTION_DEPTH)
        .map(|link| ExceptionRecord {
            type_name: link.type_name.clone(),
            message: link.message.clone(),
            frame: link.frame.clone(),
        })
        .collect();

    if let Some(first) = exceptions.first_mut() {
        if first.frame.is_none() {
            first.frame = location.summary();
        }
    }

    let dropped = throwable.chain().skip(MAX_EXCEPTION_DEPTH).count();
    if dropped > 0 {
        attributes.push((TRUNCATED_ATTRIBUTE.to_string(), dropped.to_string()));
    }

    exceptions
}
