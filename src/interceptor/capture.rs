//! Builds [`LegacyLogEvent`]s from `log::Record`s.
//!
//! Structured key-values on the record are read without modifying it:
//!
//! - `error` / `exception`: the first one becomes the event's throwable. When
//!   the value was captured as a `std::error::Error` (`log::error!(error:err; ..)`)
//!   its `source()` chain is walked; otherwise its display string is used.
//! - `level`: overrides the facade level by name, which is how `FATAL` and
//!   custom levels reach the bridge.
//! - everything else: kept as string attributes in call order.
//!
//! A record the bridge emitted is forwarded to the inner logger wrapped in a
//! [`MarkedSource`], so a second bridge further down the chain sees
//! [`SOURCE_KEY`] and does not emit it again.

use crate::translate::{current_thread_name, LegacyLevel, LegacyLogEvent, Location, Throwable};
use log::kv::{self, Key, Source, Value, VisitSource};

/// Key-value marking a record that an upstream bridge already emitted.
pub const SOURCE_KEY: &str = "instrumentation.source";

/// Captures the event for one intercepted `log` call.
#[must_use]
pub fn capture_event(record: &log::Record<'_>) -> LegacyLogEvent {
    let mut collector = Collector::default();
    // The collector never returns an error.
    let _ = record.key_values().visit(&mut collector);

    LegacyLogEvent {
        logger_name: record.target().to_string(),
        level: collector
            .level
            .unwrap_or_else(|| LegacyLevel::from(record.level())),
        message: record.args().to_string(),
        timestamp_millis: chrono::Utc::now().timestamp_millis(),
        thread_name: current_thread_name(),
        throwable: collector.throwable,
        location: Location {
            module_path: record.module_path().map(String::from),
            file: record.file().map(String::from),
            line: record.line(),
        },
        attributes: collector.attributes,
    }
}

/// Whether the record carries another bridge's source marker.
#[must_use]
pub fn is_already_instrumented(record: &log::Record<'_>) -> bool {
    record.key_values().get(Key::from_str(SOURCE_KEY)).is_some()
}

/// A record's key-values followed by one [`SOURCE_KEY`] pair.
pub struct MarkedSource<'a> {
    inner: &'a dyn Source,
    source: &'a str,
}

impl<'a> MarkedSource<'a> {
    #[must_use]
    pub fn new(inner: &'a dyn Source, source: &'a str) -> Self {
        Self { inner, source }
    }
}

impl Source for MarkedSource<'_> {
    fn visit<'kvs>(&'kvs self, visitor: &mut dyn VisitSource<'kvs>) -> Result<(), kv::Error> {
        self.inner.visit(visitor)?;
        visitor.visit_pair(Key::from_str(SOURCE_KEY), Value::from(self.source))
    }
}

#[derive(Default)]
struct Collector {
    level: Option<LegacyLevel>,
    throwable: Option<Throwable>,
    attributes: Vec<(String, String)>,
}

impl<'kvs> VisitSource<'kvs> for Collector {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        match key.as_str() {
            "error" | "exception" if self.throwable.is_none() => {
                self.throwable = Some(
                    value
                        .to_borrowed_error()
                        .map_or_else(|| Throwable::new("Error", value.to_string()), |e| Throwable::from_error(e)),
                );
            }
            "level" => self.level = Some(LegacyLevel::parse(&value.to_string())),
            other => self.attributes.push((other.to_string(), value.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_basic_fields() {
        let event = capture_event(
            &log::Record::builder()
                .target("app::orders")
                .level(log::Level::Warn)
                .args(format_args!("stock low: {}", 3))
                .module_path(Some("app::orders"))
                .file(Some("src/orders.rs"))
                .line(Some(12))
                .build(),
        );

        assert_eq!(event.logger_name, "app::orders");
        assert_eq!(event.level, LegacyLevel::Warn);
        assert_eq!(event.message, "stock low: 3");
        assert_eq!(event.location.line, Some(12));
        assert!(event.timestamp_millis > 0);
        assert!(event.throwable.is_none());
    }

    #[test]
    fn test_key_values() {
        let kvs: [(&str, Value<'_>); 3] = [
            ("order_id", Value::from(42)),
            ("level", Value::from("FATAL")),
            ("exception", Value::from("disk full")),
        ];
        let event = capture_event(
            &log::Record::builder()
                .target("app")
                .level(log::Level::Error)
                .args(format_args!("giving up"))
                .key_values(&kvs)
                .build(),
        );

        assert_eq!(event.level, LegacyLevel::Fatal);
        assert_eq!(event.attributes, vec![("order_id".to_string(), "42".to_string())]);
        let throwable = event.throwable.unwrap();
        assert_eq!(throwable.type_name, "Error");
        assert_eq!(throwable.message, "disk full");
    }

    #[test]
    fn test_error_value_chain() {
        let error = Wrapped(std::io::Error::new(std::io::ErrorKind::Other, "socket closed"));
        let kvs: [(&str, Value<'_>); 1] = [("error", Value::from_dyn_error(&error))];
        let event = capture_event(
            &log::Record::builder()
                .target("app")
                .level(log::Level::Error)
                .args(format_args!("call failed"))
                .key_values(&kvs)
                .build(),
        );

        let throwable = event.throwable.unwrap();
        let messages: Vec<_> = throwable.chain().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["request failed", "socket closed"]);
        assert_eq!(throwable.type_name, "Wrapped");
    }

    #[test]
    fn test_source_marker_detection() {
        let marked: [(&str, Value<'_>); 1] = [(SOURCE_KEY, Value::from("other-bridge"))];
        let record = log::Record::builder()
            .target("app")
            .args(format_args!("x"))
            .key_values(&marked)
            .build();
        assert!(is_already_instrumented(&record));

        let plain = log::Record::builder().target("app").args(format_args!("x")).build();
        assert!(!is_already_instrumented(&plain));
    }

    #[test]
    fn test_marked_source_keeps_pairs_and_adds_marker() {
        let kvs: [(&str, Value<'_>); 1] = [("order_id", Value::from(7))];
        let original = log::Record::builder()
            .target("app")
            .args(format_args!("x"))
            .key_values(&kvs)
            .build();
        assert!(!is_already_instrumented(&original));

        let marked = MarkedSource::new(original.key_values(), "upstream-bridge");
        let forwarded = original.to_builder().key_values(&marked).build();

        assert!(is_already_instrumented(&forwarded));
        assert_eq!(forwarded.key_values().count(), 2);
        assert_eq!(
            forwarded
                .key_values()
                .get(Key::from_str(SOURCE_KEY))
                .map(|v| v.to_string())
                .as_deref(),
            Some("upstream-bridge")
        );
        let event = capture_event(&forwarded);
        assert_eq!(event.attributes[0], ("order_id".to_string(), "7".to_string()));
    }
}
