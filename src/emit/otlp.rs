//! OTLP JSON log export to a rotating file.
//!
//! Converts batches of [`TelemetryRecord`]s into OTLP logs JSON documents
//! (one document per line) so that exported telemetry can be replayed into any
//! OTLP-compatible collector. The exporter is driven by the application, usually
//! from a thread that drains a [`BoundedQueuePipeline`]; the bridge itself never
//! spawns threads.

use super::file_writer::RotatingFileWriter;
use super::queue::BoundedQueuePipeline;
use crate::domain::error::Result;
use crate::translate::TelemetryRecord;
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::resource::Resource;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

/// Formats records as OTLP logs JSON.
pub struct LogFormatter {
    resource: Resource,
}

impl LogFormatter {
    #[must_use]
    pub const fn new(resource: Resource) -> Self {
        Self { resource }
    }

    /// Formats a batch as one OTLP document.
    ///
    /// Records are grouped by `instrumentation_source` into scopes, preserving
    /// the order in which each source first appears and the batch order within
    /// each scope:
    ///
    /// ```json
    /// {
    ///   "resourceLogs": [{
    ///     "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "orders"}}]},
    ///     "scopeLogs": [{
    ///       "scope": {"name": "log-trace-bridge"},
    ///       "logRecords": [...]
    ///     }]
    ///   }]
    /// }
    /// ```
    #[must_use]
    pub fn format_batch(&self, batch: &[TelemetryRecord]) -> JsonValue {
        let resource_attrs: Vec<JsonValue> = self
            .resource
            .iter()
            .map(|(k, v)| attribute(k.as_str(), format_value(v)))
            .collect();

        let mut scopes: Vec<(&str, Vec<JsonValue>)> = Vec::new();
        for record in batch {
            let source = record.instrumentation_source.as_str();
            let json = Self::format_record(record);
            match scopes.iter_mut().find(|(name, _)| *name == source) {
                Some((_, records)) => records.push(json),
                None => scopes.push((source, vec![json])),
            }
        }

        let scope_logs: Vec<JsonValue> = scopes
            .into_iter()
            .map(|(name, records)| {
                serde_json::json!({
                    "scope": { "name": name },
                    "logRecords": records,
                })
            })
            .collect();

        serde_json::json!({
            "resourceLogs": [{
                "resource": { "attributes": resource_attrs },
                "scopeLogs": scope_logs,
            }]
        })
    }

    /// Formats one record as an OTLP `LogRecord`.
    ///
    /// Timestamps become decimal nanosecond strings; ids become hex; records
    /// without a trace context omit `traceId`/`spanId`.
    fn format_record(record: &TelemetryRecord) -> JsonValue {
        let mut attributes = vec![
            attribute("logger.name", string_value(&record.logger_name)),
            attribute("thread.name", string_value(&record.thread_name)),
        ];
        attributes.extend(
            record
                .attributes
                .iter()
                .map(|(k, v)| attribute(k, string_value(v))),
        );

        if let Some(first) = record.exceptions.first() {
            attributes.push(attribute("exception.type", string_value(&first.type_name)));
            attributes.push(attribute("exception.message", string_value(&first.message)));
            attributes.push(attribute(
                "exception.stacktrace",
                string_value(&render_chain(record)),
            ));
        }

        let mut json = serde_json::json!({
            "timeUnixNano": millis_to_nanos(record.timestamp_millis),
            "observedTimeUnixNano": millis_to_nanos(record.observed_timestamp_millis),
            "severityNumber": record.severity.number(),
            "severityText": record.severity_text,
            "body": { "stringValue": record.message },
            "attributes": attributes,
        });

        if let Some(ctx) = &record.context {
            json["traceId"] = JsonValue::String(ctx.trace_id_hex());
            json["spanId"] = JsonValue::String(ctx.span_id_hex());
            json["flags"] = JsonValue::from(u8::from(ctx.is_sampled()));
        }

        json
    }
}

impl std::fmt::Debug for LogFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFormatter").finish()
    }
}

fn attribute(key: &str, value: JsonValue) -> JsonValue {
    serde_json::json!({ "key": key, "value": value })
}

fn string_value(s: &str) -> JsonValue {
    serde_json::json!({ "stringValue": s })
}

fn format_value(value: &Value) -> JsonValue {
    match value {
        Value::Bool(b) => serde_json::json!({ "boolValue": b }),
        Value::I64(i) => serde_json::json!({ "intValue": i.to_string() }),
        Value::F64(f) => serde_json::json!({ "doubleValue": f }),
        Value::String(s) => string_value(s.as_str()),
        Value::Array(_) => string_value(&value.to_string()),
    }
}

fn millis_to_nanos(millis: i64) -> String {
    (i128::from(millis) * 1_000_000).to_string()
}

/// Renders the exception chain Java-style: `Type: message`, then
/// `Caused by: ...` lines, with frames indented under each link.
fn render_chain(record: &TelemetryRecord) -> String {
    let mut out = String::new();
    for (i, exception) in record.exceptions.iter().enumerate() {
        if i > 0 {
            out.push_str("\nCaused by: ");
        }
        out.push_str(&exception.type_name);
        out.push_str(": ");
        out.push_str(&exception.message);
        if let Some(frame) = &exception.frame {
            out.push_str("\n\tat ");
            out.push_str(frame);
        }
    }
    out
}

/// Writes record batches as OTLP JSON lines to a rotating file.
#[derive(Debug)]
pub struct OtlpFileExporter {
    writer: RotatingFileWriter,
    formatter: LogFormatter,
}

impl OtlpFileExporter {
    /// Creates an exporter for `path` tagging every batch with `service_name`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, service_name: &str) -> Self {
        let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_string())]);
        Self::with_writer(RotatingFileWriter::new(path), resource)
    }

    #[must_use]
    pub const fn with_writer(writer: RotatingFileWriter, resource: Resource) -> Self {
        Self {
            writer,
            formatter: LogFormatter::new(resource),
        }
    }

    /// Writes `batch` as a single OTLP document line. Empty batches write nothing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BridgeError::Io`] if the write fails.
    pub fn export(&self, batch: &[TelemetryRecord]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let json = self.formatter.format_batch(batch);
        self.writer.write_line(&json.to_string())?;
        Ok(())
    }

    /// Drains up to `max` queued records and exports them. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BridgeError::Io`] if the write fails; the drained
    /// records are lost in that case.
    pub fn drain_from(&self, queue: &BoundedQueuePipeline, max: usize) -> Result<usize> {
        let batch = queue.drain(max);
        self.export(&batch)?;
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TraceContext;
    use crate::emit::pipeline::TelemetryPipeline;
    use crate::translate::{LegacyLevel, LegacyLogEvent, Throwable, Translator};
    use std::time::Duration;

    fn record(source: &str, message: &str, ctx: Option<TraceContext>) -> TelemetryRecord {
        let event = LegacyLogEvent::new("app::http", LegacyLevel::Warn, message)
            .with_timestamp(1_700_000_000_123)
            .with_attribute("status", "503");
        Translator::new(source).translate_with(&event, ctx).unwrap()
    }

    fn formatter() -> LogFormatter {
        LogFormatter::new(Resource::new(vec![KeyValue::new("service.name", "orders")]))
    }

    #[test]
    fn test_record_fields() {
        let ctx = TraceContext::from_hex("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true)
            .unwrap();
        let json = formatter().format_batch(&[record("bridge", "slow upstream", Some(ctx))]);

        let log = &json["resourceLogs"][0]["scopeLogs"][0]["logRecords"][0];
        assert_eq!(log["timeUnixNano"], "1700000000123000000");
        assert_eq!(log["severityNumber"], 13);
        assert_eq!(log["severityText"], "WARN");
        assert_eq!(log["body"]["stringValue"], "slow upstream");
        assert_eq!(log["traceId"], "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(log["spanId"], "00f067aa0ba902b7");
        assert_eq!(log["flags"], 1);

        let keys: Vec<_> = log["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["key"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["logger.name", "thread.name", "status"]);
    }

    #[test]
    fn test_resource_and_scopes() {
        let json = formatter().format_batch(&[
            record("bridge-a", "one", None),
            record("bridge-b", "two", None),
            record("bridge-a", "three", None),
        ]);

        let resource = &json["resourceLogs"][0]["resource"]["attributes"][0];
        assert_eq!(resource["key"], "service.name");
        assert_eq!(resource["value"]["stringValue"], "orders");

        let scopes = json["resourceLogs"][0]["scopeLogs"].as_array().unwrap();
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0]["scope"]["name"], "bridge-a");
        assert_eq!(scopes[0]["logRecords"].as_array().unwrap().len(), 2);
        assert!(scopes[0]["logRecords"][0].get("traceId").is_none());
    }

    #[test]
    fn test_exception_attributes() {
        let event = LegacyLogEvent::new("app", LegacyLevel::Error, "failed")
            .with_throwable(Throwable::new("A", "outer").caused_by(Throwable::new("B", "inner")));
        let record = Translator::new("bridge").translate_with(&event, None).unwrap();

        let json = formatter().format_batch(&[record]);
        let attributes = json["resourceLogs"][0]["scopeLogs"][0]["logRecords"][0]["attributes"]
            .as_array()
            .unwrap()
            .clone();
        let stacktrace = attributes
            .iter()
            .find(|a| a["key"] == "exception.stacktrace")
            .unwrap();
        assert_eq!(stacktrace["value"]["stringValue"], "A: outer\nCaused by: B: inner");
    }

    #[test]
    fn test_drain_from_queue_writes_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.json");
        let exporter = OtlpFileExporter::new(&path, "orders");
        let queue = BoundedQueuePipeline::new(8);

        queue.submit(record("bridge", "a", None), Duration::ZERO);
        queue.submit(record("bridge", "b", None), Duration::ZERO);

        assert_eq!(exporter.drain_from(&queue, 10).unwrap(), 2);
        assert_eq!(exporter.drain_from(&queue, 10).unwrap(), 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        let doc: JsonValue = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(
            doc["resourceLogs"][0]["scopeLogs"][0]["logRecords"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }
}
