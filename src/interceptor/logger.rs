//! The `log::Log` implementation installed in front of the application's logger.

use super::capture::{capture_event, is_already_instrumented, MarkedSource};
use super::{CallInfo, Decision, Interceptor, EMIT, FLUSH, LOGGER_LOOKUP};
use log::{Log, Metadata, Record};
use std::sync::Arc;

/// `log::Log` wrapper that runs the interceptor around an inner logger.
///
/// Output of the inner logger is untouched: it sees the same calls in the same
/// order with the same message and level, and the bridge's return values are
/// the inner logger's. Telemetry is emitted for a record only when the inner
/// logger has its metadata enabled, so exactly the records that get appended
/// are exported.
///
/// A record this bridge emits reaches the inner logger with one extra
/// key-value, [`SOURCE_KEY`](super::SOURCE_KEY) set to the module's
/// instrumentation source. Another bridge further down the chain sees it and
/// does not emit the record a second time.
///
/// # Example
///
/// ```
/// use log::Log;
/// use log_trace_bridge::emit::BoundedQueuePipeline;
/// use log_trace_bridge::{BridgeConfig, Registrar};
/// use std::sync::Arc;
///
/// struct Stdout;
/// impl Log for Stdout {
///     fn enabled(&self, m: &log::Metadata<'_>) -> bool { m.level() <= log::Level::Info }
///     fn log(&self, r: &log::Record<'_>) { println!("{}", r.args()); }
///     fn flush(&self) {}
/// }
///
/// let queue = Arc::new(BoundedQueuePipeline::new(16));
/// let registrar = Registrar::new(queue.clone());
/// registrar.install(&BridgeConfig::default());
///
/// let logger = registrar.logger(Stdout).unwrap();
/// logger.log(&log::Record::builder().target("app").args(format_args!("hi")).build());
/// assert_eq!(queue.len(), 1);
/// ```
pub struct BridgeLogger<L> {
    inner: L,
    interceptor: Arc<Interceptor>,
}

impl<L: Log> BridgeLogger<L> {
    #[must_use]
    pub const fn new(inner: L, interceptor: Arc<Interceptor>) -> Self {
        Self { inner, interceptor }
    }

    #[must_use]
    pub const fn inner(&self) -> &L {
        &self.inner
    }

    #[must_use]
    pub const fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: Log> Log for BridgeLogger<L> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.interceptor.intercept(
            LOGGER_LOOKUP,
            CallInfo::new(metadata.target()),
            || self.inner.enabled(metadata),
            || None,
        )
    }

    fn log(&self, record: &Record<'_>) {
        self.interceptor.intercept_with(
            EMIT,
            CallInfo::new(record.target()).already_instrumented(is_already_instrumented(record)),
            |decision| {
                if decision == Decision::Enrich {
                    let marked = MarkedSource::new(record.key_values(), self.interceptor.source());
                    self.inner.log(&record.to_builder().key_values(&marked).build());
                } else {
                    self.inner.log(record);
                }
            },
            || {
                self.inner
                    .enabled(record.metadata())
                    .then(|| capture_event(record))
            },
        );
    }

    fn flush(&self) {
        self.interceptor
            .intercept(FLUSH, CallInfo::new(""), || self.inner.flush(), || None);
    }
}

impl<L> std::fmt::Debug for BridgeLogger<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeLogger")
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::context::{carrier, TraceContext};
    use crate::diagnostics::Diagnostics;
    use crate::emit::{Submission, TelemetryPipeline};
    use crate::mdc::{self, ThreadLocalMdc};
    use crate::translate::{Severity, TelemetryRecord};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Appends `"<trace id or -> <message>"`, like a pattern layout reading the MDC.
    struct PatternLogger {
        level: log::Level,
        lines: Mutex<Vec<String>>,
        flushes: Mutex<usize>,
    }

    impl PatternLogger {
        fn new(level: log::Level) -> Self {
            Self {
                level,
                lines: Mutex::new(Vec::new()),
                flushes: Mutex::new(0),
            }
        }
    }

    impl Log for PatternLogger {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= self.level
        }

        fn log(&self, record: &Record<'_>) {
            if self.enabled(record.metadata()) {
                let trace = mdc::get("trace_id").unwrap_or_else(|| "-".to_string());
                self.lines
                    .lock()
                    .unwrap()
                    .push(format!("{trace} {}", record.args()));
            }
        }

        fn flush(&self) {
            *self.flushes.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct RecordingPipeline {
        records: Mutex<Vec<TelemetryRecord>>,
    }

    impl TelemetryPipeline for RecordingPipeline {
        fn submit(&self, record: TelemetryRecord, _timeout: Duration) -> Submission {
            self.records.lock().unwrap().push(record);
            Submission::Accepted
        }
    }

    fn armed(config: &BridgeConfig, pipeline: Arc<RecordingPipeline>) -> Arc<Interceptor> {
        let interceptor = Arc::new(Interceptor::new(
            config,
            Arc::new(ThreadLocalMdc),
            pipeline,
            Arc::new(Diagnostics::new()),
        ));
        interceptor.arm();
        interceptor
    }

    fn bridge(level: log::Level) -> (BridgeLogger<PatternLogger>, Arc<RecordingPipeline>) {
        let pipeline = Arc::new(RecordingPipeline::default());
        let interceptor = armed(&BridgeConfig::default(), pipeline.clone());
        (BridgeLogger::new(PatternLogger::new(level), interceptor), pipeline)
    }

    /// Remembers the source marker of every record it is handed.
    #[derive(Default)]
    struct MarkerLogger {
        markers: Mutex<Vec<Option<String>>>,
    }

    impl Log for MarkerLogger {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            let marker = record
                .key_values()
                .get(log::kv::Key::from_str(crate::interceptor::SOURCE_KEY))
                .map(|v| v.to_string());
            self.markers.lock().unwrap().push(marker);
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_log_appends_with_trace_id_and_emits() {
        let (logger, pipeline) = bridge(log::Level::Info);
        let ctx = TraceContext::generate();
        let _guard = carrier::with_context(ctx.clone());

        logger.log(
            &Record::builder()
                .target("app")
                .level(log::Level::Info)
                .args(format_args!("hello"))
                .build(),
        );

        let lines = logger.inner().lines.lock().unwrap().clone();
        assert_eq!(lines, vec![format!("{} hello", ctx.trace_id_hex())]);

        let records = pipeline.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Info);
        assert_eq!(records[0].context.as_ref(), Some(&ctx));
    }

    #[test]
    fn test_disabled_record_is_not_emitted() {
        let (logger, pipeline) = bridge(log::Level::Warn);

        logger.log(
            &Record::builder()
                .target("app")
                .level(log::Level::Debug)
                .args(format_args!("chatter"))
                .build(),
        );

        assert!(logger.inner().lines.lock().unwrap().is_empty());
        assert!(pipeline.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_enabled_and_flush_delegate() {
        let (logger, _pipeline) = bridge(log::Level::Info);

        let info = Metadata::builder().level(log::Level::Info).target("app").build();
        let trace = Metadata::builder().level(log::Level::Trace).target("app").build();
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&trace));

        logger.flush();
        assert_eq!(*logger.inner().flushes.lock().unwrap(), 1);
        assert_eq!(logger.interceptor().diagnostics().snapshot().logger_lookups, 2);
    }

    #[test]
    fn test_nested_bridges_emit_once() {
        let pipeline = Arc::new(RecordingPipeline::default());
        let downstream = armed(
            &BridgeConfig {
                module_name: "downstream".to_string(),
                diagnostic_context_key_prefix: "down_".to_string(),
                ..BridgeConfig::default()
            },
            pipeline.clone(),
        );
        let upstream = armed(
            &BridgeConfig {
                module_name: "upstream".to_string(),
                diagnostic_context_key_prefix: "up_".to_string(),
                ..BridgeConfig::default()
            },
            pipeline.clone(),
        );
        let logger = BridgeLogger::new(
            BridgeLogger::new(MarkerLogger::default(), Arc::clone(&downstream)),
            Arc::clone(&upstream),
        );

        logger.log(
            &Record::builder()
                .target("app")
                .level(log::Level::Info)
                .args(format_args!("once"))
                .build(),
        );

        let records = pipeline.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instrumentation_source, "upstream");
        assert_eq!(
            *logger.inner().inner().markers.lock().unwrap(),
            vec![Some("upstream".to_string())]
        );
        assert_eq!(downstream.diagnostics().snapshot().suppressed_duplicates, 1);
        assert_eq!(upstream.diagnostics().snapshot().accepted, 1);
    }

    #[test]
    fn test_pass_through_forwards_unmarked_record() {
        let pipeline = Arc::new(RecordingPipeline::default());
        let interceptor = armed(&BridgeConfig::default(), pipeline.clone());
        interceptor.set_active(false);
        let logger = BridgeLogger::new(MarkerLogger::default(), interceptor);

        logger.log(&Record::builder().target("app").args(format_args!("plain")).build());

        assert_eq!(*logger.inner().markers.lock().unwrap(), vec![None]);
        assert!(pipeline.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_context_leaves_pattern_empty() {
        let (logger, pipeline) = bridge(log::Level::Info);

        logger.log(
            &Record::builder()
                .target("app")
                .level(log::Level::Info)
                .args(format_args!("untraced"))
                .build(),
        );

        assert_eq!(*logger.inner().lines.lock().unwrap(), vec!["- untraced".to_string()]);
        assert_eq!(pipeline.records.lock().unwrap()[0].context, None);
    }
}
