//! Immutable trace context value.
//!
//! A [`TraceContext`] identifies the distributed trace and span that a log
//! statement belongs to. Identifiers reuse OpenTelemetry's `TraceId` (128-bit)
//! and `SpanId` (64-bit) so a context can be exchanged with any OpenTelemetry
//! tracer without conversion loss.

use crate::domain::error::BridgeError;
use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};
use serde::{Deserialize, Serialize};

/// Trace and span identity of the current unit of work.
///
/// Values are never mutated in place. Deriving a child span or attaching
/// baggage produces a new `TraceContext`, so a snapshot handed to a
/// [`TelemetryRecord`](crate::translate::TelemetryRecord) stays valid after the
/// originating thread moves on.
///
/// # Serialization
///
/// Identifiers serialize as lowercase hex strings (32 and 16 characters):
///
/// ```json
/// {
///   "trace_id": "4bf92f3577b34da6a3ce929d0e0e4736",
///   "span_id": "00f067aa0ba902b7",
///   "sampled": true,
///   "baggage": [["tenant", "acme"]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "TraceContextRepr", try_from = "TraceContextRepr")]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    sampled: bool,
    baggage: Vec<(String, String)>,
}

impl TraceContext {
    /// Creates a context from explicit identifiers with empty baggage.
    #[must_use]
    pub const fn new(trace_id: TraceId, span_id: SpanId, sampled: bool) -> Self {
        Self {
            trace_id,
            span_id,
            sampled,
            baggage: Vec::new(),
        }
    }

    /// Starts a new sampled root trace with random identifiers.
    #[must_use]
    pub fn generate() -> Self {
        let ids = RandomIdGenerator::default();
        Self::new(ids.new_trace_id(), ids.new_span_id(), true)
    }

    /// Parses a context from hex-encoded identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Translation`] if either identifier is not valid hex
    /// or is the all-zero invalid id.
    pub fn from_hex(trace_id: &str, span_id: &str, sampled: bool) -> Result<Self, BridgeError> {
        let trace = TraceId::from_hex(trace_id)
            .map_err(|e| BridgeError::Translation(format!("invalid trace id `{trace_id}`: {e}")))?;
        let span = SpanId::from_hex(span_id)
            .map_err(|e| BridgeError::Translation(format!("invalid span id `{span_id}`: {e}")))?;

        if trace == TraceId::INVALID || span == SpanId::INVALID {
            return Err(BridgeError::Translation(
                "trace and span ids must be non-zero".to_string(),
            ));
        }

        Ok(Self::new(trace, span, sampled))
    }

    /// Converts an OpenTelemetry span context, returning `None` for invalid ones.
    #[must_use]
    pub fn from_span_context(span_context: &SpanContext) -> Option<Self> {
        span_context.is_valid().then(|| {
            Self::new(
                span_context.trace_id(),
                span_context.span_id(),
                span_context.is_sampled(),
            )
        })
    }

    /// Captures the context of the current `tracing` span.
    ///
    /// Works when the active subscriber carries a `tracing-opentelemetry` layer
    /// (see [`crate::observability::init_tracing`]). Returns `None` when there is
    /// no span, or the span has no valid OpenTelemetry context.
    #[must_use]
    pub fn from_current_span() -> Option<Self> {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let span = tracing::Span::current();
        if span.is_none() {
            return None;
        }

        let otel_context = span.context();
        let span_ref = otel_context.span();
        Self::from_span_context(span_ref.span_context())
    }

    /// Derives a child context: same trace, new span id, inherited baggage.
    #[must_use]
    pub fn child(&self, span_id: SpanId) -> Self {
        Self {
            span_id,
            ..self.clone()
        }
    }

    /// Derives a child context with a randomly generated span id.
    #[must_use]
    pub fn new_child(&self) -> Self {
        self.child(RandomIdGenerator::default().new_span_id())
    }

    /// Derives a context with one more baggage entry appended.
    ///
    /// Baggage keeps insertion order; an existing entry with the same key is
    /// replaced in place so the order of first insertion is preserved.
    #[must_use]
    pub fn with_baggage(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let mut baggage = self.baggage.clone();

        match baggage.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => baggage.push((key, value)),
        }

        Self {
            baggage,
            ..self.clone()
        }
    }

    /// Derives a context with a different sampling decision.
    #[must_use]
    pub fn with_sampled(&self, sampled: bool) -> Self {
        Self {
            sampled,
            ..self.clone()
        }
    }

    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    #[must_use]
    pub const fn span_id(&self) -> SpanId {
        self.span_id
    }

    #[must_use]
    pub const fn is_sampled(&self) -> bool {
        self.sampled
    }

    #[must_use]
    pub fn baggage(&self) -> &[(String, String)] {
        &self.baggage
    }

    /// Looks up a baggage value by key.
    #[must_use]
    pub fn baggage_value(&self, key: &str) -> Option<&str> {
        self.baggage
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Trace id as 32 lowercase hex characters.
    #[must_use]
    pub fn trace_id_hex(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    /// Span id as 16 lowercase hex characters.
    #[must_use]
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// Renders the W3C `traceparent` header value.
    ///
    /// Format: `00-{trace_id}-{span_id}-{flags}` with flags `01` when sampled.
    #[must_use]
    pub fn traceparent(&self) -> String {
        format!(
            "00-{}-{}-{}",
            self.trace_id_hex(),
            self.span_id_hex(),
            if self.sampled { "01" } else { "00" }
        )
    }

    /// Renders the AWS X-Ray trace id form used in log correlation.
    ///
    /// X-Ray splits the 128-bit id into an 8-hex-digit epoch prefix and a
    /// 24-hex-digit unique part, and appends the segment (span) id after `@`:
    ///
    /// ```text
    /// 1-4bf92f35-77b34da6a3ce929d0e0e4736@00f067aa0ba902b7
    /// ```
    #[must_use]
    pub fn xray_trace_id(&self) -> String {
        let trace = self.trace_id_hex();
        format!("1-{}-{}@{}", &trace[..8], &trace[8..], self.span_id_hex())
    }

    /// Converts into an OpenTelemetry span context (non-remote, empty trace state).
    #[must_use]
    pub fn to_span_context(&self) -> SpanContext {
        let flags = if self.sampled {
            TraceFlags::SAMPLED
        } else {
            TraceFlags::default()
        };
        SpanContext::new(self.trace_id, self.span_id, flags, false, TraceState::default())
    }
}

/// Wire representation with hex-encoded identifiers.
#[derive(Serialize, Deserialize)]
struct TraceContextRepr {
    trace_id: String,
    span_id: String,
    sampled: bool,
    #[serde(default)]
    baggage: Vec<(String, String)>,
}

impl From<TraceContext> for TraceContextRepr {
    fn from(ctx: TraceContext) -> Self {
        Self {
            trace_id: ctx.trace_id_hex(),
            span_id: ctx.span_id_hex(),
            sampled: ctx.sampled,
            baggage: ctx.baggage,
        }
    }
}

impl TryFrom<TraceContextRepr> for TraceContext {
    type Error = BridgeError;

    fn try_from(repr: TraceContextRepr) -> Result<Self, Self::Error> {
        let mut ctx = Self::from_hex(&repr.trace_id, &repr.span_id, repr.sampled)?;
        ctx.baggage = repr.baggage;
        Ok(ctx)
    }
}
