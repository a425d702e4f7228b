//! Trace context and its per-thread carrier.
//!
//! - [`trace_context`]: the immutable [`TraceContext`] value
//! - [`carrier`]: thread-scoped storage with LIFO scope guards
//!
//! [`resolve`] is what the interceptor uses to find "the current context": the
//! carrier first, then (optionally) the active `tracing` span.

pub mod carrier;
pub mod trace_context;

pub use carrier::{current, with_context, ContextGuard};
pub use trace_context::TraceContext;

/// Resolves the context that applies to the calling thread right now.
///
/// An explicit carrier scope always wins. When none is open and
/// `follow_tracing_spans` is set, the current `tracing` span's OpenTelemetry
/// context is used instead.
#[must_use]
pub fn resolve(follow_tracing_spans: bool) -> Option<TraceContext> {
    carrier::current().or_else(|| {
        if follow_tracing_spans {
            TraceContext::from_current_span()
        } else {
            None
        }
    })
}
