//! The bridge's own diagnostics output.
//!
//! The bridge never reports through the `log` facade it instruments. Its
//! internal events go through `tracing`, and [`init_tracing`] is a convenience
//! for processes that do not set up a subscriber themselves:
//!
//! ```text
//! tracing macros → EnvFilter → OpenTelemetryLayer → SDK TracerProvider
//! ```
//!
//! The OpenTelemetry layer also gives every `tracing` span a real trace and
//! span id, which is what lets `follow_tracing_spans` correlate `log` records
//! emitted inside spans.
//!
//! # Configuration
//!
//! Filter directives are taken from:
//! 1. `RUST_LOG` environment variable (highest priority)
//! 2. `trace_level` in [`crate::BridgeConfig`]
//! 3. Default: `"info"`
//!
//! # Usage
//!
//! ```rust
//! use log_trace_bridge::observability::init_tracing;
//! use log_trace_bridge::BridgeConfig;
//!
//! init_tracing(&BridgeConfig::default());
//!
//! let span = tracing::info_span!("checkout");
//! let _entered = span.enter();
//! assert!(log_trace_bridge::context::resolve(true).is_some());
//! ```

mod init;

pub use init::{create_tracer_provider, init_tracing};
