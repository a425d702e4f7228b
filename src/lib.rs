//! log-trace-bridge: trace-context correlation for the `log` facade.
//!
//! Applications that log through `log` get two things without touching their
//! logging call sites:
//! - Trace and span ids of the active context in a per-thread diagnostic
//!   context (MDC), so their existing logger can print them
//! - Every appended record re-emitted as an OpenTelemetry-shaped
//!   [`TelemetryRecord`] to a pluggable pipeline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Registrar (registrar)                              │  ← One-time install
//! │  - Config validation, prefix claims                 │
//! │  - install_global → log::set_boxed_logger           │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Interceptor (interceptor/)                         │  ← Advice around
//! │  - BridgeLogger wraps the application's logger      │    log::Log calls
//! │  - Re-entrancy guard, enrich/suppress/pass-through  │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Context       │   │ MDC           │   │ Translate/Emit│
//! │ (context/)    │   │ (mdc/)        │   │ (translate/,  │
//! │ - TraceContext│   │ - Key sync    │   │  emit/)       │
//! │ - Scoped stack│   │ - Restore     │   │ - Severity map│
//! │               │   │               │   │ - Pipelines   │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain, Config & Diagnostics                       │
//! │  - Error types (domain/error)                       │
//! │  - BridgeConfig (config)                            │
//! │  - Fault counters (diagnostics)                     │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │  ← Optional
//! │  - tracing subscriber + OpenTelemetry layer         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`context`]: Trace context value and the per-thread scope stack
//! - [`mdc`]: Diagnostic-context store and the adapter that syncs ids into it
//! - [`interceptor`]: Advice table, re-entrancy guard, `BridgeLogger`
//! - [`translate`]: Legacy events to telemetry records
//! - [`emit`]: Pipeline seam, bounded queue, OTLP file export
//! - [`registrar`]: Install-once bootstrap and conflict detection
//! - [`config`]: `BridgeConfig`
//! - [`diagnostics`]: Counters for every swallowed fault
//! - [`observability`]: The bridge's own `tracing` setup
//!
//! # Configuration
//!
//! ```toml
//! enabled = true
//! emit_timeout_millis = 5
//! diagnostic_context_key_prefix = "trace_"
//! ```
//!
//! See [`BridgeConfig`] for every option.
//!
//! # Call Flow
//!
//! 1. **Install** (`install_global`):
//!    - Validate configuration, report faults once, apply defaults
//!    - Claim the diagnostic-context key prefix
//!    - Arm call sites, set `BridgeLogger` as the `log` logger
//!
//! 2. **Scope** (`context::with_context`):
//!    - Application opens a trace scope on the current thread
//!
//! 3. **Log call** (`log::info!`):
//!    - `enabled` lookup is observed and delegated
//!    - `log` syncs ids into the MDC, runs the inner logger, translates the
//!      record, hands it to the pipeline within `emit_timeout_millis`, and
//!      restores the MDC
//!
//! 4. **Export** (application thread of its choice):
//!    - Drain a `BoundedQueuePipeline` into an `OtlpFileExporter`
//!
//! # Examples
//!
//! ```rust
//! use log::Log;
//! use log_trace_bridge::context::{with_context, TraceContext};
//! use log_trace_bridge::emit::BoundedQueuePipeline;
//! use log_trace_bridge::{BridgeConfig, Registrar};
//! use std::sync::Arc;
//!
//! let queue = Arc::new(BoundedQueuePipeline::new(64));
//! let registrar = Registrar::new(queue.clone());
//! let state = registrar.install(&BridgeConfig::default());
//! assert!(state.active);
//!
//! // Normally `install_global` wraps the application's logger.
//! struct AppLogger;
//! impl Log for AppLogger {
//!     fn enabled(&self, _: &log::Metadata<'_>) -> bool { true }
//!     fn log(&self, _: &log::Record<'_>) {}
//!     fn flush(&self) {}
//! }
//! let logger = registrar.logger(AppLogger).unwrap();
//!
//! let ctx = TraceContext::generate();
//! let guard = with_context(ctx.clone());
//! logger.log(
//!     &log::Record::builder()
//!         .target("checkout")
//!         .level(log::Level::Info)
//!         .args(format_args!("order placed"))
//!         .build(),
//! );
//! guard.release()?;
//!
//! let records = queue.drain(10);
//! assert_eq!(records[0].context, Some(ctx));
//! # Ok::<(), log_trace_bridge::BridgeError>(())
//! ```
//!
//! # Failure Model
//!
//! Nothing the bridge does can raise into the application's call stack, and
//! the application's logger sees the same records it would without the bridge,
//! apart from one `instrumentation.source` key-value on records the bridge
//! emitted. Every internal failure is swallowed and counted in
//! [`DiagnosticsSnapshot`]:
//! - Bad config values: replaced by defaults (`config_faults`)
//! - Prefix already claimed: module stays installed but inert (`conflicts`)
//! - Malformed events: dropped (`translation_faults`)
//! - Slow or closed pipeline: dropped after the timeout (`backpressure_drops`)
//! - Panics in the bridge's own path: caught (`emission_faults`)

#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod domain;
pub mod emit;
pub mod interceptor;
pub mod mdc;
pub mod registrar;
pub mod translate;

pub mod observability;

pub use config::BridgeConfig;
pub use context::{with_context, ContextGuard, TraceContext};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use domain::{BridgeError, Result};
pub use emit::{BoundedQueuePipeline, DropReason, Submission, TelemetryPipeline};
pub use interceptor::BridgeLogger;
pub use registrar::{install_global, ClaimTable, ModuleState, Registrar};
pub use translate::{Severity, TelemetryRecord};
