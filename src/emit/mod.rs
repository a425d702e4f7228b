//! Telemetry emission: the outbound pipeline seam and bundled implementations.
//!
//! ```text
//! Interceptor → Emitter ──submit(record, timeout)──▶ TelemetryPipeline
//!                                                     ├─ BoundedQueuePipeline ──drain──▶ OtlpFileExporter
//!                                                     └─ (application-provided)
//! ```
//!
//! # Modules
//!
//! - [`pipeline`]: the [`TelemetryPipeline`] trait and the counting [`Emitter`]
//! - [`queue`]: fixed-capacity queue with bounded producer waits
//! - [`otlp`]: OTLP logs JSON formatting and file export
//! - [`file_writer`]: size-rotating line writer used by the exporter

pub mod file_writer;
pub mod otlp;
pub mod pipeline;
pub mod queue;

pub use file_writer::RotatingFileWriter;
pub use otlp::{LogFormatter, OtlpFileExporter};
pub use pipeline::{DropReason, Emitter, Submission, TelemetryPipeline};
pub use queue::BoundedQueuePipeline;
