//! Outbound hand-off to the telemetry pipeline.
//!
//! The pipeline is an external collaborator reached through one call,
//! [`TelemetryPipeline::submit`]. The bridge treats it as best-effort: the
//! [`Emitter`] passes the configured timeout along, counts what was accepted or
//! dropped, and never retries or buffers on its own.
//!
//! Pipelines that block wake up a little after their deadline, so the emitter
//! offers them only part of the remaining budget. The rest covers the wake-up.

use crate::diagnostics::Diagnostics;
use crate::domain::error::BridgeError;
use crate::translate::TelemetryRecord;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a record did not make it into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No room became available before the timeout elapsed.
    Timeout,
    /// The pipeline has been closed by its consumer.
    Closed,
    /// The pipeline refused the record outright.
    Rejected(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Closed => f.write_str("pipeline closed"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

impl From<&DropReason> for BridgeError {
    fn from(reason: &DropReason) -> Self {
        Self::Backpressure(reason.to_string())
    }
}

/// Outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    Dropped(DropReason),
}

impl Submission {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Destination for translated records.
///
/// Implementations must return within roughly `timeout`. They are called on
/// application threads, inside logging calls; anything they log through the
/// `log` facade is passed through uninstrumented.
pub trait TelemetryPipeline: Send + Sync {
    /// Offers one record, waiting at most `timeout` for it to be taken.
    fn submit(&self, record: TelemetryRecord, timeout: Duration) -> Submission;
}

/// Share of the budget held back for the pipeline's wake-up, as a divisor.
const WAKE_MARGIN_DIVISOR: u32 = 4;

/// Fire-and-forget sender in front of a [`TelemetryPipeline`].
pub struct Emitter {
    pipeline: Arc<dyn TelemetryPipeline>,
    timeout: Duration,
    diagnostics: Arc<Diagnostics>,
}

impl Emitter {
    #[must_use]
    pub fn new(
        pipeline: Arc<dyn TelemetryPipeline>,
        timeout: Duration,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            pipeline,
            timeout,
            diagnostics,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Hands `record` to the pipeline with the full configured timeout.
    pub fn emit(&self, record: TelemetryRecord) -> Submission {
        self.emit_within(record, self.timeout)
    }

    /// Hands `record` to the pipeline so the call returns within `budget`,
    /// and counts the outcome.
    pub fn emit_within(&self, record: TelemetryRecord, budget: Duration) -> Submission {
        let started = Instant::now();
        let wait = budget.saturating_sub(budget / WAKE_MARGIN_DIVISOR);
        let outcome = self.pipeline.submit(record, wait);

        match &outcome {
            Submission::Accepted => {
                self.diagnostics.record_accepted();
                let elapsed = started.elapsed();
                if elapsed > budget {
                    tracing::debug!(
                        elapsed_us = elapsed.as_micros() as u64,
                        budget_us = budget.as_micros() as u64,
                        "pipeline accepted record after emit budget"
                    );
                }
            }
            Submission::Dropped(reason) => {
                self.diagnostics.record_backpressure_drop();
                let fault = BridgeError::from(reason);
                tracing::trace!(error = %fault, "telemetry record dropped");
            }
        }

        outcome
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
