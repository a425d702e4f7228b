//! Internal diagnostic counters.
//!
//! Every fault the bridge swallows shows up here and nowhere else: the bridge
//! never reports its own failures through the `log` facade it instruments.
//! Counters only ever increase. A [`DiagnosticsSnapshot`] is a serializable copy
//! for operational inspection.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by every component of one installed module.
#[derive(Debug, Default)]
pub struct Diagnostics {
    accepted: AtomicU64,
    backpressure_drops: AtomicU64,
    translation_faults: AtomicU64,
    adapter_failures: AtomicU64,
    emission_faults: AtomicU64,
    reentrancy_trips: AtomicU64,
    suppressed_duplicates: AtomicU64,
    logger_lookups: AtomicU64,
    config_faults: AtomicU64,
    conflicts: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// Records the pipeline accepted.
    pub accepted: u64,
    /// Records dropped because the pipeline timed out or rejected them.
    pub backpressure_drops: u64,
    /// Events dropped because they could not be translated.
    pub translation_faults: u64,
    /// Diagnostic-context reads or writes that failed and were skipped.
    pub adapter_failures: u64,
    /// Errors or panics caught at the interceptor boundary.
    pub emission_faults: u64,
    /// Re-entrant calls short-circuited to pass-through.
    pub reentrancy_trips: u64,
    /// Records that already carried an upstream source and were not re-emitted.
    pub suppressed_duplicates: u64,
    /// Intercepted `enabled` lookups.
    pub logger_lookups: u64,
    /// Configuration values replaced by defaults at install.
    pub config_faults: u64,
    /// Conflicting co-resident modules detected at install.
    pub conflicts: u64,
}

macro_rules! counters {
    ($($incr:ident => $field:ident),* $(,)?) => {
        impl Diagnostics {
            $(
                #[doc = concat!("Increments `", stringify!($field), "`.")]
                pub fn $incr(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*

            /// Copies every counter.
            #[must_use]
            pub fn snapshot(&self) -> DiagnosticsSnapshot {
                DiagnosticsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    record_accepted => accepted,
    record_backpressure_drop => backpressure_drops,
    record_translation_fault => translation_faults,
    record_adapter_failure => adapter_failures,
    record_emission_fault => emission_faults,
    record_reentrancy_trip => reentrancy_trips,
    record_suppressed_duplicate => suppressed_duplicates,
    record_logger_lookup => logger_lookups,
    record_config_fault => config_faults,
    record_conflict => conflicts,
}

impl Diagnostics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records that never reached the pipeline or were refused by it.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        let snapshot = self.snapshot();
        snapshot.backpressure_drops + snapshot.translation_faults + snapshot.emission_faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.snapshot(), DiagnosticsSnapshot::default());
    }

    #[test]
    fn test_counters_increment_independently() {
        let diagnostics = Diagnostics::new();
        diagnostics.record_accepted();
        diagnostics.record_accepted();
        diagnostics.record_backpressure_drop();

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.backpressure_drops, 1);
        assert_eq!(snapshot.translation_faults, 0);
        assert_eq!(diagnostics.dropped_total(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let diagnostics = Diagnostics::new();
        diagnostics.record_reentrancy_trip();
        let json = serde_json::to_value(diagnostics.snapshot()).unwrap();
        assert_eq!(json["reentrancy_trips"], 1);
    }
}
