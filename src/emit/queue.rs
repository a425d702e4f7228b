//! Bounded in-memory pipeline.
//!
//! A fixed-capacity FIFO shared between application threads (producers, via
//! [`TelemetryPipeline::submit`]) and whatever drains it (an exporter the
//! application drives). Producers wait on a condition variable for at most the
//! emit timeout; a full queue past that point drops the record. The queue never
//! grows beyond its capacity.

use super::pipeline::{DropReason, Submission, TelemetryPipeline};
use crate::translate::TelemetryRecord;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default number of records a queue holds.
pub const DEFAULT_CAPACITY: usize = 2048;

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<TelemetryRecord>,
    closed: bool,
}

/// Fixed-capacity record queue implementing [`TelemetryPipeline`].
#[derive(Debug)]
pub struct BoundedQueuePipeline {
    capacity: usize,
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl BoundedQueuePipeline {
    /// Creates a queue holding at most `capacity` records.
    ///
    /// A capacity of zero accepts nothing: every submission waits out its
    /// timeout and is dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes up to `max` records in FIFO order without waiting.
    pub fn drain(&self, max: usize) -> Vec<TelemetryRecord> {
        let mut state = self.lock();
        let take = max.min(state.records.len());
        let batch: Vec<_> = state.records.drain(..take).collect();
        drop(state);

        if !batch.is_empty() {
            self.not_full.notify_all();
        }
        batch
    }

    /// Waits up to `timeout` for one record.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TelemetryRecord> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if let Some(record) = state.records.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(record);
            }
            if state.closed {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .not_empty
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Closes the queue. Later submissions are dropped with [`DropReason::Closed`];
    /// records already queued can still be drained.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BoundedQueuePipeline {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TelemetryPipeline for BoundedQueuePipeline {
    fn submit(&self, record: TelemetryRecord, timeout: Duration) -> Submission {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if state.closed {
                return Submission::Dropped(DropReason::Closed);
            }
            if state.records.len() < self.capacity {
                state.records.push_back(record);
                drop(state);
                self.not_empty.notify_one();
                return Submission::Accepted;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Submission::Dropped(DropReason::Timeout);
            }
            state = self
                .not_full
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{LegacyLevel, LegacyLogEvent, Translator};
    use std::sync::Arc;

    fn record(message: &str) -> TelemetryRecord {
        Translator::new("test")
            .translate_with(&LegacyLogEvent::new("app", LegacyLevel::Info, message), None)
            .unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueuePipeline::new(4);
        for message in ["a", "b", "c"] {
            assert!(queue.submit(record(message), Duration::ZERO).is_accepted());
        }

        let drained: Vec<_> = queue.drain(10).into_iter().map(|r| r.message).collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_drops_after_timeout() {
        let queue = BoundedQueuePipeline::new(1);
        assert!(queue.submit(record("kept"), Duration::ZERO).is_accepted());

        let timeout = Duration::from_millis(20);
        let started = Instant::now();
        let outcome = queue.submit(record("lost"), timeout);

        assert_eq!(outcome, Submission::Dropped(DropReason::Timeout));
        assert!(started.elapsed() >= timeout);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_waiting_producer_gets_room() {
        let queue = Arc::new(BoundedQueuePipeline::new(1));
        assert!(queue.submit(record("first"), Duration::ZERO).is_accepted());

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.drain(1)
            })
        };

        let outcome = queue.submit(record("second"), Duration::from_secs(5));
        assert!(outcome.is_accepted());
        assert_eq!(consumer.join().unwrap().len(), 1);
        assert_eq!(queue.drain(1)[0].message, "second");
    }

    #[test]
    fn test_closed_queue_rejects() {
        let queue = BoundedQueuePipeline::new(4);
        queue.submit(record("before"), Duration::ZERO);
        queue.close();

        assert_eq!(
            queue.submit(record("after"), Duration::from_millis(5)),
            Submission::Dropped(DropReason::Closed)
        );
        assert_eq!(queue.recv_timeout(Duration::ZERO).map(|r| r.message).as_deref(), Some("before"));
        assert!(queue.recv_timeout(Duration::from_millis(5)).is_none());
    }
}
